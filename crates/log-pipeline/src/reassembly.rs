//! 메시지 재조립 상태 머신
//!
//! 연속된 [`LogLine`]에서 하나의 논리 메시지에 속하는 본문들을 모아
//! 경계에 도달하면 [`CompletedMessage`]로 내보냅니다.
//!
//! # 전이 규칙 (라인마다 순서대로)
//! 1. 어떤 종류의 시작 마커이면 열린 버퍼를 완료하고 새 버퍼를 시작
//! 2. 캡처 중인 종류의 종료 마커이면 버퍼를 완료 (종료 라인은 버림)
//! 3. 그 외 캡처 중이면 본문을 추가
//!
//! 시작 마커는 Transaction, HostRecord, Receipt 순으로 판정합니다.

use std::mem;

use paylens_core::config::KindRuleConfig;
use paylens_core::types::{LogLine, MessageKind};

use crate::error::LogPipelineError;

/// 메시지 종류별 경계 규칙
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRule {
    /// 태그 부분 문자열 (없으면 모든 태그)
    pub tag_filter: Option<String>,
    /// 시작 마커 부분 문자열
    pub sentinels: Vec<String>,
    /// 연속 라인 마커
    pub continuation: Option<String>,
}

impl KindRule {
    /// 태그가 필터와 일치하는지 확인합니다.
    pub fn tag_matches(&self, tag: &str) -> bool {
        self.tag_filter
            .as_deref()
            .is_none_or(|filter| tag.contains(filter))
    }

    /// 메시지가 시작 마커 문자열을 포함하는지 확인합니다.
    pub fn has_sentinel(&self, message: &str) -> bool {
        self.sentinels.iter().any(|s| message.contains(s.as_str()))
    }

    fn carries_continuation(&self, message: &str) -> bool {
        self.continuation
            .as_deref()
            .is_none_or(|marker| message.contains(marker))
    }

    /// 시작 마커 판정
    pub fn is_start(&self, line: &LogLine) -> bool {
        self.tag_matches(&line.tag)
            && self.has_sentinel(&line.message)
            && self.carries_continuation(&line.message)
    }

    /// 종료 마커 판정 (해당 종류를 캡처 중일 때만 의미가 있음)
    pub fn is_end(&self, line: &LogLine) -> bool {
        let lost_continuation =
            self.continuation.is_some() && !self.carries_continuation(&line.message);
        let lost_tag = self.tag_filter.is_some() && !self.tag_matches(&line.tag);
        lost_continuation || lost_tag
    }

    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self, kind: MessageKind) -> Result<(), LogPipelineError> {
        if self.sentinels.is_empty() || self.sentinels.iter().any(String::is_empty) {
            return Err(LogPipelineError::Config {
                field: format!("{kind}.sentinels"),
                reason: "at least one non-empty sentinel is required".to_owned(),
            });
        }

        if self.tag_filter.is_none() && self.continuation.is_none() {
            return Err(LogPipelineError::Config {
                field: kind.to_string(),
                reason: "tag_filter or continuation is required".to_owned(),
            });
        }

        Ok(())
    }
}

impl From<&KindRuleConfig> for KindRule {
    fn from(config: &KindRuleConfig) -> Self {
        Self {
            tag_filter: config.tag_filter.clone(),
            sentinels: config.sentinels.clone(),
            continuation: config.continuation.clone(),
        }
    }
}

/// 세 종류의 규칙 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRules {
    pub transaction: KindRule,
    pub host_record: KindRule,
    pub receipt: KindRule,
}

impl KindRules {
    /// 종류에 해당하는 규칙을 반환합니다.
    pub fn get(&self, kind: MessageKind) -> &KindRule {
        match kind {
            MessageKind::Transaction => &self.transaction,
            MessageKind::HostRecord => &self.host_record,
            MessageKind::Receipt => &self.receipt,
        }
    }

    /// 라인이 시작 마커인 첫 번째 종류를 찾습니다.
    pub fn start_kind(&self, line: &LogLine) -> Option<MessageKind> {
        MessageKind::ALL
            .into_iter()
            .find(|kind| self.get(*kind).is_start(line))
    }

    /// 모든 규칙을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        for kind in MessageKind::ALL {
            self.get(kind).validate(kind)?;
        }
        Ok(())
    }
}

impl Default for KindRules {
    fn default() -> Self {
        Self {
            transaction: (&KindRuleConfig::transaction()).into(),
            host_record: (&KindRuleConfig::host_record()).into(),
            receipt: (&KindRuleConfig::receipt()).into(),
        }
    }
}

/// 재조립이 끝난 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMessage {
    /// 메시지 종류
    pub kind: MessageKind,
    /// 메시지 본문 라인들 (입력 순서)
    pub lines: Vec<String>,
}

/// 재조립 상태 머신
///
/// 버퍼는 캡처 중에만 존재하며, [`finalize`](Self::finalize)만이 버퍼를 밖으로 옮깁니다.
#[derive(Debug)]
pub struct Reassembler {
    rules: KindRules,
    kind: Option<MessageKind>,
    buffer: Vec<String>,
}

impl Reassembler {
    /// 새 상태 머신을 생성합니다.
    pub fn new(rules: KindRules) -> Self {
        Self {
            rules,
            kind: None,
            buffer: Vec::new(),
        }
    }

    /// 라인 하나를 처리합니다. 이 라인으로 완료된 메시지가 있으면 반환합니다.
    pub fn feed(&mut self, line: &LogLine) -> Option<CompletedMessage> {
        if let Some(start) = self.rules.start_kind(line) {
            let completed = self.finalize();
            self.kind = Some(start);
            self.buffer.push(line.message.clone());
            return completed;
        }

        let kind = self.kind?;

        if self.rules.get(kind).is_end(line) {
            return self.finalize();
        }

        self.buffer.push(line.message.clone());
        None
    }

    /// 열린 버퍼를 완료합니다. 비어 있으면 `None`입니다.
    pub fn finalize(&mut self) -> Option<CompletedMessage> {
        let kind = self.kind.take()?;
        let lines = mem::take(&mut self.buffer);
        if lines.is_empty() {
            return None;
        }
        Some(CompletedMessage { kind, lines })
    }

    /// 열린 버퍼를 버립니다. 버린 라인 수를 반환합니다.
    pub fn discard(&mut self) -> usize {
        self.kind = None;
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// 캡처 중인지 확인합니다.
    pub fn is_capturing(&self) -> bool {
        self.kind.is_some()
    }

    /// 캡처 중인 종류
    pub fn current_kind(&self) -> Option<MessageKind> {
        self.kind
    }

    /// 버퍼에 쌓인 라인 수
    pub fn buffered_lines(&self) -> usize {
        self.buffer.len()
    }

    /// 적용 중인 규칙
    pub fn rules(&self) -> &KindRules {
        &self.rules
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(KindRules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(tag: &str, message: &str) -> LogLine {
        LogLine {
            date: "01-15".to_owned(),
            time: "12:00:00.000".to_owned(),
            pid: "1".to_owned(),
            tid: "1".to_owned(),
            level: "D".to_owned(),
            tag: tag.to_owned(),
            message: message.to_owned(),
        }
    }

    fn feed_all(machine: &mut Reassembler, lines: &[LogLine]) -> Vec<CompletedMessage> {
        lines.iter().filter_map(|l| machine.feed(l)).collect()
    }

    #[test]
    fn transaction_ends_on_line_without_pipe() {
        let mut machine = Reassembler::default();
        let out = feed_all(
            &mut machine,
            &[
                line("Iso", "packRequest|0200|"),
                line("Iso", "|7234054128C28200|"),
                line("Iso", "003|000000|"),
                line("Iso", "done"),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MessageKind::Transaction);
        assert_eq!(out[0].lines.len(), 3);
        assert!(!machine.is_capturing());
    }

    #[test]
    fn back_to_back_transactions_do_not_leak() {
        let mut machine = Reassembler::default();
        let out = feed_all(
            &mut machine,
            &[
                line("Iso", "packRequest|0200|"),
                line("Iso", "003|000000|"),
                line("Iso", "unpackResponse|0210|"),
                line("Iso", "039|3030|"),
                line("Iso", "end"),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].lines, vec!["packRequest|0200|", "003|000000|"]);
        assert_eq!(out[1].lines, vec!["unpackResponse|0210|", "039|3030|"]);
    }

    #[test]
    fn sentinel_without_continuation_is_not_a_start() {
        let mut machine = Reassembler::default();
        assert!(machine.feed(&line("Iso", "packRequest called")).is_none());
        assert!(!machine.is_capturing());
    }

    #[test]
    fn host_record_ends_when_tag_changes() {
        let mut machine = Reassembler::default();
        let out = feed_all(
            &mut machine,
            &[
                line("APP_CMD_PROXY", "HostRecord = {\"K_RECORD\":{\"capkDataList\":["),
                line("APP_CMD_PROXY", "]}}"),
                line("Other", "unrelated"),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MessageKind::HostRecord);
        assert_eq!(out[0].lines.len(), 2);
    }

    #[test]
    fn lines_outside_a_message_are_ignored() {
        let mut machine = Reassembler::default();
        assert!(machine.feed(&line("Iso", "003|000000|")).is_none());
        assert_eq!(machine.buffered_lines(), 0);
    }

    #[test]
    fn start_of_other_kind_finalizes_current() {
        let mut machine = Reassembler::default();
        assert!(machine.feed(&line("PrinterImpl", "LinePrinterReceipt(sections=[")).is_none());
        assert_eq!(machine.current_kind(), Some(MessageKind::Receipt));
        let done = machine.feed(&line("PrinterImpl", "packRequest|0200|")).unwrap();
        assert_eq!(done.kind, MessageKind::Receipt);
        assert_eq!(machine.current_kind(), Some(MessageKind::Transaction));
    }

    #[test]
    fn finalize_empties_buffer_and_drops_empty() {
        let mut machine = Reassembler::default();
        machine.feed(&line("Iso", "packRequest|0200|"));
        assert!(machine.finalize().is_some());
        assert_eq!(machine.buffered_lines(), 0);
        assert!(machine.finalize().is_none());
    }

    #[test]
    fn discard_drops_open_buffer() {
        let mut machine = Reassembler::default();
        machine.feed(&line("Iso", "packRequest|0200|"));
        machine.feed(&line("Iso", "003|000000|"));
        assert_eq!(machine.discard(), 2);
        assert!(!machine.is_capturing());
    }

    #[test]
    fn default_rules_validate() {
        KindRules::default().validate().unwrap();
    }

    #[test]
    fn rule_without_end_condition_is_invalid() {
        let rule = KindRule {
            tag_filter: None,
            sentinels: vec!["x".to_owned()],
            continuation: None,
        };
        assert!(rule.validate(MessageKind::Receipt).is_err());
    }
}
