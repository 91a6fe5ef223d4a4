//! logcat 라인 분류기
//!
//! 원시 텍스트 한 줄을 7개 필드의 [`LogLine`]으로 분류합니다.
//!
//! # 라인 형식
//! ```text
//! DATE TIME PID TID LEVEL TAG: MESSAGE
//! 01-15 12:00:00.123 1234 5678 D IsoHelper: packRequest|0200|
//! ```
//!
//! 앞의 6개 필드 사이의 연속 공백은 하나로 취급하고, 메시지는 6번째 필드 뒤의
//! 공백을 건너뛴 나머지 전체입니다 (내부 공백 보존).
//!
//! # 사용 예시
//! ```ignore
//! use paylens_log_pipeline::parser::LogcatParser;
//!
//! let parser = LogcatParser::new();
//! let line = parser.classify("01-15 12:00:00.123 1234 5678 D Tag: hello world");
//! assert_eq!(line.unwrap().message, "hello world");
//! ```

use paylens_core::error::PaylensError;
use paylens_core::pipeline::LineParser;
use paylens_core::types::LogLine;

use crate::error::LogPipelineError;

/// 형식 이름
pub const FORMAT_NAME: &str = "logcat";

/// 메시지 앞에 오는 필드 수
const HEADER_FIELDS: usize = 6;

/// logcat 라인 분류기
///
/// core의 [`LineParser`] trait을 구현합니다. 분류에 실패한 라인은 에러로,
/// [`classify`](Self::classify)를 쓰면 `None`으로 돌려받습니다.
#[derive(Debug, Clone)]
pub struct LogcatParser {
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl LogcatParser {
    /// 기본 설정으로 새 분류기를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: 64 * 1024, // 64KB
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 라인을 분류합니다. 실패하면 `None`을 반환합니다.
    pub fn classify(&self, raw: &str) -> Option<LogLine> {
        match self.parse_line(raw) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::trace!(error = %e, "rejected log line");
                None
            }
        }
    }

    fn parse_line(&self, raw: &str) -> Result<LogLine, LogPipelineError> {
        if raw.len() > self.max_input_size {
            return Err(LogPipelineError::Parse {
                format: FORMAT_NAME.to_owned(),
                offset: 0,
                reason: format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.max_input_size
                ),
            });
        }

        let input = raw.trim_end_matches(['\r', '\n']);

        let mut fields: [&str; HEADER_FIELDS] = [""; HEADER_FIELDS];
        let mut rest = input;
        for (index, slot) in fields.iter_mut().enumerate() {
            rest = rest.trim_start_matches(' ');
            let end = rest.find(' ').unwrap_or(rest.len());
            if end == 0 {
                return Err(missing_fields(input, index));
            }
            *slot = &rest[..end];
            rest = &rest[end..];
        }

        let message = rest.trim_start_matches(' ');
        if message.is_empty() {
            return Err(missing_fields(input, HEADER_FIELDS));
        }

        let [date, time, pid, tid, level, tag] = fields;

        Ok(LogLine {
            date: date.to_owned(),
            time: time.to_owned(),
            pid: pid.to_owned(),
            tid: tid.to_owned(),
            level: level.to_owned(),
            tag: tag.trim_end_matches(':').to_owned(),
            message: message.to_owned(),
        })
    }
}

fn missing_fields(input: &str, found: usize) -> LogPipelineError {
    LogPipelineError::Parse {
        format: FORMAT_NAME.to_owned(),
        offset: input.len(),
        reason: format!("expected {} fields, found {found}", HEADER_FIELDS + 1),
    }
}

impl Default for LogcatParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser for LogcatParser {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn parse(&self, raw: &str) -> Result<LogLine, PaylensError> {
        self.parse_line(raw).map_err(PaylensError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_name_is_logcat() {
        assert_eq!(LogcatParser::new().format_name(), "logcat");
    }

    #[test]
    fn classify_recovers_all_fields() {
        let parser = LogcatParser::new();
        let line = parser
            .classify("01-15 12:00:00.123 1234 5678 D IsoHelper: packRequest|0200|")
            .unwrap();
        assert_eq!(line.date, "01-15");
        assert_eq!(line.time, "12:00:00.123");
        assert_eq!(line.pid, "1234");
        assert_eq!(line.tid, "5678");
        assert_eq!(line.level, "D");
        assert_eq!(line.tag, "IsoHelper");
        assert_eq!(line.message, "packRequest|0200|");
    }

    #[test]
    fn message_keeps_internal_whitespace() {
        let parser = LogcatParser::new();
        let line = parser
            .classify("01-15 12:00:00.123 1 2 I Tag: a  b   c ")
            .unwrap();
        assert_eq!(line.message, "a  b   c ");
    }

    #[test]
    fn header_runs_of_spaces_collapse() {
        let parser = LogcatParser::new();
        let line = parser
            .classify("01-15 12:00:00.123  1234  5678 W   APP_CMD_PROXY:   capkDataList")
            .unwrap();
        assert_eq!(line.pid, "1234");
        assert_eq!(line.level, "W");
        assert_eq!(line.tag, "APP_CMD_PROXY");
        assert_eq!(line.message, "capkDataList");
    }

    #[test]
    fn trailing_colons_are_stripped_from_tag() {
        let parser = LogcatParser::new();
        let line = parser.classify("d t p t l Tag:: msg").unwrap();
        assert_eq!(line.tag, "Tag");
    }

    #[test]
    fn trailing_newline_is_trimmed() {
        let parser = LogcatParser::new();
        let line = parser.classify("d t p t l Tag: msg\r\n").unwrap();
        assert_eq!(line.message, "msg");
    }

    #[test]
    fn fewer_than_seven_tokens_is_rejected() {
        let parser = LogcatParser::new();
        assert!(parser.classify("").is_none());
        assert!(parser.classify("01-15 12:00:00.123 1234 5678 D").is_none());
        assert!(parser.classify("01-15 12:00:00.123 1234 5678 D Tag:").is_none());
        assert!(parser.classify("01-15 12:00:00.123 1234 5678 D Tag:   ").is_none());
        assert!(parser.classify("--------- beginning of main").is_none());
    }

    #[test]
    fn parse_returns_error_on_rejection() {
        let parser = LogcatParser::new();
        let err = parser.parse("too short").unwrap_err();
        assert!(err.to_string().contains("expected 7 fields"));
    }

    #[test]
    fn parse_too_large_input_fails() {
        let parser = LogcatParser::new().with_max_input_size(10);
        assert!(parser.classify("d t p t l Tag: a long enough message").is_none());
    }

    #[test]
    fn display_reclassifies_to_same_line() {
        let parser = LogcatParser::new();
        let raw = "01-15 12:00:00.123 1234 5678 D IsoHelper: 003|000000|";
        let line = parser.classify(raw).unwrap();
        assert_eq!(parser.classify(&line.to_string()), Some(line));
    }

    fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._|-]{1,12}"
    }

    proptest! {
        #[test]
        fn exact_field_recovery(
            date in token(),
            time in token(),
            pid in token(),
            tid in token(),
            level in token(),
            tag in "[A-Za-z0-9_]{1,12}",
            message in "[A-Za-z0-9|=]{1}[A-Za-z0-9 |=]{0,40}",
        ) {
            let raw = format!("{date} {time} {pid} {tid} {level} {tag}: {message}");
            let line = LogcatParser::new().classify(&raw).unwrap();
            prop_assert_eq!(line.date, date);
            prop_assert_eq!(line.time, time);
            prop_assert_eq!(line.pid, pid);
            prop_assert_eq!(line.tid, tid);
            prop_assert_eq!(line.level, level);
            prop_assert_eq!(line.tag, tag);
            prop_assert_eq!(line.message, message);
        }

        #[test]
        fn short_lines_never_classify(tokens in proptest::collection::vec(token(), 0..7)) {
            let raw = tokens.join(" ");
            prop_assert!(LogcatParser::new().classify(&raw).is_none());
        }

        #[test]
        fn classify_never_panics(raw in ".{0,200}") {
            let _ = LogcatParser::new().classify(&raw);
        }
    }
}
