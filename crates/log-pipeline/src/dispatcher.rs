//! 디스패처 워커
//!
//! 큐에서 라인을 하나씩 꺼내 재조립 상태 머신에 넣고, 완료된 메시지를
//! 종류별로 디코딩해 이벤트 버스에 발행합니다.
//!
//! # 종료 조건
//! - 취소 토큰: 다음 폴링 경계에서 멈추고 열린 버퍼는 버림
//! - 큐 닫힘 (모든 생산자 drop): 남은 라인을 모두 처리한 뒤 열린 버퍼를 완료

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use paylens_core::event::{DecodedEvent, DecodedPayload};
use paylens_core::metrics as m;
use paylens_core::pipeline::EventBus;
use paylens_core::types::{IccData, LogLine, MessageKind};

use crate::decoder::MessageDecoder;
use crate::queue::LineReceiver;
use crate::reassembly::{CompletedMessage, Reassembler};

/// 이 수만큼 연속 처리하면 런타임에 양보
const YIELD_EVERY: u64 = 256;

/// 워커 처리 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// 처리한 라인 수
    pub lines_processed: u64,
    /// 어떤 메시지에도 속하지 않은 라인 수
    pub lines_ignored: u64,
    /// 재조립이 완료된 메시지 수
    pub messages_completed: u64,
    /// 디코딩된 거래 메시지 수
    pub transactions: u64,
    /// 디코딩된 설정 레코드 수
    pub host_records: u64,
    /// 디코딩된 영수증 수
    pub receipts: u64,
    /// 디코딩에 실패해 버려진 메시지 수
    pub messages_dropped: u64,
    /// 필드 55 디코딩 실패 수
    pub icc_faults: u64,
}

impl DispatchStats {
    /// 디코딩된 메시지 총수
    pub fn decoded_total(&self) -> u64 {
        self.transactions + self.host_records + self.receipts
    }

    fn record_decoded(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::Transaction => self.transactions += 1,
            MessageKind::HostRecord => self.host_records += 1,
            MessageKind::Receipt => self.receipts += 1,
        }
    }
}

/// 여러 태스크가 읽는 통계 스냅샷
pub type SharedStats = Arc<Mutex<DispatchStats>>;

/// 공유 통계의 현재 값을 읽습니다.
pub fn snapshot(stats: &SharedStats) -> DispatchStats {
    *stats.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// 취소 요청으로 멈춤
    Cancelled,
    /// 큐가 닫혀 모두 처리함
    Drained,
}

/// 디스패처 워커
pub struct Dispatcher {
    reassembler: Reassembler,
    decoder: MessageDecoder,
    bus: Arc<dyn EventBus>,
    poll_interval: Duration,
    stats: DispatchStats,
    shared: SharedStats,
}

impl Dispatcher {
    /// 새 워커를 생성합니다.
    pub fn new(
        reassembler: Reassembler,
        decoder: MessageDecoder,
        bus: Arc<dyn EventBus>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            reassembler,
            decoder,
            bus,
            poll_interval,
            stats: DispatchStats::default(),
            shared: Arc::new(Mutex::new(DispatchStats::default())),
        }
    }

    /// 공유 통계 핸들
    pub fn stats_handle(&self) -> SharedStats {
        Arc::clone(&self.shared)
    }

    /// 현재 통계
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// 큐를 비우며 실행합니다. 종료 사유를 반환합니다.
    pub async fn run(mut self, mut rx: LineReceiver, cancel: CancellationToken) -> DispatchExit {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "dispatcher started"
        );
        let mut since_yield = 0u64;

        let exit = loop {
            if cancel.is_cancelled() {
                let discarded = self.reassembler.discard();
                if discarded > 0 {
                    tracing::info!(lines = discarded, "discarded unfinished message on cancel");
                }
                break DispatchExit::Cancelled;
            }

            match rx.try_recv() {
                Ok(line) => {
                    self.process_line(&line);
                    since_yield += 1;
                    if since_yield >= YIELD_EVERY {
                        since_yield = 0;
                        tokio::task::yield_now().await;
                    }
                }
                Err(TryRecvError::Empty) => {
                    since_yield = 0;
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(TryRecvError::Disconnected) => {
                    self.flush();
                    break DispatchExit::Drained;
                }
            }
        };

        metrics::gauge!(m::REASSEMBLY_ACTIVE).set(0.0);
        tracing::info!(
            exit = ?exit,
            lines = self.stats.lines_processed,
            decoded = self.stats.decoded_total(),
            dropped = self.stats.messages_dropped,
            "dispatcher stopped"
        );
        exit
    }

    /// 라인 하나를 처리합니다.
    pub fn process_line(&mut self, line: &LogLine) {
        self.stats.lines_processed += 1;
        metrics::counter!(m::LINES_RECEIVED_TOTAL).increment(1);

        let was_capturing = self.reassembler.is_capturing();
        let completed = self.reassembler.feed(line);
        let capturing = self.reassembler.is_capturing();

        if !was_capturing && !capturing {
            self.stats.lines_ignored += 1;
            metrics::counter!(m::LINES_IGNORED_TOTAL).increment(1);
        }
        metrics::gauge!(m::REASSEMBLY_ACTIVE).set(if capturing { 1.0 } else { 0.0 });

        if let Some(message) = completed {
            self.dispatch(message);
        }
        self.publish_stats();
    }

    /// 열린 버퍼를 완료하고 디코딩합니다.
    pub fn flush(&mut self) {
        if let Some(message) = self.reassembler.finalize() {
            tracing::debug!(
                kind = %message.kind,
                lines = message.lines.len(),
                "flushing open message"
            );
            self.dispatch(message);
        }
        self.publish_stats();
    }

    fn dispatch(&mut self, message: CompletedMessage) {
        let kind = message.kind;
        self.stats.messages_completed += 1;
        metrics::counter!(m::MESSAGES_ASSEMBLED_TOTAL, m::LABEL_KIND => kind.as_str()).increment(1);

        let payload = match self.decoder.decode(&message) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.messages_dropped += 1;
                metrics::counter!(m::MESSAGES_DROPPED_TOTAL, m::LABEL_KIND => kind.as_str())
                    .increment(1);
                tracing::debug!(
                    %kind,
                    lines = message.lines.len(),
                    error = %e,
                    "dropping undecodable message"
                );
                return;
            }
        };

        if let DecodedPayload::Transaction(tx) = &payload
            && let Some(IccData::Fault { reason, .. }) = &tx.icc
        {
            self.stats.icc_faults += 1;
            metrics::counter!(m::ICC_FAULTS_TOTAL).increment(1);
            tracing::warn!(
                message_type = tx.message_type.as_str(),
                reason = reason.as_str(),
                "field 55 could not be decoded"
            );
        }

        self.stats.record_decoded(kind);
        metrics::counter!(m::MESSAGES_DECODED_TOTAL, m::LABEL_KIND => kind.as_str()).increment(1);

        let event = DecodedEvent::new(payload);
        let delivered = self.bus.publish(event.topic(), &event);
        tracing::debug!(
            %kind,
            event_id = event.id.as_str(),
            delivered,
            "published decoded message"
        );
    }

    fn publish_stats(&self) {
        *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = self.stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::decoder::TlvDecoder;
    use crate::lookup::LabelLookup;
    use crate::parser::LogcatParser;
    use crate::queue;
    use paylens_core::event::{TOPIC_HOST_RECORD, TOPIC_TRANSACTION};

    fn dispatcher(bus: Arc<InMemoryBus>) -> Dispatcher {
        let decoder = MessageDecoder::new(
            vec!["packRequest".to_owned(), "unpackResponse".to_owned()],
            TlvDecoder::default(),
            Arc::new(LabelLookup::new()),
        )
        .unwrap();
        Dispatcher::new(Reassembler::default(), decoder, bus, Duration::from_millis(5))
    }

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

    #[test]
    fn decodes_and_publishes_completed_messages() {
        let bus = Arc::new(InMemoryBus::new());
        let mut rx = bus.subscribe_channel(TOPIC_TRANSACTION);
        let mut worker = dispatcher(Arc::clone(&bus));

        for l in [
            line("Iso", "noise"),
            line("Iso", "packRequest|0200|"),
            line("Iso", "|BITMAP|"),
            line("Iso", "055|9F02FF|"),
            line("Iso", "end"),
        ] {
            worker.process_line(&l);
        }

        let stats = worker.stats();
        assert_eq!(stats.lines_processed, 5);
        assert_eq!(stats.lines_ignored, 1);
        assert_eq!(stats.transactions, 1);
        assert_eq!(stats.icc_faults, 1);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event.payload, DecodedPayload::Transaction(_)));
    }

    #[test]
    fn undecodable_messages_are_counted_as_dropped() {
        let bus = Arc::new(InMemoryBus::new());
        let mut worker = dispatcher(Arc::clone(&bus));

        worker.process_line(&line("APP_CMD_PROXY", "capkDataList broken {"));
        worker.process_line(&line("Other", "x"));

        let stats = snapshot(&worker.stats_handle());
        assert_eq!(stats.messages_completed, 1);
        assert_eq!(stats.messages_dropped, 1);
        assert_eq!(stats.decoded_total(), 0);
    }

    #[tokio::test]
    async fn closed_queue_flushes_open_buffer() {
        let bus = Arc::new(InMemoryBus::new());
        let mut events = bus.subscribe_channel(TOPIC_HOST_RECORD);
        let worker = dispatcher(Arc::clone(&bus));
        let stats = worker.stats_handle();

        let (sender, rx) = queue::channel(LogcatParser::new());
        sender
            .push(line("APP_CMD_PROXY", r#"HostRecord = {"K_RECORD": {"capkDataList": []}}"#))
            .unwrap();
        drop(sender);

        let exit = worker.run(rx, CancellationToken::new()).await;
        assert_eq!(exit, DispatchExit::Drained);
        assert_eq!(snapshot(&stats).host_records, 1);
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_open_buffer() {
        let bus = Arc::new(InMemoryBus::new());
        let mut events = bus.subscribe_channel(TOPIC_TRANSACTION);
        let worker = dispatcher(Arc::clone(&bus));
        let stats = worker.stats_handle();

        let (sender, rx) = queue::channel(LogcatParser::new());
        sender.push(line("Iso", "packRequest|0200|")).unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(rx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), DispatchExit::Cancelled);
        assert_eq!(snapshot(&stats).lines_processed, 1);
        assert_eq!(snapshot(&stats).transactions, 0);
        assert!(events.try_recv().is_err());
        drop(sender);
    }
}
