//! 이벤트 시스템 — 디코더와 구독자 사이의 통신 단위
//!
//! 디스패처는 디코딩한 메시지를 [`DecodedEvent`]로 감싸 이벤트 버스에 발행합니다.
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{ConfigRecord, MessageKind, Receipt, TransactionMessage};

// --- 모듈명 상수 ---

/// 로그 파이프라인 모듈명
pub const MODULE_LOG_PIPELINE: &str = "log-pipeline";

// --- 토픽 상수 ---

/// 거래 메시지 토픽
pub const TOPIC_TRANSACTION: &str = "transaction.decoded";
/// 설정 레코드 토픽
pub const TOPIC_HOST_RECORD: &str = "host_record.decoded";
/// 영수증 토픽
pub const TOPIC_RECEIPT: &str = "receipt.decoded";

/// 메시지 종류에 해당하는 토픽을 반환합니다.
pub fn topic_for(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Transaction => TOPIC_TRANSACTION,
        MessageKind::HostRecord => TOPIC_HOST_RECORD,
        MessageKind::Receipt => TOPIC_RECEIPT,
    }
}

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 디코딩 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DecodedPayload {
    /// 거래 메시지
    Transaction(TransactionMessage),
    /// 설정 레코드
    HostRecord(ConfigRecord),
    /// 영수증
    Receipt(Receipt),
}

impl DecodedPayload {
    /// 결과의 메시지 종류
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Transaction(_) => MessageKind::Transaction,
            Self::HostRecord(_) => MessageKind::HostRecord,
            Self::Receipt(_) => MessageKind::Receipt,
        }
    }
}

/// 디코딩 완료 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 디코딩 결과
    pub payload: DecodedPayload,
}

impl DecodedEvent {
    /// 새로운 trace를 시작하는 이벤트를 생성합니다.
    pub fn new(payload: DecodedPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_LOG_PIPELINE),
            payload,
        }
    }

    /// 이벤트가 발행될 토픽
    pub fn topic(&self) -> &'static str {
        topic_for(self.payload.kind())
    }
}

impl Event for DecodedEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        self.payload.kind().as_str()
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} id={}", self.metadata, self.payload.kind(), self.id)
    }
}

/// SystemTime을 사람이 읽을 수 있는 형태로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => format!("{}", duration.as_secs()),
        Err(_) => "unknown".to_owned(),
    }
}
