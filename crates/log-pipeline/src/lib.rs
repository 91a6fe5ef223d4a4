#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: logcat 라인 분류기와 JSON 재수입
//! - [`reassembly`]: 여러 라인에 걸친 메시지 재조립 상태 머신
//! - [`decoder`]: 거래 메시지, TLV, 설정 레코드, 영수증 디코더
//! - [`lookup`]: CA 공개키 라벨 조회 테이블
//! - [`queue`]: 생산자 핸들과 무제한 수집 큐
//! - [`dispatcher`]: 큐를 비우는 워커와 처리 통계
//! - [`bus`]: 인메모리 이벤트 버스
//! - [`pipeline`]: 전체 생명주기 관리 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! raw line -> LogcatParser -> queue -> Dispatcher -> Reassembler -> MessageDecoder -> EventBus
//!                                                         |               |
//!                                              Transaction/HostRecord  iso8583 + tlv
//!                                                    /Receipt          host_record, receipt
//! ```

pub mod bus;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod lookup;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod reassembly;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{DecodePipeline, DecodePipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{JsonLineParser, LogcatParser, export_log_lines, import_log_lines};

// 재조립
pub use reassembly::{CompletedMessage, KindRule, KindRules, Reassembler};

// 디코더
pub use decoder::{
    HostRecordDecoder, MessageDecoder, ReceiptDecoder, TagMode, TlvDecoder, TlvError,
    TransactionDecoder,
};

// 큐, 워커, 버스
pub use bus::InMemoryBus;
pub use dispatcher::{DispatchExit, DispatchStats, Dispatcher};
pub use lookup::LabelLookup;
pub use queue::{LineReceiver, LineSender};
