//! 라인 파싱 모듈 -- logcat 텍스트 라인과 JSON export 레코드
//!
//! 각 파서는 core의 [`LineParser`](paylens_core::pipeline::LineParser) trait을 구현합니다.
//!
//! # 지원 형식
//! - logcat 텍스트 라인 ([`LogcatParser`])
//! - JSON export 레코드 ([`JsonLineParser`])

pub mod json;
pub mod logcat;

pub use json::{JsonLineParser, export_log_lines, import_log_lines};
pub use logcat::LogcatParser;
