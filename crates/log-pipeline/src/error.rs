//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for PaylensError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use paylens_core::error::{ConfigError, DecodeError, ParseError, PaylensError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 라인 파싱 실패
    #[error("parse error: {format} at offset {offset}: {reason}")]
    Parse {
        /// 파서 형식 (logcat, json 등)
        format: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 메시지 디코딩 실패
    #[error("decode error: {kind}: {reason}")]
    Decode {
        /// 메시지 종류
        kind: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 라벨 조회 테이블 로딩 실패
    #[error("lookup error: {path}: {reason}")]
    Lookup {
        /// 테이블 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for PaylensError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Parse { offset, reason, .. } => {
                PaylensError::Parse(ParseError::Failed { offset, reason })
            }
            LogPipelineError::Decode { kind, reason } => {
                PaylensError::Decode(DecodeError::Malformed { kind, reason })
            }
            LogPipelineError::Config { field, reason } => {
                PaylensError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Channel(reason) => {
                PaylensError::Pipeline(PipelineError::ChannelSend(reason))
            }
            LogPipelineError::Io(e) => PaylensError::Io(e),
            other => PaylensError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
