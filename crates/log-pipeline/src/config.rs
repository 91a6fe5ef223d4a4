//! 디코딩 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`PipelineSection`](paylens_core::config::PipelineSection)을
//! 파이프라인 내부 타입(태그 모드, 경계 규칙)으로 옮긴 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use paylens_core::config::PaylensConfig;
//! use paylens_log_pipeline::config::PipelineConfig;
//!
//! let core_config = PaylensConfig::default();
//! let config = PipelineConfig::from_core(&core_config.pipeline);
//! ```

use std::time::Duration;

use paylens_core::config::PipelineSection;

use crate::decoder::tlv::{DEFAULT_DISPLAY_WIDTH, TagMode, TlvDecoder};
use crate::error::LogPipelineError;
use crate::reassembly::{KindRule, KindRules};

/// 대기 간격 상한 (밀리초)
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// 디코딩 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 큐가 비었을 때 대기 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 원시 라인 최대 길이 (바이트)
    pub max_line_length: usize,
    /// TLV 태그 모드
    pub tag_mode: TagMode,
    /// ICC 데이터 표시 폭 (hex 문자 수)
    pub tlv_display_width: usize,
    /// 종류별 경계 규칙
    pub rules: KindRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_line_length: 64 * 1024,
            tag_mode: TagMode::default(),
            tlv_display_width: DEFAULT_DISPLAY_WIDTH,
            rules: KindRules::default(),
        }
    }
}

impl PipelineConfig {
    /// core의 `PipelineSection`에서 파이프라인 설정을 생성합니다.
    ///
    /// 알 수 없는 태그 모드는 기본값으로 대체합니다 (core 검증을 거쳤다면 발생하지 않음).
    pub fn from_core(core: &PipelineSection) -> Self {
        let tag_mode = core.tlv_tag_mode.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = core.tlv_tag_mode.as_str(),
                "unknown tlv_tag_mode, using default"
            );
            TagMode::default()
        });

        Self {
            poll_interval_ms: core.poll_interval_ms,
            max_line_length: core.max_line_length,
            tag_mode,
            tlv_display_width: core.tlv_display_width,
            rules: KindRules {
                transaction: KindRule::from(&core.transaction),
                host_record: KindRule::from(&core.host_record),
                receipt: KindRule::from(&core.receipt),
            },
        }
    }

    /// 대기 간격
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 설정에 맞는 TLV 디코더
    pub fn tlv_decoder(&self) -> TlvDecoder {
        TlvDecoder::new(self.tag_mode, self.tlv_display_width)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(LogPipelineError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            });
        }

        if self.max_line_length == 0 {
            return Err(LogPipelineError::Config {
                field: "max_line_length".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.tlv_display_width == 0 || self.tlv_display_width % 2 != 0 {
            return Err(LogPipelineError::Config {
                field: "tlv_display_width".to_owned(),
                reason: "must be a positive even number".to_owned(),
            });
        }

        self.rules.validate()
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 대기 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 원시 라인 최대 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// TLV 태그 모드를 설정합니다.
    pub fn tag_mode(mut self, mode: TagMode) -> Self {
        self.config.tag_mode = mode;
        self
    }

    /// ICC 데이터 표시 폭을 설정합니다.
    pub fn tlv_display_width(mut self, width: usize) -> Self {
        self.config.tlv_display_width = width;
        self
    }

    /// 경계 규칙 전체를 설정합니다.
    pub fn rules(mut self, rules: KindRules) -> Self {
        self.config.rules = rules;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
