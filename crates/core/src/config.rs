//! 설정 관리 — paylens.toml 파싱 및 런타임 설정
//!
//! [`PaylensConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PAYLENS_PIPELINE_POLL_INTERVAL_MS=50` 형식)
//! 3. 설정 파일 (`paylens.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), paylens_core::error::PaylensError> {
//! use paylens_core::config::PaylensConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PaylensConfig::load("paylens.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PaylensConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PaylensError};

/// 지원하는 TLV 태그 모드
pub const TLV_TAG_MODES: [&str; 2] = ["single", "ber"];

/// poll 간격 상한 (밀리초)
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// paylens 통합 설정
///
/// `paylens.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaylensConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 디코딩 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// 라벨 조회 테이블 설정
    #[serde(default)]
    pub lookup: LookupConfig,
}

impl PaylensConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PaylensError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PaylensError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PaylensError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PaylensError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PaylensError> {
        toml::from_str(toml_str).map_err(|e| {
            PaylensError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PAYLENS_{SECTION}_{FIELD}`
    /// 예: `PAYLENS_PIPELINE_TLV_TAG_MODE=ber`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PAYLENS_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PAYLENS_GENERAL_LOG_FORMAT");

        // Pipeline
        override_u64(
            &mut self.pipeline.poll_interval_ms,
            "PAYLENS_PIPELINE_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.pipeline.max_line_length,
            "PAYLENS_PIPELINE_MAX_LINE_LENGTH",
        );
        override_string(
            &mut self.pipeline.tlv_tag_mode,
            "PAYLENS_PIPELINE_TLV_TAG_MODE",
        );
        override_usize(
            &mut self.pipeline.tlv_display_width,
            "PAYLENS_PIPELINE_TLV_DISPLAY_WIDTH",
        );

        // Kind rules
        self.pipeline
            .transaction
            .apply_env_overrides("PAYLENS_PIPELINE_TRANSACTION");
        self.pipeline
            .host_record
            .apply_env_overrides("PAYLENS_PIPELINE_HOST_RECORD");
        self.pipeline
            .receipt
            .apply_env_overrides("PAYLENS_PIPELINE_RECEIPT");

        // Lookup
        override_opt_string(
            &mut self.lookup.capk_labels_path,
            "PAYLENS_LOOKUP_CAPK_LABELS_PATH",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PaylensError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let pipeline = &self.pipeline;
        if pipeline.poll_interval_ms == 0 || pipeline.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(invalid(
                "pipeline.poll_interval_ms",
                format!("must be between 1 and {MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if pipeline.max_line_length == 0 {
            return Err(invalid(
                "pipeline.max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }

        if !TLV_TAG_MODES.contains(&pipeline.tlv_tag_mode.as_str()) {
            return Err(invalid(
                "pipeline.tlv_tag_mode",
                format!("must be one of: {}", TLV_TAG_MODES.join(", ")),
            ));
        }

        if pipeline.tlv_display_width == 0 || pipeline.tlv_display_width % 2 != 0 {
            return Err(invalid(
                "pipeline.tlv_display_width",
                "must be a positive even number of hex digits".to_owned(),
            ));
        }

        pipeline.transaction.validate("pipeline.transaction")?;
        pipeline.host_record.validate("pipeline.host_record")?;
        pipeline.receipt.validate("pipeline.receipt")?;

        if let Some(path) = &self.lookup.capk_labels_path
            && path.trim().is_empty()
        {
            return Err(invalid(
                "lookup.capk_labels_path",
                "must not be empty when set".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> PaylensError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 디코딩 파이프라인 설정 (`[pipeline]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// 큐가 비었을 때 대기 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 원시 라인 최대 길이 (바이트)
    pub max_line_length: usize,
    /// TLV 태그 모드 (single, ber)
    pub tlv_tag_mode: String,
    /// ICC 데이터 표시 폭 (hex 문자 수)
    pub tlv_display_width: usize,
    /// 거래 메시지 경계 규칙
    #[serde(default = "KindRuleConfig::transaction")]
    pub transaction: KindRuleConfig,
    /// 설정 레코드 경계 규칙
    #[serde(default = "KindRuleConfig::host_record")]
    pub host_record: KindRuleConfig,
    /// 영수증 경계 규칙
    #[serde(default = "KindRuleConfig::receipt")]
    pub receipt: KindRuleConfig,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_line_length: 64 * 1024,
            tlv_tag_mode: "single".to_owned(),
            tlv_display_width: 32,
            transaction: KindRuleConfig::transaction(),
            host_record: KindRuleConfig::host_record(),
            receipt: KindRuleConfig::receipt(),
        }
    }
}

/// 메시지 종류별 경계 규칙
///
/// 테이블을 지정하면 기본 규칙 전체를 대체합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindRuleConfig {
    /// 태그 부분 문자열 (없으면 모든 태그)
    #[serde(default)]
    pub tag_filter: Option<String>,
    /// 메시지 시작을 알리는 부분 문자열
    #[serde(default)]
    pub sentinels: Vec<String>,
    /// 연속 라인이 반드시 포함하는 문자열
    #[serde(default)]
    pub continuation: Option<String>,
}

impl KindRuleConfig {
    /// 거래 메시지 기본 규칙
    pub fn transaction() -> Self {
        Self {
            tag_filter: None,
            sentinels: vec!["packRequest".to_owned(), "unpackResponse".to_owned()],
            continuation: Some("|".to_owned()),
        }
    }

    /// 설정 레코드 기본 규칙
    pub fn host_record() -> Self {
        Self {
            tag_filter: Some("APP_CMD_PROXY".to_owned()),
            sentinels: vec!["capkDataList".to_owned()],
            continuation: None,
        }
    }

    /// 영수증 기본 규칙
    pub fn receipt() -> Self {
        Self {
            tag_filter: Some("Printer".to_owned()),
            sentinels: vec!["LinePrinterReceipt(sections=".to_owned()],
            continuation: None,
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) {
        override_opt_string(&mut self.tag_filter, &format!("{prefix}_TAG_FILTER"));
        override_csv(&mut self.sentinels, &format!("{prefix}_SENTINELS"));
        override_opt_string(&mut self.continuation, &format!("{prefix}_CONTINUATION"));
    }

    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self, section: &str) -> Result<(), PaylensError> {
        if self.sentinels.is_empty() || self.sentinels.iter().any(|s| s.is_empty()) {
            return Err(invalid(
                &format!("{section}.sentinels"),
                "at least one non-empty sentinel is required".to_owned(),
            ));
        }

        if self.tag_filter.as_deref() == Some("") {
            return Err(invalid(
                &format!("{section}.tag_filter"),
                "must not be empty when set".to_owned(),
            ));
        }

        if self.continuation.as_deref() == Some("") {
            return Err(invalid(
                &format!("{section}.continuation"),
                "must not be empty when set".to_owned(),
            ));
        }

        if self.tag_filter.is_none() && self.continuation.is_none() {
            return Err(invalid(
                section,
                "tag_filter or continuation is required to detect the end of a message"
                    .to_owned(),
            ));
        }

        Ok(())
    }
}

/// 라벨 조회 테이블 설정 (`[lookup]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// CA 공개키 라벨 JSON 파일 경로 (없으면 빈 테이블)
    pub capk_labels_path: Option<String>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
