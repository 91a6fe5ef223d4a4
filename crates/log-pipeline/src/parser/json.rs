//! JSON export 파일 가져오기/내보내기
//!
//! export 파일은 LogLine 형태 레코드의 평탄한 JSON 배열입니다.
//! 필드명은 snake_case와 PascalCase(`ProcessId` 등)를 모두 허용하고,
//! `Id`, `PackageName` 같은 추가 필드는 무시합니다.
//!
//! 가져온 레코드는 한 줄의 logcat 라인으로 다시 렌더링한 뒤 분류기를 거치므로,
//! 실시간 스트림과 동일한 규칙으로 검증됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use paylens_log_pipeline::parser::JsonLineParser;
//!
//! let parser = JsonLineParser::default();
//! let lines = parser.import_log_lines(&std::fs::read_to_string("capture.json")?)?;
//! ```

use paylens_core::error::PaylensError;
use paylens_core::pipeline::LineParser;
use paylens_core::types::LogLine;

use crate::error::LogPipelineError;
use crate::parser::logcat::LogcatParser;

/// 형식 이름
pub const FORMAT_NAME: &str = "json";

/// JSON 레코드 파서
///
/// 레코드 하나(JSON 객체)를 [`LogLine`]으로 변환합니다.
pub struct JsonLineParser {
    classifier: LogcatParser,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl JsonLineParser {
    /// 지정한 분류기로 새 파서를 생성합니다.
    pub fn new(classifier: LogcatParser) -> Self {
        Self {
            classifier,
            max_input_size: 256 * 1024 * 1024, // 256MB
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// export 배열 전체를 가져옵니다.
    ///
    /// 분류되지 않는 레코드는 건너뜁니다. 배열 자체가 잘못된 JSON이면 에러입니다.
    pub fn import_log_lines(&self, json: &str) -> Result<Vec<LogLine>, LogPipelineError> {
        self.check_size(json)?;

        let records: Vec<LogLine> = serde_json::from_str(json)?;
        let total = records.len();

        let lines: Vec<LogLine> = records
            .iter()
            .filter_map(|record| self.classifier.classify(&record.to_string()))
            .collect();

        if lines.len() < total {
            tracing::debug!(
                total,
                imported = lines.len(),
                "skipped records that do not classify"
            );
        }

        Ok(lines)
    }

    fn parse_record(&self, raw: &str) -> Result<LogLine, LogPipelineError> {
        self.check_size(raw)?;

        let record: LogLine = serde_json::from_str(raw.trim())?;
        let rendered = record.to_string();
        self.classifier
            .parse(&rendered)
            .map_err(|e| LogPipelineError::Parse {
                format: FORMAT_NAME.to_owned(),
                offset: 0,
                reason: e.to_string(),
            })
    }

    fn check_size(&self, raw: &str) -> Result<(), LogPipelineError> {
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
        Ok(())
    }
}

impl Default for JsonLineParser {
    fn default() -> Self {
        Self::new(LogcatParser::new())
    }
}

impl LineParser for JsonLineParser {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn parse(&self, raw: &str) -> Result<LogLine, PaylensError> {
        self.parse_record(raw).map_err(PaylensError::from)
    }
}

/// 기본 분류기로 export 배열을 가져옵니다.
pub fn import_log_lines(json: &str) -> Result<Vec<LogLine>, LogPipelineError> {
    JsonLineParser::default().import_log_lines(json)
}

/// 로그 라인을 export 형식(JSON 배열)으로 직렬화합니다.
pub fn export_log_lines(lines: &[LogLine]) -> Result<String, LogPipelineError> {
    Ok(serde_json::to_string_pretty(lines)?)
}
