//! CA 공개키 라벨 조회 테이블
//!
//! `RID + index + exponent` 복합 키에서 표시 라벨로의 읽기 전용 맵입니다.
//! 한 번 로드한 뒤 `Arc<LabelLookup>`으로 공유하며 잠금 없이 읽습니다.
//!
//! 파일 형식은 평탄한 JSON 객체입니다.
//! ```json
//! { "A0000000039203": "VISA 1984", "A00000000405": "MASTERCARD 2048" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::error::LogPipelineError;

/// 라벨 조회 실패 시 표시 라벨
pub const UNKNOWN_LABEL: &str = "OTHERS";

/// 라벨 조회 테이블
#[derive(Debug, Clone, Default)]
pub struct LabelLookup {
    labels: HashMap<String, String>,
}

impl LabelLookup {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON 객체 문자열에서 테이블을 만듭니다.
    pub fn from_json(json: &str) -> Result<Self, LogPipelineError> {
        let labels: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { labels })
    }

    /// JSON 파일에서 테이블을 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LogPipelineError::Lookup {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let lookup = Self::from_json(&content).map_err(|e| LogPipelineError::Lookup {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            path = %path.display(),
            entries = lookup.len(),
            "loaded key label lookup"
        );
        Ok(lookup)
    }

    /// 복합 키로 라벨을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// RID, index, exponent로 라벨을 조회합니다.
    pub fn label_for(&self, rid: &str, index: &str, exponent: &str) -> Option<&str> {
        self.get(&format!("{rid}{index}{exponent}"))
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, String)> for LabelLookup {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_json_reads_flat_object() {
        let lookup = LabelLookup::from_json(r#"{"A0000000039203": "VISA 1984"}"#).unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup.label_for("A000000003", "92", "03"), Some("VISA 1984"));
        assert_eq!(lookup.label_for("A000000003", "99", "03"), None);
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(LabelLookup::from_json("[1, 2, 3]").is_err());
    }

    #[tokio::test]
    async fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"A00000000405": "MC TEST"}}"#).unwrap();

        let lookup = LabelLookup::load(file.path()).await.unwrap();
        assert_eq!(lookup.get("A00000000405"), Some("MC TEST"));
    }

    #[tokio::test]
    async fn load_missing_file_reports_path() {
        let err = LabelLookup::load("/nonexistent/CAPK.json").await.unwrap_err();
        assert!(matches!(err, LogPipelineError::Lookup { .. }));
        assert!(err.to_string().contains("CAPK.json"));
    }

    #[test]
    fn collects_from_pairs() {
        let lookup: LabelLookup = [("k".to_owned(), "v".to_owned())].into_iter().collect();
        assert!(!lookup.is_empty());
    }
}
