//! 설정 레코드(host record) 디코더
//!
//! 재조립된 JSON 문서를 분류별 트리([`ConfigTreeNode`])로 변환합니다.
//! 원본 문서는 [`ConfigRecord`]에 남겨 두고, 필터가 바뀔 때마다
//! [`HostRecordDecoder::rebuild`]로 트리 전체를 다시 만듭니다.
//!
//! # 트리 구성
//! - 루트 `Host Record` 아래에 인식된 최상위 분류 노드 (`K_RECORD` 등)
//! - 배열 키는 항목 종류 표([`entry_kind_for`])에 따라 라벨을 뽑습니다
//! - 스칼라 키는 `"key: value"` 리프가 되고, `id` 키는 항상 생략합니다

use std::sync::Arc;

use serde_json::{Map, Value};

use paylens_core::types::{ConfigRecord, ConfigTreeNode, EntryKind, RecordCategory, TreeFilter};

use crate::error::LogPipelineError;
use crate::lookup::{LabelLookup, UNKNOWN_LABEL};

/// 루트 노드 라벨
pub const ROOT_LABEL: &str = "Host Record";

/// 로그 프레이밍 구분자 (`HostRecord = {...}`)
const FRAME_SEPARATOR: &str = " = ";

/// 항상 생략하는 키
const SUPPRESSED_KEY: &str = "id";

const K_RECORD_FIELDS: &[&str] = &["expiryDate", "exponent", "modulus", "rid", "ridIndex", "sha1"];

const EMV_FIELDS: &[&str] = &[
    "aid",
    "appVersion",
    "currencyLabel",
    "defaultAccount",
    "defaultDdol",
    "defaultTdol",
    "emvNonEmvRefundTransaction",
    "enabled",
    "maxTargetPercentage",
    "recommendedAppName",
    "tacDefault",
    "tacDenial",
    "tacOnline",
    "targetPercentage",
    "terminalCapabilities",
    "thresholdValue",
];

const C_RECORD_FIELDS: &[&str] = &[
    "accountGroupingCodeOffline",
    "accountGroupingCodeOnline",
    "addressVerification",
    "addressVerificationSwipe",
    "binRangeHigh",
    "binRangeLow",
    "cardCashEnable",
    "cardCashbackEnable",
    "cardPinBypassEnable",
    "cardRefundEnable",
    "cardSaleEnable",
    "cardScheme",
    "cardVoidCashEnable",
    "checkSvc",
    "clessEnabled",
    "cvcPrompt",
    "cvvBypassCheck",
    "emvEnabled",
    "enabled",
    "expDateCheckMode",
    "luhnCheckMode",
    "magstripePinRequired",
    "manualEnabled",
    "manualPinRequired",
    "offlinePurchaseWithoutCashTxnLimit",
    "onlineCashTxnLimit",
    "onlinePurchaseWithCashTxnLimit",
    "onlinePurchaseWithoutCashTxnLimit",
    "onlineRefundTxnLimit",
    "panMaxLength",
    "panMinLength",
    "panTruncationEnd",
    "panTruncationStart",
    "swipeEnabled",
    "txnAuthorityRequirement",
    "velocityCard",
];

/// 분류별 필터 후보 필드 (정렬됨)
pub fn filter_fields(category: RecordCategory) -> &'static [&'static str] {
    match category {
        RecordCategory::KRecord => K_RECORD_FIELDS,
        RecordCategory::ARecord | RecordCategory::XRecord => EMV_FIELDS,
        RecordCategory::CRecord => C_RECORD_FIELDS,
        RecordCategory::CardConfigs => &[],
    }
}

/// 배열 키에 해당하는 항목 종류
pub fn entry_kind_for(key: &str) -> Option<EntryKind> {
    match key {
        "capkDataList" => Some(EntryKind::KeyEntry),
        "contactConfigs" | "clessConfig" => Some(EntryKind::Emv),
        "cardConfigs" => Some(EntryKind::CardRange),
        _ => None,
    }
}

/// 설정 레코드 디코더
#[derive(Debug, Clone)]
pub struct HostRecordDecoder {
    lookup: Arc<LabelLookup>,
}

impl HostRecordDecoder {
    /// 라벨 조회 테이블을 주입받아 디코더를 생성합니다.
    pub fn new(lookup: Arc<LabelLookup>) -> Self {
        Self { lookup }
    }

    /// 재조립된 라인들을 이어 붙여 디코딩합니다.
    pub fn decode(&self, lines: &[String]) -> Result<ConfigRecord, LogPipelineError> {
        self.decode_text(&lines.concat())
    }

    /// 텍스트 하나를 디코딩합니다.
    ///
    /// `" = "`가 있으면 처음 나타난 위치 뒤쪽만 JSON 문서로 봅니다.
    pub fn decode_text(&self, text: &str) -> Result<ConfigRecord, LogPipelineError> {
        let json = text
            .split_once(FRAME_SEPARATOR)
            .map_or(text, |(_, rest)| rest);

        let value: Value =
            serde_json::from_str(json.trim()).map_err(|e| decode_error(e.to_string()))?;
        let Value::Object(document) = value else {
            return Err(decode_error("top level is not an object"));
        };

        let root = self.build_tree(&document, None);
        if root.children.is_empty() {
            return Err(decode_error("no recognised record category"));
        }

        tracing::debug!(
            categories = root.children.len(),
            nodes = root.node_count(),
            "decoded host record"
        );

        Ok(ConfigRecord { document, root })
    }

    /// 보관된 문서로 트리를 다시 만들고 필터 일치 여부를 표시합니다.
    pub fn rebuild(&self, record: &mut ConfigRecord, filter: Option<&TreeFilter>) {
        record.root = self.build_tree(&record.document, filter);
    }

    /// 문서에서 트리를 만듭니다.
    pub fn build_tree(
        &self,
        document: &Map<String, Value>,
        filter: Option<&TreeFilter>,
    ) -> ConfigTreeNode {
        let mut root = ConfigTreeNode::new(None, ROOT_LABEL);

        for (key, value) in document {
            let Some(category) = RecordCategory::from_key(key) else {
                continue;
            };

            let mut node = ConfigTreeNode::new(Some(category), category.title());
            node.key = Some(category.key().to_owned());
            node.children = self.value_children(value, category, entry_kind_for(category.key()));
            root.children.push(node);
        }

        if let Some(filter) = filter {
            mark_matches(&mut root, filter);
        }
        root
    }

    fn value_children(
        &self,
        value: &Value,
        category: RecordCategory,
        entry: Option<EntryKind>,
    ) -> Vec<ConfigTreeNode> {
        match value {
            Value::Object(map) => self.object_children(map, category),
            Value::Array(items) => self.array_children(items, category, entry),
            _ => Vec::new(),
        }
    }

    fn object_children(
        &self,
        map: &Map<String, Value>,
        category: RecordCategory,
    ) -> Vec<ConfigTreeNode> {
        let mut children = Vec::with_capacity(map.len());

        for (key, value) in map {
            if key == SUPPRESSED_KEY {
                continue;
            }

            let node = match value {
                Value::Array(items) => {
                    let mut node = ConfigTreeNode::new(Some(category), key.as_str());
                    node.key = Some(key.clone());
                    node.children = self.array_children(items, category, entry_kind_for(key));
                    node
                }
                Value::Object(inner) => {
                    let mut node = ConfigTreeNode::new(Some(category), key.as_str());
                    node.key = Some(key.clone());
                    node.children = self.object_children(inner, category);
                    node
                }
                scalar => {
                    let text = scalar_text(scalar);
                    let mut node = ConfigTreeNode::new(Some(category), format!("{key}: {text}"));
                    node.key = Some(key.clone());
                    node.value = Some(text);
                    node
                }
            };
            children.push(node);
        }

        children
    }

    fn array_children(
        &self,
        items: &[Value],
        category: RecordCategory,
        entry: Option<EntryKind>,
    ) -> Vec<ConfigTreeNode> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                if !item.is_object() && !item.is_array() {
                    let text = scalar_text(item);
                    let mut leaf =
                        ConfigTreeNode::new(Some(category), format!("[{index}]: {text}"));
                    leaf.value = Some(text);
                    return leaf;
                }

                let label = match entry {
                    Some(kind) => self
                        .entry_label(kind, item)
                        .unwrap_or_else(|| index.to_string()),
                    None => format!("[{index}]"),
                };

                let mut node = ConfigTreeNode::new(Some(category), label);
                node.children = self.value_children(item, category, None);
                node
            })
            .collect()
    }

    /// 항목 종류별 라벨을 뽑습니다. 필요한 키가 없으면 `None`입니다.
    pub fn entry_label(&self, kind: EntryKind, item: &Value) -> Option<String> {
        let object = item.as_object()?;
        let field = |key: &str| {
            object
                .get(key)
                .filter(|v| !v.is_object() && !v.is_array())
                .map(scalar_text)
        };

        match kind {
            EntryKind::Emv => {
                let aid = field("aid")?;
                let name = field("recommendedAppName")?;
                Some(format!("{aid} ({name})"))
            }
            EntryKind::CardRange => {
                let low = field("binRangeLow")?;
                let high = field("binRangeHigh")?;
                let scheme = field("cardScheme")?;
                Some(format!("{low:0<8}-{high} ({scheme})"))
            }
            EntryKind::KeyEntry => {
                let rid = field("rid")?;
                let index = field("ridIndex")?;
                let exponent = field("exponent")?;
                let label = self
                    .lookup
                    .label_for(&rid, &index, &exponent)
                    .unwrap_or(UNKNOWN_LABEL);
                Some(format!("{label} ({rid}, {index}, {exponent})"))
            }
        }
    }
}

fn mark_matches(node: &mut ConfigTreeNode, filter: &TreeFilter) {
    node.matches_filter = filter.matches(node);
    for child in &mut node.children {
        mark_matches(child, filter);
    }
}

/// 스칼라 값을 표시 문자열로 바꿉니다 (문자열은 따옴표 없이).
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_error(reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Decode {
        kind: "host_record".to_owned(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"HostRecord = {
        "K_RECORD": {"capkDataList": [
            {"id": 1, "rid": "A000000003", "ridIndex": "92", "exponent": "03", "modulus": "AB12"},
            {"id": 2, "rid": "A000000004", "ridIndex": "05", "exponent": "03"},
            {"rid": "A000000025"}
        ]},
        "A_RECORD": {"contactConfigs": [
            {"aid": "A0000000031010", "recommendedAppName": "VISA CREDIT", "enabled": true}
        ]},
        "C_RECORD": {"cardConfigs": [
            {"binRangeLow": "0", "binRangeHigh": "00005000", "cardScheme": "VISA", "panMinLength": 16},
            "plain"
        ]},
        "VENDOR_EXTRA": {"ignored": true}
    }"#;

    fn decoder() -> HostRecordDecoder {
        let lookup: LabelLookup = [("A0000000039203".to_owned(), "VISA 1984".to_owned())]
            .into_iter()
            .collect();
        HostRecordDecoder::new(Arc::new(lookup))
    }

    fn find<'a>(root: &'a ConfigTreeNode, label: &str) -> Option<&'a ConfigTreeNode> {
        root.flatten().into_iter().find(|n| n.label == label)
    }

    #[test]
    fn categories_follow_document_order_and_drop_unknown_keys() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        assert_eq!(record.root.label, ROOT_LABEL);
        let titles: Vec<_> = record.root.children.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "K Records (CA Public Key)",
                "A Records (Contact Configs)",
                "C Records (Card Prefix Configs)",
            ]
        );
        assert!(record.document.contains_key("VENDOR_EXTRA"));

        let record = decoder()
            .decode_text(r#"{"C_RECORD": {}, "X_RECORD": {}, "K_RECORD": {}}"#)
            .unwrap();
        let keys: Vec<_> = record
            .root
            .children
            .iter()
            .filter_map(|n| n.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["C_RECORD", "X_RECORD", "K_RECORD"]);
    }

    #[test]
    fn card_range_label_pads_low_bin() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        assert!(find(&record.root, "00000000-00005000 (VISA)").is_some());
    }

    #[test]
    fn key_entry_label_uses_lookup_or_fallback() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        assert!(find(&record.root, "VISA 1984 (A000000003, 92, 03)").is_some());
        assert!(find(&record.root, "OTHERS (A000000004, 05, 03)").is_some());
        // 필요한 키가 빠지면 위치 인덱스
        let list = find(&record.root, "capkDataList").unwrap();
        assert_eq!(list.children[2].label, "2");
    }

    #[test]
    fn emv_label_and_scalar_leaves() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        let emv = find(&record.root, "A0000000031010 (VISA CREDIT)").unwrap();
        let leaf = emv.children.iter().find(|n| n.key.as_deref() == Some("enabled")).unwrap();
        assert_eq!(leaf.label, "enabled: true");
        assert_eq!(leaf.value.as_deref(), Some("true"));
        assert!(leaf.is_leaf());
    }

    #[test]
    fn id_key_is_suppressed() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        assert!(record.root.flatten().iter().all(|n| n.key.as_deref() != Some("id")));
    }

    #[test]
    fn scalar_array_elements_become_indexed_leaves() {
        let record = decoder().decode_text(SAMPLE).unwrap();
        let leaf = find(&record.root, "[1]: plain").unwrap();
        assert_eq!(leaf.value.as_deref(), Some("plain"));
    }

    #[test]
    fn untyped_arrays_use_bracketed_index() {
        let record = decoder()
            .decode_text(r#"{"X_RECORD": {"extras": [{"a": 1}, {"b": 2}]}}"#)
            .unwrap();
        assert!(find(&record.root, "[0]").is_some());
        assert!(find(&record.root, "[1]").is_some());
    }

    #[test]
    fn decode_joins_lines_without_separator() {
        let lines = vec![
            "HostRecord = {\"C_RECORD\":{\"cardConfigs\":[{\"binRangeLow\":\"4\",".to_owned(),
            "\"binRangeHigh\":\"49999999\",\"cardScheme\":\"VISA\"}]}}".to_owned(),
        ];
        let record = decoder().decode(&lines).unwrap();
        assert!(find(&record.root, "40000000-49999999 (VISA)").is_some());
    }

    #[test]
    fn structural_faults_are_rejected() {
        let d = decoder();
        assert!(d.decode_text("HostRecord = {not json").is_err());
        assert!(d.decode_text("[1, 2]").is_err());
        assert!(d.decode_text(r#"{"UNKNOWN": {}}"#).is_err());
    }

    #[test]
    fn filter_flags_without_pruning() {
        let d = decoder();
        let mut record = d.decode_text(SAMPLE).unwrap();
        let before = record.root.node_count();
        assert_eq!(record.root.matching_count(), 0);

        let filter = TreeFilter::new(
            RecordCategory::CRecord,
            Some("cardScheme".to_owned()),
            Some("VISA".to_owned()),
        );
        d.rebuild(&mut record, Some(&filter));
        assert_eq!(record.root.node_count(), before);
        assert_eq!(record.root.matching_count(), 1);
        let hit = record.root.flatten().into_iter().find(|n| n.matches_filter).unwrap();
        assert_eq!(hit.label, "cardScheme: VISA");
    }

    #[test]
    fn filter_is_idempotent() {
        let d = decoder();
        let mut record = d.decode_text(SAMPLE).unwrap();
        let filter = TreeFilter::new(RecordCategory::KRecord, None, Some("03".to_owned()));

        d.rebuild(&mut record, Some(&filter));
        let once = record.root.clone();
        d.rebuild(&mut record, Some(&filter));
        assert_eq!(record.root, once);

        d.rebuild(&mut record, None);
        assert_eq!(record.root.matching_count(), 0);
        assert_eq!(record.root.node_count(), once.node_count());
    }

    #[test]
    fn category_only_filter_flags_whole_category() {
        let d = decoder();
        let mut record = d.decode_text(SAMPLE).unwrap();
        let filter = TreeFilter::new(RecordCategory::ARecord, None, None);
        d.rebuild(&mut record, Some(&filter));

        let category = &record.root.children[1];
        assert_eq!(record.root.matching_count(), category.node_count());
        assert!(!record.root.matches_filter);
    }

    #[test]
    fn filter_fields_are_sorted() {
        for category in RecordCategory::ALL {
            let fields = filter_fields(category);
            assert!(fields.windows(2).all(|w| w[0] < w[1]), "{category}");
        }
        assert!(filter_fields(RecordCategory::XRecord).contains(&"aid"));
        assert!(filter_fields(RecordCategory::CardConfigs).is_empty());
    }
}
