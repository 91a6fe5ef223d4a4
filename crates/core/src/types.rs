//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 라인 분류기가 만드는 [`LogLine`]부터 디코더가 생성하는
//! [`TransactionMessage`], [`ConfigTreeNode`], [`Receipt`]까지
//! 모든 모듈이 공유하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// logcat 로그 라인
///
/// 라인 분류기가 원시 텍스트 한 줄에서 추출한 7개 필드입니다.
/// 분류에 실패한 라인은 `LogLine`으로 만들어지지 않습니다.
///
/// 역직렬화 시 export 파일의 PascalCase 필드명(`Date`, `ProcessId` 등)도 허용합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogLine {
    /// 날짜 (예: `01-15`)
    #[serde(alias = "Date")]
    pub date: String,
    /// 시각 (예: `12:00:00.123`)
    #[serde(alias = "Time")]
    pub time: String,
    /// 프로세스 ID
    #[serde(alias = "ProcessId")]
    pub pid: String,
    /// 스레드 ID
    #[serde(alias = "ThreadId")]
    pub tid: String,
    /// 로그 레벨 (V, D, I, W, E, F)
    #[serde(alias = "Level")]
    pub level: String,
    /// 태그 (끝의 콜론 제거됨)
    #[serde(alias = "Tag")]
    pub tag: String,
    /// 메시지 본문 (내부 공백 보존)
    #[serde(alias = "Message")]
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}: {}",
            self.date, self.time, self.pid, self.tid, self.level, self.tag, self.message,
        )
    }
}

/// 스트림에 내장된 메시지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// 금융 거래 메시지 (ISO 8583)
    Transaction,
    /// 단말 설정 레코드 (host record JSON)
    HostRecord,
    /// 프린터 영수증 덤프
    Receipt,
}

impl MessageKind {
    /// 시작 마커 판정 순서
    pub const ALL: [MessageKind; 3] = [Self::Transaction, Self::HostRecord, Self::Receipt];

    /// 종류 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::HostRecord => "host_record",
            Self::Receipt => "receipt",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── 거래 메시지 ─────────────────────────────────────────────────────

/// 거래 메시지의 데이터 요소 (필드)
///
/// `length`가 있으면 `values`는 선언 뒤에 이어진 반복 하위 값들이고,
/// 없으면 값은 정확히 하나입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    /// 선언된 길이
    pub length: Option<usize>,
    /// 값 목록
    pub values: Vec<String>,
}

impl DataElement {
    /// 단일 값 필드를 생성합니다.
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            length: None,
            values: vec![value.into()],
        }
    }

    /// 길이가 선언된 반복 값 필드를 생성합니다.
    pub fn repeated(length: usize, values: Vec<String>) -> Self {
        Self {
            length: Some(length),
            values,
        }
    }

    /// 모든 값을 이어 붙인 문자열을 반환합니다.
    pub fn joined(&self) -> String {
        self.values.concat()
    }

    /// 선언된 개수만큼 하위 값이 도착하지 않았는지 확인합니다.
    pub fn is_incomplete(&self) -> bool {
        self.length.is_some_and(|length| self.values.len() < length)
    }
}

/// 필드 55 (ICC 데이터) 디코딩 결과
///
/// TLV 디코딩 실패는 이 필드에만 국한되며, 메시지의 나머지는 정상 디코딩됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IccData {
    /// 디코딩 성공
    Decoded {
        /// 형제 TLV 노드 목록
        nodes: Vec<TlvNode>,
        /// 고정 폭으로 재배열한 원본 hex (표시용)
        display: Vec<String>,
    },
    /// 디코딩 실패
    Fault {
        /// 원본 hex 문자열
        raw: String,
        /// 실패 사유
        reason: String,
    },
}

/// TLV 노드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlvNode {
    /// 태그 (대문자 hex, 1~2바이트)
    pub tag: String,
    /// 값 길이 (바이트)
    pub length: usize,
    /// 값 (대문자 hex)
    pub value: String,
}

impl fmt::Display for TlvNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.tag, self.length, self.value)
    }
}

/// 디코딩된 거래 메시지
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    /// 메시지 타입 (4자리)
    pub message_type: String,
    /// 비트맵 (원문 그대로)
    pub bitmap: String,
    /// 필드 번호 → 데이터 요소
    pub data_elements: BTreeMap<u32, DataElement>,
    /// 필드 55 TLV 디코딩 결과
    pub icc: Option<IccData>,
}

impl TransactionMessage {
    /// 새 메시지를 생성합니다.
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            ..Self::default()
        }
    }

    /// 요청 메시지인지 확인합니다.
    pub fn is_request(&self) -> bool {
        is_request_message(&self.message_type)
    }

    /// 데이터 요소를 조회합니다.
    pub fn data_element(&self, field: u32) -> Option<&DataElement> {
        self.data_elements.get(&field)
    }

    /// `|` 구분 라인 형식으로 다시 인코딩합니다.
    ///
    /// 단일 값 필드는 `NNN|value|`, 길이 선언 필드는 `NNN|len|` 다음에
    /// 하위 값마다 `|value|` 한 줄을 씁니다.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("packRequest|{}|", self.message_type),
            format!("|{}|", self.bitmap),
        ];

        for (field, element) in &self.data_elements {
            match element.length {
                None => {
                    lines.push(format!("{field:03}|{}|", element.joined()));
                }
                Some(length) => {
                    lines.push(format!("{field:03}|{length}|"));
                    lines.extend(element.values.iter().map(|v| format!("|{v}|")));
                }
            }
        }

        lines
    }
}

/// 메시지 타입이 요청(`..00`, `..20`)인지 판정합니다.
pub fn is_request_message(message_type: &str) -> bool {
    message_type.ends_with("00") || message_type.ends_with("20")
}

// ─── 설정 레코드 트리 ─────────────────────────────────────────────────

/// 설정 레코드 최상위 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordCategory {
    /// K 레코드 (CA 공개키)
    KRecord,
    /// A 레코드 (접촉식 EMV 설정)
    ARecord,
    /// X 레코드 (비접촉식 EMV 설정)
    XRecord,
    /// C 레코드 (카드 prefix 설정)
    CRecord,
    /// 카드 설정
    CardConfigs,
}

impl RecordCategory {
    /// 모든 분류
    pub const ALL: [RecordCategory; 5] = [
        Self::KRecord,
        Self::ARecord,
        Self::XRecord,
        Self::CRecord,
        Self::CardConfigs,
    ];

    /// JSON 최상위 키
    pub fn key(&self) -> &'static str {
        match self {
            Self::KRecord => "K_RECORD",
            Self::ARecord => "A_RECORD",
            Self::XRecord => "X_RECORD",
            Self::CRecord => "C_RECORD",
            Self::CardConfigs => "CARD_CONFIGS",
        }
    }

    /// 표시용 제목
    pub fn title(&self) -> &'static str {
        match self {
            Self::KRecord => "K Records (CA Public Key)",
            Self::ARecord => "A Records (Contact Configs)",
            Self::XRecord => "X Records (Contactless Config)",
            Self::CRecord => "C Records (Card Prefix Configs)",
            Self::CardConfigs => "Card Configs",
        }
    }

    /// JSON 최상위 키에서 분류를 찾습니다.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 배열 항목의 하위 분류 (라벨 추출 방식 결정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// CA 공개키 항목 (RID/index/exponent 라벨 조회)
    KeyEntry,
    /// EMV 애플리케이션 항목 (AID + 앱 이름)
    Emv,
    /// 카드 BIN 범위 항목
    CardRange,
}

/// 설정 레코드 트리 노드
///
/// 필터가 바뀌면 트리 전체가 다시 만들어집니다. 일치 여부는
/// `matches_filter`로 표시만 하며 노드를 제거하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTreeNode {
    /// 소속 분류 (루트만 `None`)
    pub category: Option<RecordCategory>,
    /// 표시 라벨
    pub label: String,
    /// JSON 키 (배열 항목 노드는 없음)
    pub key: Option<String>,
    /// 스칼라 값 (리프 노드만)
    pub value: Option<String>,
    /// 자식 노드
    pub children: Vec<ConfigTreeNode>,
    /// 현재 필터와 일치 여부
    pub matches_filter: bool,
}

impl ConfigTreeNode {
    /// 자식이 없는 노드를 생성합니다.
    pub fn new(category: Option<RecordCategory>, label: impl Into<String>) -> Self {
        Self {
            category,
            label: label.into(),
            key: None,
            value: None,
            children: Vec::new(),
            matches_filter: false,
        }
    }

    /// 리프 노드인지 확인합니다.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 필터 비교에 쓰이는 표시 값 (리프는 값, 그 외는 라벨)
    pub fn displayed_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }

    /// 자신을 포함한 전체 노드 수
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// 필터와 일치하는 노드 수
    pub fn matching_count(&self) -> usize {
        usize::from(self.matches_filter)
            + self.children.iter().map(Self::matching_count).sum::<usize>()
    }

    /// 깊이 우선 순서로 모든 노드를 나열합니다.
    pub fn flatten(&self) -> Vec<&ConfigTreeNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}

/// 설정 레코드
///
/// 원본 JSON 문서를 보관하므로 필터가 바뀔 때 트리를 통째로 다시 만들 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// 최상위 JSON 객체
    pub document: serde_json::Map<String, serde_json::Value>,
    /// 현재 필터 상태로 만든 트리
    pub root: ConfigTreeNode,
}

/// 설정 트리 필터
///
/// 빈 문자열 조건은 조건 없음으로 취급합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFilter {
    /// 대상 분류
    pub category: RecordCategory,
    /// 일치해야 하는 JSON 키
    pub field: Option<String>,
    /// 표시 값에 포함되어야 하는 문자열 (대소문자 구분)
    pub value: Option<String>,
}

impl TreeFilter {
    /// 새 필터를 생성합니다.
    pub fn new(category: RecordCategory, field: Option<String>, value: Option<String>) -> Self {
        Self {
            category,
            field: field.filter(|f| !f.is_empty()),
            value: value.filter(|v| !v.is_empty()),
        }
    }

    /// 분류가 일치하는 노드가 조건을 만족하는지 확인합니다.
    pub fn matches(&self, node: &ConfigTreeNode) -> bool {
        node.category == Some(self.category)
            && self
                .field
                .as_deref()
                .is_none_or(|field| node.key.as_deref() == Some(field))
            && self
                .value
                .as_deref()
                .is_none_or(|value| node.displayed_value().contains(value))
    }
}

// ─── 영수증 ───────────────────────────────────────────────────────────

/// 디코딩된 영수증
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// 거래 번호 + 사본 구분 (`M` 가맹점, `C` 고객)
    pub name: String,
    /// 섹션 목록
    pub sections: Vec<ReceiptSection>,
}

/// 영수증 섹션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiptSection {
    /// 이미지 (로고)
    Image {
        alignment: Option<String>,
        text_before: Option<String>,
        text_after: Option<String>,
    },
    /// 빈 줄
    Blank { count: u32 },
    /// 텍스트 열
    Text {
        columns: Vec<ColumnStyle>,
        contents: Vec<String>,
    },
}

/// 텍스트 섹션의 열 스타일
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStyle {
    pub start: u32,
    pub end: u32,
    pub alignment: Option<String>,
    pub font: Option<Font>,
}

/// 열 글꼴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: String,
    pub weight: String,
    pub style: String,
    pub width: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_display_is_logcat_shape() {
        let line = LogLine {
            date: "01-15".to_owned(),
            time: "12:00:00.123".to_owned(),
            pid: "1234".to_owned(),
            tid: "5678".to_owned(),
            level: "D".to_owned(),
            tag: "IsoHelper".to_owned(),
            message: "packRequest|0200|".to_owned(),
        };
        assert_eq!(
            line.to_string(),
            "01-15 12:00:00.123 1234 5678 D IsoHelper: packRequest|0200|"
        );
    }

    #[test]
    fn log_line_accepts_pascal_case_fields() {
        let json = r#"{"Id":3,"Date":"01-15","Time":"12:00:00.000","ProcessId":"1","ThreadId":"2","Level":"I","Tag":"T","Message":"hello","PackageName":"x"}"#;
        let line: LogLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.pid, "1");
        assert_eq!(line.tid, "2");
        assert_eq!(line.message, "hello");
    }

    #[test]
    fn request_predicate() {
        assert!(is_request_message("0200"));
        assert!(is_request_message("0420"));
        assert!(!is_request_message("0210"));
        assert!(!is_request_message("0430"));
        assert!(TransactionMessage::new("0100").is_request());
    }

    #[test]
    fn record_category_lookup_is_exhaustive() {
        for category in RecordCategory::ALL {
            assert_eq!(RecordCategory::from_key(category.key()), Some(category));
        }
        assert_eq!(RecordCategory::from_key("Z_RECORD"), None);
    }

    #[test]
    fn to_lines_encodes_single_and_repeated_fields() {
        let mut msg = TransactionMessage::new("0200");
        msg.bitmap = "7234054128C28200".to_owned();
        msg.data_elements.insert(3, DataElement::single("000000"));
        msg.data_elements.insert(
            55,
            DataElement::repeated(2, vec!["9F0206".to_owned(), "000000001000".to_owned()]),
        );

        let lines = msg.to_lines();
        assert_eq!(
            lines,
            vec![
                "packRequest|0200|",
                "|7234054128C28200|",
                "003|000000|",
                "055|2|",
                "|9F0206|",
                "|000000001000|",
            ]
        );
    }

    #[test]
    fn incomplete_counts_sub_values_not_characters() {
        let short = DataElement::repeated(2, vec!["ABCDEF".to_owned()]);
        assert!(short.is_incomplete());

        let full = DataElement::repeated(2, vec!["AB".to_owned(), "CD".to_owned()]);
        assert!(!full.is_incomplete());

        // 긴 하위 값 하나가 선언 개수를 채우지는 않음
        let wide = DataElement::repeated(3, vec!["9F02060000000010009F0306".to_owned()]);
        assert!(wide.is_incomplete());

        assert!(!DataElement::single("000000").is_incomplete());
    }

    #[test]
    fn tree_counts() {
        let mut root = ConfigTreeNode::new(None, "Host Record");
        let mut child = ConfigTreeNode::new(Some(RecordCategory::KRecord), "K");
        child.matches_filter = true;
        child.children.push(ConfigTreeNode::new(Some(RecordCategory::KRecord), "leaf"));
        root.children.push(child);

        assert_eq!(root.node_count(), 3);
        assert_eq!(root.matching_count(), 1);
        assert_eq!(root.flatten().len(), 3);
        assert!(!root.is_leaf());
    }

    #[test]
    fn tree_filter_normalizes_empty_conditions() {
        let filter = TreeFilter::new(
            RecordCategory::CRecord,
            Some(String::new()),
            Some(String::new()),
        );
        assert_eq!(filter.field, None);
        assert_eq!(filter.value, None);

        let node = ConfigTreeNode::new(Some(RecordCategory::CRecord), "anything");
        assert!(filter.matches(&node));
        let other = ConfigTreeNode::new(Some(RecordCategory::KRecord), "anything");
        assert!(!filter.matches(&other));
    }

    #[test]
    fn tree_filter_compares_key_and_displayed_value() {
        let mut leaf = ConfigTreeNode::new(Some(RecordCategory::CardConfigs), "cardScheme: VISA");
        leaf.key = Some("cardScheme".to_owned());
        leaf.value = Some("VISA".to_owned());

        let hit = TreeFilter::new(
            RecordCategory::CardConfigs,
            Some("cardScheme".to_owned()),
            Some("VIS".to_owned()),
        );
        assert!(hit.matches(&leaf));

        let wrong_case =
            TreeFilter::new(RecordCategory::CardConfigs, None, Some("visa".to_owned()));
        assert!(!wrong_case.matches(&leaf));

        let wrong_key = TreeFilter::new(RecordCategory::CardConfigs, Some("aid".to_owned()), None);
        assert!(!wrong_key.matches(&leaf));
    }
}
