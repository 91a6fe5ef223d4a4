//! 영수증 덤프 디코더
//!
//! 프린터 로그의 `LinePrinterReceipt(sections=[...])` 덤프를 [`Receipt`]로 변환합니다.
//!
//! ```text
//! LinePrinterReceipt(sections=[
//!     LinePrinterImageSection(image=..., alignment=CENTER, textBefore=null, textAfter=null),
//!     LinePrinterBlankSection(count=1),
//!     LinePrinterTextSection(style=LinePrinterTextSectionStyle(columns=[
//!         LinePrinterColumnStyle(start=0, end=48, alignment=LEFT, font=Font(...))
//!     ]), contents=[TRAN, 000123])
//! ])
//! ```
//!
//! 중첩 괄호는 깊이를 세어 나누고, 스칼라 속성만 정규식으로 뽑습니다.
//! 같은 이름의 영수증은 처음 한 번만 내보냅니다. 기억하는 이름 수에는
//! 상한이 있고, 넘치면 가장 오래된 이름부터 잊습니다.

use std::collections::{HashSet, VecDeque};

use regex::Regex;

use paylens_core::types::{ColumnStyle, Font, Receipt, ReceiptSection};

use crate::error::LogPipelineError;

/// 덤프 시작 표식
const RECEIPT_MARKER: &str = "LinePrinterReceipt(";

/// 본문에서 버리는 잡음 라인 표식
const NOISE_MARKERS: &[&str] = &["printReceiptLog", "PrinterImpl"];

/// 거래 번호 앞 표식
const TRAN_MARKER: &str = "TRAN, ";

/// 거래 번호 길이 (문자 수)
const TRAN_LEN: usize = 6;

/// 거래 번호가 없는 영수증 이름
pub const UNNAMED_RECEIPT: &str = "UNKNOWN";

/// 중복 검사를 위해 기억하는 영수증 이름의 기본 최대 개수
pub const DEFAULT_SEEN_CAPACITY: usize = 4096;

const IMAGE_SECTION: &str = "LinePrinterImageSection";
const BLANK_SECTION: &str = "LinePrinterBlankSection";
const TEXT_SECTION: &str = "LinePrinterTextSection";

/// 컴파일된 속성 패턴
#[derive(Debug)]
struct Patterns {
    alignment: Regex,
    text_before: Regex,
    text_after: Regex,
    count: Regex,
    start: Regex,
    end: Regex,
    font: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, LogPipelineError> {
        Ok(Self {
            alignment: Regex::new(r"alignment=([A-Z_]+)")?,
            text_before: Regex::new(r"textBefore=([^,)]+)")?,
            text_after: Regex::new(r"textAfter=([^,)]+)")?,
            count: Regex::new(r"count=(\d+)")?,
            start: Regex::new(r"start=(\d+)")?,
            end: Regex::new(r"end=(\d+)")?,
            font: Regex::new(
                r"font=Font\(family=([^,]+), size=([^,]+), weight=([^,]+), style=([^,]+), width=([^)]+)\)",
            )?,
        })
    }
}

/// 영수증 디코더
///
/// 이미 내보낸 영수증 이름을 기억하므로 워커 하나가 소유합니다.
#[derive(Debug)]
pub struct ReceiptDecoder {
    patterns: Patterns,
    seen: HashSet<String>,
    /// 기억한 순서 (오래된 것이 앞)
    seen_order: VecDeque<String>,
    seen_capacity: usize,
}

impl ReceiptDecoder {
    /// 새 디코더를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            patterns: Patterns::compile()?,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            seen_capacity: DEFAULT_SEEN_CAPACITY,
        })
    }

    /// 기억할 영수증 이름의 최대 개수를 설정합니다 (최소 1).
    pub fn with_seen_capacity(mut self, capacity: usize) -> Self {
        self.seen_capacity = capacity.max(1);
        self
    }

    /// 재조립된 라인들을 디코딩합니다.
    ///
    /// 이미 본 이름이면 중복으로 거부합니다.
    pub fn decode(&mut self, lines: &[String]) -> Result<Receipt, LogPipelineError> {
        let text: String = lines
            .iter()
            .filter(|line| !is_noise(line))
            .map(String::as_str)
            .collect();

        let receipt = self.decode_text(&text)?;

        if receipt.name != UNNAMED_RECEIPT && !self.remember(&receipt.name) {
            return Err(decode_error(format!("duplicate receipt {}", receipt.name)));
        }

        tracing::debug!(
            name = receipt.name.as_str(),
            sections = receipt.sections.len(),
            "decoded receipt"
        );
        Ok(receipt)
    }

    /// 이름을 기억합니다. 이미 기억하고 있으면 `false`입니다.
    fn remember(&mut self, name: &str) -> bool {
        if !self.seen.insert(name.to_owned()) {
            return false;
        }
        self.seen_order.push_back(name.to_owned());
        while self.seen_order.len() > self.seen_capacity {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// 덤프 텍스트 하나를 디코딩합니다. 중복 검사는 하지 않습니다.
    pub fn decode_text(&self, text: &str) -> Result<Receipt, LogPipelineError> {
        let body = text
            .find(RECEIPT_MARKER)
            .map(|pos| &text[pos..])
            .ok_or_else(|| decode_error("no receipt marker"))?;

        let sections = bracketed(body, "sections=[")
            .ok_or_else(|| decode_error("unterminated section list"))?;

        let sections = split_top_level(sections)
            .into_iter()
            .filter_map(|section| self.parse_section(section))
            .collect();

        Ok(Receipt {
            name: receipt_name(text),
            sections,
        })
    }

    /// 섹션 문자열 하나를 해석합니다. 알 수 없는 섹션은 `None`입니다.
    fn parse_section(&self, section: &str) -> Option<ReceiptSection> {
        if section.starts_with(IMAGE_SECTION) {
            Some(ReceiptSection::Image {
                alignment: capture(&self.patterns.alignment, section),
                text_before: capture(&self.patterns.text_before, section).filter(|t| t != "null"),
                text_after: capture(&self.patterns.text_after, section).filter(|t| t != "null"),
            })
        } else if section.starts_with(BLANK_SECTION) {
            let count = capture(&self.patterns.count, section)
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            Some(ReceiptSection::Blank { count })
        } else if section.starts_with(TEXT_SECTION) {
            let columns = bracketed(section, "columns=[")
                .map(|inner| {
                    split_top_level(inner)
                        .into_iter()
                        .map(|column| self.parse_column(column))
                        .collect()
                })
                .unwrap_or_default();

            let contents = match bracketed(section, "contents=[") {
                Some(inner) if !inner.trim().is_empty() => {
                    inner.split(',').map(|c| c.trim().to_owned()).collect()
                }
                _ => Vec::new(),
            };

            Some(ReceiptSection::Text { columns, contents })
        } else {
            tracing::debug!(section, "skipping unknown receipt section");
            None
        }
    }

    fn parse_column(&self, column: &str) -> ColumnStyle {
        let number = |pattern: &Regex| {
            capture(pattern, column)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0)
        };

        let font = self.patterns.font.captures(column).map(|caps| Font {
            family: caps[1].trim().to_owned(),
            size: caps[2].trim().to_owned(),
            weight: caps[3].trim().to_owned(),
            style: caps[4].trim().to_owned(),
            width: caps[5].trim().to_owned(),
        });

        ColumnStyle {
            start: number(&self.patterns.start),
            end: number(&self.patterns.end),
            alignment: capture(&self.patterns.alignment, column),
            font,
        }
    }

    /// 지금까지 내보낸 영수증 수
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

fn is_noise(line: &str) -> bool {
    !line.contains(RECEIPT_MARKER) && NOISE_MARKERS.iter().any(|m| line.contains(m))
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .map(|caps| caps[1].trim().to_owned())
}

/// 거래 번호와 사본 구분(`M` 가맹점, `C` 고객)으로 이름을 만듭니다.
fn receipt_name(text: &str) -> String {
    let Some((_, rest)) = text.split_once(TRAN_MARKER) else {
        return UNNAMED_RECEIPT.to_owned();
    };

    let mut name: String = rest.chars().take(TRAN_LEN).collect();
    if text.contains("MERCHANT COPY") {
        name.push('M');
    } else if text.contains("CUSTOMER COPY") {
        name.push('C');
    }
    name
}

/// `prefix` 바로 뒤의 여는 괄호와 짝이 맞는 닫는 괄호 사이를 반환합니다.
///
/// `prefix`는 `[`로 끝나야 합니다.
fn bracketed<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let start = text.find(prefix)? + prefix.len();
    let mut depth = 1usize;

    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 괄호 바깥의 쉼표로 나눕니다.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut begin = 0;

    for (offset, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[begin..offset].trim());
                begin = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(text[begin..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn decode_error(reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Decode {
        kind: "receipt".to_owned(),
        reason: reason.into(),
    }
}
