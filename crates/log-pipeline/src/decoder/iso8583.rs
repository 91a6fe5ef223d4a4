//! 거래 메시지(ISO 8583) 필드 디코더
//!
//! 재조립된 `|` 구분 라인들을 [`TransactionMessage`]로 변환합니다.
//!
//! ```text
//! packRequest|0200|          <- sentinel: 메시지 타입
//! |7234054128C28200|         <- 비트맵
//! 003|000000|                <- 2토큰: 새 필드
//! 055|24|                    <- 2토큰: 값이 이후 길이로 재해석될 수 있음
//! |9F02060000000010|         <- 1토큰: 열린 필드에 이어 붙임
//! ```

use std::collections::BTreeMap;

use paylens_core::types::{DataElement, TransactionMessage};

use crate::decoder::tlv::TlvDecoder;
use crate::error::LogPipelineError;

/// ICC 데이터 필드 번호
pub const ICC_FIELD: u32 = 55;

/// 값이 hex로 인코딩된 ASCII 텍스트인 필드
pub const ASCII_FIELDS: &[u32] = &[
    37, 38, 39, 40, 41, 42, 43, 44, 54, 56, 57, 58, 59, 60, 61, 62, 63, 91, 92, 93, 94, 95, 98,
    101, 102, 103, 104,
];

/// ASCII 디코딩 대상 필드인지 확인합니다.
pub fn is_ascii_field(field: u32) -> bool {
    ASCII_FIELDS.contains(&field)
}

/// 라인을 `|`로 나누고 공백을 다듬어 빈 토큰을 버립니다.
fn tokenize(line: &str) -> Vec<&str> {
    line.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// 거래 메시지 디코더
pub struct TransactionDecoder {
    sentinels: Vec<String>,
    tlv: TlvDecoder,
}

impl TransactionDecoder {
    /// 새 디코더를 생성합니다.
    ///
    /// `sentinels`는 메시지 타입 라인을 알아보는 데 쓰입니다.
    pub fn new(sentinels: Vec<String>, tlv: TlvDecoder) -> Self {
        Self { sentinels, tlv }
    }

    fn is_sentinel(&self, line: &str) -> bool {
        self.sentinels.iter().any(|s| line.contains(s.as_str()))
    }

    /// 라인들을 디코딩합니다.
    ///
    /// 메시지 타입을 찾지 못하면 구조적 에러입니다.
    pub fn decode(&self, lines: &[String]) -> Result<TransactionMessage, LogPipelineError> {
        let mut message_type: Option<String> = None;
        let mut bitmap = String::new();
        let mut expect_bitmap = false;
        let mut fields: BTreeMap<u32, DataElement> = BTreeMap::new();
        let mut open: Option<u32> = None;

        for line in lines {
            if self.is_sentinel(line) {
                if let Some(mti) = tokenize(line).get(1) {
                    message_type = Some((*mti).to_owned());
                }
                expect_bitmap = true;
                open = None;
                continue;
            }

            if expect_bitmap {
                bitmap = line.trim().trim_matches('|').trim().to_owned();
                expect_bitmap = false;
                continue;
            }

            let tokens = tokenize(line);
            match tokens.as_slice() {
                [number, value] => {
                    let Ok(field) = number.parse::<u32>() else {
                        tracing::debug!(
                            line = line.as_str(),
                            "dropping line with non-numeric field number"
                        );
                        continue;
                    };

                    if let Some(previous) = open.and_then(|f| fields.get(&f))
                        && previous.is_incomplete()
                    {
                        tracing::debug!(
                            field = open,
                            declared = previous.length,
                            received = previous.values.len(),
                            "abandoning field with unmet length"
                        );
                    }

                    fields.insert(field, DataElement::single(*value));
                    open = Some(field);
                }
                [value] => {
                    let Some(element) = open.and_then(|f| fields.get_mut(&f)) else {
                        continue;
                    };
                    continue_field(element, value);
                }
                _ => {}
            }
        }

        let message_type = message_type.ok_or_else(|| LogPipelineError::Decode {
            kind: "transaction".to_owned(),
            reason: "no message type line".to_owned(),
        })?;

        for (field, element) in fields.iter_mut() {
            if is_ascii_field(*field) {
                for value in element.values.iter_mut() {
                    if let Some(text) = hex_to_ascii(value) {
                        *value = text;
                    }
                }
            }
        }

        let icc = fields
            .get(&ICC_FIELD)
            .map(|element| self.tlv.decode_icc(&element.joined()));

        Ok(TransactionMessage {
            message_type,
            bitmap,
            data_elements: fields,
            icc,
        })
    }
}

/// 1토큰 라인으로 열린 필드를 이어갑니다.
fn continue_field(element: &mut DataElement, token: &str) {
    if element.length.is_some() || element.values.len() != 1 {
        element.values.push(token.to_owned());
        return;
    }

    match element.values[0].parse::<usize>() {
        Ok(length) => {
            element.length = Some(length);
            element.values = vec![token.to_owned()];
        }
        Err(_) => element.values[0].push_str(token),
    }
}

/// hex 문자열을 ASCII 텍스트로 변환합니다. hex가 아니면 `None`입니다.
fn hex_to_ascii(value: &str) -> Option<String> {
    let bytes = hex::decode(value).ok()?;
    Some(bytes.into_iter().map(char::from).collect())
}

/// ASCII 필드 값을 다시 hex로 인코딩합니다.
pub fn ascii_to_hex(text: &str) -> String {
    text.chars()
        .map(|c| format!("{:02X}", u32::from(c) & 0xFF))
        .collect()
}
