//! ICC 데이터(필드 55) TLV 디코더
//!
//! hex 문자열을 한 번 훑으며 `태그 | 길이 | 값` 노드를 차례로 읽습니다.
//!
//! - 태그: 1바이트. 하위 5비트가 모두 1(`& 0x1F == 0x1F`)이면 확장 태그
//! - 길이: 1바이트 (부호 없음, 값의 바이트 수)
//! - 값: 길이 바이트만큼
//!
//! 확장 태그를 몇 바이트까지 읽을지는 [`TagMode`]가 결정합니다.

use std::fmt;
use std::str::FromStr;

use paylens_core::types::{IccData, TlvNode};

/// 확장 태그 표시 비트
const TAG_EXTENSION_MASK: u8 = 0x1F;
/// 후속 태그 바이트 연속 비트
const TAG_CONTINUATION_BIT: u8 = 0x80;

/// 기본 표시 폭 (hex 문자 수)
pub const DEFAULT_DISPLAY_WIDTH: usize = 32;

/// TLV 디코딩 에러
///
/// 오프셋은 공백 제거 후 입력의 바이트 위치입니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    /// hex 문자 수가 홀수
    #[error("odd number of hex digits: {len}")]
    OddLength { len: usize },

    /// hex가 아닌 문자
    #[error("invalid hex digit {ch:?} at byte {offset}")]
    InvalidHex { offset: usize, ch: char },

    /// 확장 태그의 후속 바이트 없음
    #[error("tag truncated at byte {offset}")]
    MissingTag { offset: usize },

    /// 길이 바이트 없음
    #[error("length byte missing at byte {offset}")]
    MissingLength { offset: usize },

    /// 값이 남은 입력을 넘어섬
    #[error("value at byte {offset} declares {declared} bytes but only {available} remain")]
    ValueOverrun {
        offset: usize,
        declared: usize,
        available: usize,
    },
}

/// 확장 태그 해석 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMode {
    /// 확장 표시가 있으면 정확히 한 바이트를 더 읽음
    #[default]
    SingleExtension,
    /// 후속 바이트의 0x80 비트가 켜져 있는 동안 계속 읽음
    Ber,
}

impl FromStr for TagMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::SingleExtension),
            "ber" => Ok(Self::Ber),
            other => Err(format!("unknown tlv tag mode: {other}")),
        }
    }
}

impl fmt::Display for TagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleExtension => f.write_str("single"),
            Self::Ber => f.write_str("ber"),
        }
    }
}

/// TLV 디코더
#[derive(Debug, Clone, Copy)]
pub struct TlvDecoder {
    mode: TagMode,
    display_width: usize,
}

impl TlvDecoder {
    /// 새 디코더를 생성합니다.
    pub fn new(mode: TagMode, display_width: usize) -> Self {
        Self {
            mode,
            display_width,
        }
    }

    /// 태그 모드
    pub fn mode(&self) -> TagMode {
        self.mode
    }

    /// hex 문자열을 TLV 노드 목록으로 디코딩합니다.
    pub fn decode(&self, hex_str: &str) -> Result<Vec<TlvNode>, TlvError> {
        let bytes = decode_hex(hex_str)?;
        let mut nodes = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let tag_start = offset;
            let first = bytes[offset];
            offset += 1;

            if first & TAG_EXTENSION_MASK == TAG_EXTENSION_MASK {
                offset = self.read_extended_tag(&bytes, offset)?;
            }
            let tag = &bytes[tag_start..offset];

            let length = *bytes
                .get(offset)
                .ok_or(TlvError::MissingLength { offset })? as usize;
            offset += 1;

            let available = bytes.len() - offset;
            if length > available {
                return Err(TlvError::ValueOverrun {
                    offset,
                    declared: length,
                    available,
                });
            }

            let value = &bytes[offset..offset + length];
            offset += length;

            nodes.push(TlvNode {
                tag: hex::encode_upper(tag),
                length,
                value: hex::encode_upper(value),
            });
        }

        Ok(nodes)
    }

    /// 확장 태그의 후속 바이트를 읽고 다음 오프셋을 반환합니다.
    fn read_extended_tag(&self, bytes: &[u8], mut offset: usize) -> Result<usize, TlvError> {
        match self.mode {
            TagMode::SingleExtension => {
                if offset >= bytes.len() {
                    return Err(TlvError::MissingTag { offset });
                }
                Ok(offset + 1)
            }
            TagMode::Ber => loop {
                let byte = *bytes.get(offset).ok_or(TlvError::MissingTag { offset })?;
                offset += 1;
                if byte & TAG_CONTINUATION_BIT == 0 {
                    return Ok(offset);
                }
            },
        }
    }

    /// 필드 55 값을 디코딩하여 [`IccData`]로 만듭니다.
    ///
    /// 실패는 `IccData::Fault`에 담기며 메시지 전체를 실패시키지 않습니다.
    pub fn decode_icc(&self, hex_str: &str) -> IccData {
        match self.decode(hex_str) {
            Ok(nodes) => IccData::Decoded {
                nodes,
                display: format_hex_block(hex_str, self.display_width),
            },
            Err(e) => IccData::Fault {
                raw: hex_str.to_owned(),
                reason: e.to_string(),
            },
        }
    }
}

impl Default for TlvDecoder {
    fn default() -> Self {
        Self::new(TagMode::default(), DEFAULT_DISPLAY_WIDTH)
    }
}

/// 공백을 제거한 뒤 hex 문자열을 바이트로 변환합니다.
fn decode_hex(hex_str: &str) -> Result<Vec<u8>, TlvError> {
    let compact: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if let Some((index, ch)) = compact.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(TlvError::InvalidHex {
            offset: index / 2,
            ch,
        });
    }

    if compact.len() % 2 != 0 {
        return Err(TlvError::OddLength { len: compact.len() });
    }

    hex::decode(&compact).map_err(|_| TlvError::OddLength { len: compact.len() })
}

/// hex 문자열을 고정 폭 줄들로 재배열합니다 (공백 제거 후).
pub fn format_hex_block(hex_str: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    if width == 0 {
        return vec![chars.into_iter().collect()];
    }
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
