//! 메시지 종류별 디코더
//!
//! - [`iso8583`]: 거래 메시지 필드 디코더
//! - [`tlv`]: 필드 55 ICC 데이터 TLV 디코더
//! - [`host_record`]: 설정 레코드 트리 디코더
//! - [`receipt`]: 영수증 덤프 디코더
//!
//! [`MessageDecoder`]는 재조립된 메시지를 종류에 따라 알맞은 디코더로 보냅니다.

pub mod host_record;
pub mod iso8583;
pub mod receipt;
pub mod tlv;

use std::sync::Arc;

use paylens_core::event::DecodedPayload;
use paylens_core::types::MessageKind;

pub use host_record::HostRecordDecoder;
pub use iso8583::TransactionDecoder;
pub use receipt::ReceiptDecoder;
pub use tlv::{TagMode, TlvDecoder, TlvError};

use crate::error::LogPipelineError;
use crate::lookup::LabelLookup;
use crate::reassembly::CompletedMessage;

/// 종류별 디코더 묶음
///
/// 영수증 중복 상태를 가지므로 워커 하나가 소유합니다.
pub struct MessageDecoder {
    transaction: TransactionDecoder,
    host_record: HostRecordDecoder,
    receipt: ReceiptDecoder,
}

impl MessageDecoder {
    /// 새 디코더 묶음을 생성합니다.
    pub fn new(
        transaction_sentinels: Vec<String>,
        tlv: TlvDecoder,
        lookup: Arc<LabelLookup>,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            transaction: TransactionDecoder::new(transaction_sentinels, tlv),
            host_record: HostRecordDecoder::new(lookup),
            receipt: ReceiptDecoder::new()?,
        })
    }

    /// 완료된 메시지를 디코딩합니다.
    pub fn decode(
        &mut self,
        message: &CompletedMessage,
    ) -> Result<DecodedPayload, LogPipelineError> {
        match message.kind {
            MessageKind::Transaction => self
                .transaction
                .decode(&message.lines)
                .map(DecodedPayload::Transaction),
            MessageKind::HostRecord => self
                .host_record
                .decode(&message.lines)
                .map(DecodedPayload::HostRecord),
            MessageKind::Receipt => self
                .receipt
                .decode(&message.lines)
                .map(DecodedPayload::Receipt),
        }
    }

    /// 설정 레코드 디코더 (필터 재적용에 사용)
    pub fn host_record(&self) -> &HostRecordDecoder {
        &self.host_record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> MessageDecoder {
        MessageDecoder::new(
            vec!["packRequest".to_owned()],
            TlvDecoder::default(),
            Arc::new(LabelLookup::new()),
        )
        .unwrap()
    }

    fn message(kind: MessageKind, lines: &[&str]) -> CompletedMessage {
        CompletedMessage {
            kind,
            lines: lines.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn dispatches_by_kind() {
        let mut d = decoder();

        let tx = d
            .decode(&message(MessageKind::Transaction, &["packRequest|0200|", "|BITMAP|"]))
            .unwrap();
        assert_eq!(tx.kind(), MessageKind::Transaction);

        let host = d
            .decode(&message(MessageKind::HostRecord, &[r#"HostRecord = {"K_RECORD": {}}"#]))
            .unwrap();
        assert_eq!(host.kind(), MessageKind::HostRecord);

        let receipt = d
            .decode(&message(
                MessageKind::Receipt,
                &["LinePrinterReceipt(sections=[LinePrinterBlankSection(count=1)])"],
            ))
            .unwrap();
        assert_eq!(receipt.kind(), MessageKind::Receipt);
    }

    #[test]
    fn structural_faults_surface_as_decode_errors() {
        let mut d = decoder();
        let err = d
            .decode(&message(MessageKind::Transaction, &["003|000000|"]))
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::Decode { .. }));
    }
}
