//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 디스패처는 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! exporter는 설치하지 않으며, recorder가 없으면 호출은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `paylens_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(paylens_core::metrics::LINES_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 메시지 종류 레이블 키 (transaction, host_record, receipt)
pub const LABEL_KIND: &str = "kind";

// ─── 라인 처리 메트릭 ──────────────────────────────────────────────

/// 큐에서 꺼낸 전체 라인 수 (counter)
pub const LINES_RECEIVED_TOTAL: &str = "paylens_lines_received_total";

/// 어떤 메시지에도 속하지 않아 버려진 라인 수 (counter)
pub const LINES_IGNORED_TOTAL: &str = "paylens_lines_ignored_total";

/// 분류에 실패한 원시 라인 수 (counter)
pub const LINES_UNCLASSIFIED_TOTAL: &str = "paylens_lines_unclassified_total";

// ─── 메시지 메트릭 ─────────────────────────────────────────────────

/// 재조립이 완료된 메시지 수 (counter, label: kind)
pub const MESSAGES_ASSEMBLED_TOTAL: &str = "paylens_messages_assembled_total";

/// 디코딩 후 발행된 메시지 수 (counter, label: kind)
pub const MESSAGES_DECODED_TOTAL: &str = "paylens_messages_decoded_total";

/// 디코딩 결과가 없어 버려진 메시지 수 (counter, label: kind)
pub const MESSAGES_DROPPED_TOTAL: &str = "paylens_messages_dropped_total";

/// 필드 55 TLV 디코딩 실패 수 (counter)
pub const ICC_FAULTS_TOTAL: &str = "paylens_icc_faults_total";

/// 현재 재조립 중인지 여부 (gauge, 0/1)
pub const REASSEMBLY_ACTIVE: &str = "paylens_reassembly_active";

/// 모든 메트릭 이름 목록
pub const ALL_METRIC_NAMES: &[&str] = &[
    LINES_RECEIVED_TOTAL,
    LINES_IGNORED_TOTAL,
    LINES_UNCLASSIFIED_TOTAL,
    MESSAGES_ASSEMBLED_TOTAL,
    MESSAGES_DECODED_TOTAL,
    MESSAGES_DROPPED_TOTAL,
    ICC_FAULTS_TOTAL,
    REASSEMBLY_ACTIVE,
];

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 이후에 호출해야 설명이 노출됩니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        LINES_RECEIVED_TOTAL,
        "Total number of log lines taken from the line queue"
    );
    describe_counter!(
        LINES_IGNORED_TOTAL,
        "Lines discarded because no message was being captured"
    );
    describe_counter!(
        LINES_UNCLASSIFIED_TOTAL,
        "Raw lines that did not match the logcat layout"
    );
    describe_counter!(
        MESSAGES_ASSEMBLED_TOTAL,
        "Messages reassembled from consecutive log lines"
    );
    describe_counter!(
        MESSAGES_DECODED_TOTAL,
        "Messages decoded and published to the event bus"
    );
    describe_counter!(
        MESSAGES_DROPPED_TOTAL,
        "Reassembled messages that produced no decoded result"
    );
    describe_counter!(ICC_FAULTS_TOTAL, "Field 55 TLV decode failures");
    describe_gauge!(
        REASSEMBLY_ACTIVE,
        "Whether a message is currently being captured (0 or 1)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_start_with_paylens_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("paylens_"),
                "Metric '{}' does not start with 'paylens_' prefix",
                name
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }
}
