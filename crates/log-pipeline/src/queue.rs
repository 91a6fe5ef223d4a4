//! 수집 큐
//!
//! 생산자 쪽 핸들 [`LineSender`]와 워커 쪽 [`LineReceiver`]로 이루어진
//! 무제한 mpsc 큐입니다. 원시 라인은 생산자 쪽에서 분류한 뒤 넣습니다.
//! 넣기는 동기 호출이며 어느 스레드에서나 부를 수 있습니다.

use std::sync::Arc;

use tokio::sync::mpsc;

use paylens_core::metrics as m;
use paylens_core::types::LogLine;

use crate::error::LogPipelineError;
use crate::parser::LogcatParser;

/// 워커 쪽 수신 핸들
pub type LineReceiver = mpsc::UnboundedReceiver<LogLine>;

/// 새 큐를 생성합니다.
pub fn channel(classifier: LogcatParser) -> (LineSender, LineReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = LineSender {
        tx,
        classifier: Arc::new(classifier),
    };
    (sender, rx)
}

/// 생산자 핸들
///
/// 복제해서 여러 생산자가 함께 쓸 수 있습니다. 모든 복제본이 drop되면
/// 워커는 남은 라인을 모두 처리한 뒤 종료합니다.
#[derive(Debug, Clone)]
pub struct LineSender {
    tx: mpsc::UnboundedSender<LogLine>,
    classifier: Arc<LogcatParser>,
}

impl LineSender {
    /// 원시 라인을 분류해서 넣습니다.
    ///
    /// 분류에 실패하면 `Ok(false)`를 반환하고 아무것도 넣지 않습니다.
    pub fn push_raw(&self, raw: &str) -> Result<bool, LogPipelineError> {
        let Some(line) = self.classifier.classify(raw) else {
            metrics::counter!(m::LINES_UNCLASSIFIED_TOTAL).increment(1);
            return Ok(false);
        };
        self.push(line)?;
        Ok(true)
    }

    /// 분류된 라인을 그대로 넣습니다.
    pub fn push(&self, line: LogLine) -> Result<(), LogPipelineError> {
        self.tx
            .send(line)
            .map_err(|_| LogPipelineError::Channel("line queue closed".to_owned()))
    }

    /// 워커가 수신을 멈췄는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
