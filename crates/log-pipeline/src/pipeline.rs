//! 파이프라인 오케스트레이션 -- 큐와 디스패처 워커의 생명주기를 관리합니다.
//!
//! [`DecodePipeline`]은 core의 [`Pipeline`](paylens_core::pipeline::Pipeline) trait을 구현하여
//! `paylens-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! LineSender -> mpsc(unbounded) -> Dispatcher -> Reassembler -> MessageDecoder -> EventBus
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use paylens_core::error::{PaylensError, PipelineError};
use paylens_core::pipeline::{EventBus, HealthStatus, Pipeline};

use crate::bus::InMemoryBus;
use crate::config::PipelineConfig;
use crate::decoder::MessageDecoder;
use crate::dispatcher::{DispatchExit, DispatchStats, Dispatcher, SharedStats, snapshot};
use crate::error::LogPipelineError;
use crate::lookup::LabelLookup;
use crate::parser::LogcatParser;
use crate::queue::{self, LineReceiver, LineSender};
use crate::reassembly::Reassembler;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 디코딩 파이프라인
///
/// 빌더가 돌려준 [`LineSender`]로 라인을 넣고, 버스 구독자로 결과를 받습니다.
/// 워커는 한 번만 시작할 수 있습니다.
///
/// # 사용 예시
/// ```ignore
/// use paylens_log_pipeline::DecodePipelineBuilder;
///
/// let (mut pipeline, sender) = DecodePipelineBuilder::new()
///     .config(config)
///     .bus(bus.clone())
///     .lookup(lookup)
///     .build()?;
///
/// pipeline.start().await?;
/// sender.push_raw(line)?;
/// ```
pub struct DecodePipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 결과 발행 버스
    bus: Arc<dyn EventBus>,
    /// CA 공개키 라벨 테이블
    lookup: Arc<LabelLookup>,
    /// 워커에 넘기기 전까지 보관하는 수신 핸들
    receiver: Option<LineReceiver>,
    /// 워커 취소 토큰
    cancel: CancellationToken,
    /// 워커 태스크 핸들
    worker: Option<JoinHandle<DispatchExit>>,
    /// 워커 통계
    stats: Option<SharedStats>,
}

impl DecodePipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 워커 통계 스냅샷 (시작 전에는 0)
    pub fn stats(&self) -> DispatchStats {
        self.stats.as_ref().map(snapshot).unwrap_or_default()
    }

    /// 결과 발행 버스
    pub fn bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.bus)
    }

    /// 적용 중인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 모든 생산자가 닫힌 뒤 워커가 큐를 비우고 끝날 때까지 기다립니다.
    pub async fn join(&mut self) -> Result<DispatchExit, PaylensError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        let exit = self.await_worker().await?;
        self.state = PipelineState::Stopped;
        Ok(exit)
    }

    async fn await_worker(&mut self) -> Result<DispatchExit, PaylensError> {
        let Some(worker) = self.worker.take() else {
            return Err(PipelineError::NotRunning.into());
        };
        worker
            .await
            .map_err(|e| PipelineError::WorkerFailed(e.to_string()).into())
    }
}

impl Pipeline for DecodePipeline {
    async fn start(&mut self) -> Result<(), PaylensError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let Some(rx) = self.receiver.take() else {
            return Err(PipelineError::InitFailed("pipeline cannot be restarted".to_owned()).into());
        };

        tracing::info!(
            tag_mode = %self.config.tag_mode,
            lookup_entries = self.lookup.len(),
            "starting decode pipeline"
        );

        let decoder = MessageDecoder::new(
            self.config.rules.transaction.sentinels.clone(),
            self.config.tlv_decoder(),
            Arc::clone(&self.lookup),
        )?;
        let dispatcher = Dispatcher::new(
            Reassembler::new(self.config.rules.clone()),
            decoder,
            Arc::clone(&self.bus),
            self.config.poll_interval(),
        );

        self.stats = Some(dispatcher.stats_handle());
        self.worker = Some(tokio::spawn(dispatcher.run(rx, self.cancel.clone())));

        self.state = PipelineState::Running;
        tracing::info!("decode pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PaylensError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping decode pipeline");
        self.cancel.cancel();
        let exit = self.await_worker().await?;

        self.state = PipelineState::Stopped;
        tracing::info!(exit = ?exit, "decode pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => match &self.worker {
                Some(worker) if !worker.is_finished() => HealthStatus::Healthy,
                _ => HealthStatus::Degraded("dispatcher has exited".to_owned()),
            },
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 디코딩 파이프라인 빌더
pub struct DecodePipelineBuilder {
    config: PipelineConfig,
    bus: Option<Arc<dyn EventBus>>,
    lookup: Arc<LabelLookup>,
}

impl DecodePipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            bus: None,
            lookup: Arc::new(LabelLookup::new()),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 결과를 발행할 버스를 지정합니다.
    ///
    /// 지정하지 않으면 새 [`InMemoryBus`]를 만듭니다.
    pub fn bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// CA 공개키 라벨 테이블을 지정합니다.
    pub fn lookup(mut self, lookup: Arc<LabelLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `DecodePipeline`: 파이프라인 인스턴스
    /// - `LineSender`: 라인 생산자 핸들 (모두 drop되면 워커가 큐를 비우고 종료)
    pub fn build(self) -> Result<(DecodePipeline, LineSender), LogPipelineError> {
        self.config.validate()?;

        let classifier = LogcatParser::new().with_max_input_size(self.config.max_line_length);
        let (sender, receiver) = queue::channel(classifier);

        let bus = self
            .bus
            .unwrap_or_else(|| Arc::new(InMemoryBus::new()) as Arc<dyn EventBus>);

        let pipeline = DecodePipeline {
            config: self.config,
            state: PipelineState::Initialized,
            bus,
            lookup: self.lookup,
            receiver: Some(receiver),
            cancel: CancellationToken::new(),
            worker: None,
            stats: None,
        };

        Ok((pipeline, sender))
    }
}

impl Default for DecodePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
