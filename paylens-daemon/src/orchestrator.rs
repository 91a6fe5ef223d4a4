//! Daemon orchestration -- assembly, input pumping, and shutdown.
//!
//! The [`Orchestrator`] wires the decode pipeline to an output printer,
//! feeds the capture into the pipeline queue and decides how the run ends.
//!
//! # Run Order
//!
//! 1. Start the decode pipeline worker
//! 2. Start the event printer
//! 3. Pump the capture on a background thread
//! 4. On end of input: wait for the worker to drain the queue
//!    On a shutdown signal: stop the worker, discarding any open message
//! 5. Stop the printer after it has written every published event

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paylens_core::config::PaylensConfig;
use paylens_core::event::DecodedEvent;
use paylens_core::pipeline::Pipeline;
use paylens_log_pipeline::{
    DecodePipeline, DecodePipelineBuilder, DispatchStats, InMemoryBus, LabelLookup, LineSender,
    PipelineConfig,
};

use crate::cli::InputFormat;
use crate::output;
use crate::source::{Input, PumpReport, Source};

/// Outcome of one daemon run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Input counters. `None` when the run was interrupted before EOF.
    pub pump: Option<PumpReport>,
    /// Events written to the output.
    pub events_written: u64,
    /// Final worker statistics.
    pub stats: DispatchStats,
}

impl RunSummary {
    /// Whether a shutdown signal ended the run.
    pub fn interrupted(&self) -> bool {
        self.pump.is_none()
    }
}

/// The daemon orchestrator.
///
/// Owns the pipeline, the producer handle and the output subscription
/// until [`run`](Self::run) consumes them.
pub struct Orchestrator {
    /// Decode pipeline (not yet started).
    pipeline: DecodePipeline,
    /// Producer handle, moved to the source thread on run.
    sender: LineSender,
    /// Events from every decode topic.
    events: mpsc::UnboundedReceiver<DecodedEvent>,
    /// Upper bound for one logcat line.
    max_line_length: usize,
}

impl Orchestrator {
    /// Build the orchestrator from a validated configuration.
    ///
    /// This performs the following steps:
    /// 1. Register metric descriptions
    /// 2. Load the CA public key label table, if configured
    /// 3. Build the decode pipeline around an in-memory bus
    /// 4. Subscribe the output channel to every decode topic
    ///
    /// # Errors
    ///
    /// Returns an error if the label table cannot be loaded or the
    /// pipeline configuration is invalid.
    pub async fn build_from_config(config: &PaylensConfig) -> Result<Self> {
        paylens_core::metrics::describe_all();

        let lookup = match &config.lookup.capk_labels_path {
            Some(path) => LabelLookup::load(path)
                .await
                .with_context(|| format!("failed to load label lookup from {path}"))?,
            None => LabelLookup::new(),
        };

        let pipeline_config = PipelineConfig::from_core(&config.pipeline);
        let max_line_length = pipeline_config.max_line_length;

        let bus = Arc::new(InMemoryBus::new());
        let events = output::subscribe_all(bus.as_ref());

        let (pipeline, sender) = DecodePipelineBuilder::new()
            .config(pipeline_config)
            .bus(bus)
            .lookup(Arc::new(lookup))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build decode pipeline: {}", e))?;

        tracing::info!(
            tag_mode = %pipeline.config().tag_mode,
            "decode pipeline initialized"
        );

        Ok(Self {
            pipeline,
            sender,
            events,
            max_line_length,
        })
    }

    /// Decode `input` and print events to stdout until EOF or SIGTERM/SIGINT.
    pub async fn run(self, input: Input, format: InputFormat) -> Result<RunSummary> {
        self.run_with(input, format, tokio::io::stdout(), wait_for_shutdown_signal())
            .await
    }

    /// Decode `input` into `writer`, stopping early when `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the signal that ended the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, the pipeline fails or
    /// the output cannot be written.
    pub async fn run_with<W, S>(
        self,
        input: Input,
        format: InputFormat,
        writer: W,
        shutdown: S,
    ) -> Result<RunSummary>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = Result<&'static str>>,
    {
        let Self {
            mut pipeline,
            sender,
            events,
            max_line_length,
        } = self;

        pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start decode pipeline: {}", e))?;

        let cancel = CancellationToken::new();
        let printer = output::spawn_printer(events, writer, cancel.clone());

        let source = Source::new(input, format, max_line_length);
        tracing::info!(input = %source.input(), ?format, "reading capture");

        let pump = source.pump(sender);
        tokio::pin!(pump);
        tokio::pin!(shutdown);

        // a pending signal wins over end of input
        let pumped = tokio::select! {
            biased;
            signal = &mut shutdown => {
                match signal {
                    Ok(name) => tracing::info!(signal = name, "received shutdown signal"),
                    Err(e) => tracing::error!(error = %e, "signal handler failed, shutting down"),
                }
                None
            }
            result = &mut pump => Some(result),
        };

        let pump_report = match pumped {
            Some(Ok(report)) => {
                let exit = pipeline
                    .join()
                    .await
                    .map_err(|e| anyhow::anyhow!("decode pipeline failed: {}", e))?;
                tracing::debug!(exit = ?exit, "queue drained");
                Some(report)
            }
            Some(Err(e)) => {
                stop_pipeline(&mut pipeline).await;
                cancel.cancel();
                if let Ok(Err(print_err)) = printer.await {
                    tracing::warn!(error = %print_err, "event printer failed during shutdown");
                }
                return Err(e);
            }
            None => {
                stop_pipeline(&mut pipeline).await;
                None
            }
        };

        cancel.cancel();
        let events_written = printer.await.context("event printer task failed")??;

        let summary = RunSummary {
            pump: pump_report,
            events_written,
            stats: pipeline.stats(),
        };

        tracing::info!(
            interrupted = summary.interrupted(),
            lines = summary.stats.lines_processed,
            transactions = summary.stats.transactions,
            host_records = summary.stats.host_records,
            receipts = summary.stats.receipts,
            dropped = summary.stats.messages_dropped,
            icc_faults = summary.stats.icc_faults,
            events_written,
            "run complete"
        );

        Ok(summary)
    }
}

async fn stop_pipeline(pipeline: &mut DecodePipeline) {
    if let Err(e) = pipeline.stop().await {
        tracing::error!(error = %e, "failed to stop decode pipeline");
    }
}

/// Wait for SIGTERM or SIGINT.
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {}", e))?;
    Ok("CTRL_C")
}
