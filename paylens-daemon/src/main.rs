use anyhow::Result;
use clap::Parser;

use paylens_daemon::cli::DaemonCli;
use paylens_daemon::logging::init_tracing;
use paylens_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.load_config().await?;

    init_tracing(&config.general)?;

    if cli.validate {
        tracing::info!(
            config = ?cli.config.as_ref().map(|p| p.display().to_string()),
            "configuration is valid"
        );
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "paylens-daemon starting");

    let orchestrator = Orchestrator::build_from_config(&config).await?;
    let summary = orchestrator.run(cli.input(), cli.format).await?;

    if let Some(report) = summary.pump
        && report.lines_rejected > 0
    {
        tracing::warn!(
            rejected = report.lines_rejected,
            read = report.lines_read,
            "some input lines were not logcat lines"
        );
    }

    tracing::info!("paylens-daemon shut down");
    Ok(())
}
