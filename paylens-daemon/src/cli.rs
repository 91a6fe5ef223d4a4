//! CLI argument definitions for paylens-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use paylens_core::config::PaylensConfig;

use crate::source::Input;

/// Paylens capture decoder.
///
/// Reads a logcat capture, reassembles payment terminal messages and
/// prints every decoded message as one JSON line on stdout.
#[derive(Parser, Debug)]
#[command(name = "paylens-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to paylens.toml configuration file.
    ///
    /// Without it, built-in defaults and environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture to read, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Capture format.
    #[arg(short, long, value_enum, default_value_t = InputFormat::Text)]
    pub format: InputFormat,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without reading any input.
    #[arg(long)]
    pub validate: bool,
}

/// Capture format accepted on the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Raw logcat text, one line per record.
    Text,
    /// JSON array previously written by the export function.
    Json,
}

impl DaemonCli {
    /// Where to read the capture from.
    pub fn input(&self) -> Input {
        Input::parse(&self.input)
    }

    /// Load the effective configuration.
    ///
    /// Precedence: CLI flags, then environment variables, then the config
    /// file, then defaults. The result is validated once more after the
    /// CLI overrides are applied.
    pub async fn load_config(&self) -> Result<PaylensConfig> {
        let mut config = match &self.config {
            Some(path) => PaylensConfig::load(path)
                .await
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => {
                let mut config = PaylensConfig::default();
                config.apply_env_overrides();
                config
            }
        };

        self.apply_overrides(&mut config);
        config
            .validate()
            .context("configuration is invalid after applying overrides")?;
        Ok(config)
    }

    /// Apply the logging flags on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut PaylensConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
