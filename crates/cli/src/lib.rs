//! Shared plumbing for the `mbify` and `mbify-scenes` binaries

pub mod args;
pub mod report;

use std::path::{Path, PathBuf};
use std::time::Duration;

use mbify::{CancelHandle, Config, EncodeError, FfmpegRunner, FfprobeProber, Orchestrator};
use mbify_config::ConfigError;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Errors surfaced to the user by either binary
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),
}

/// The orchestrator both binaries run with
pub type FfmpegOrchestrator = Orchestrator<FfprobeProber, FfmpegRunner>;

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `verbose` switches from info to debug.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "mbify=debug,mbify_cli=debug"
    } else {
        "mbify=info,mbify_cli=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (tests, repeated calls) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    Ok(Config::load_or_default(path)?)
}

/// Fail early when the input does not exist
pub fn ensure_exists(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::InputNotFound(path.to_path_buf()))
    }
}

/// Build an orchestrator backed by the configured ffprobe and ffmpeg
pub fn build_orchestrator(config: Config) -> FfmpegOrchestrator {
    let prober = FfprobeProber::new(config.tools.ffprobe.clone());
    let runner = FfmpegRunner::new(Duration::from_secs(config.process.shutdown_grace_secs));
    Orchestrator::new(config, prober, runner)
}

/// Cancel the running encode on Ctrl+C
pub fn spawn_interrupt_handler(handle: CancelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping ffmpeg");
                handle.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    })
}
