//! Error kinds for an encoding request
//!
//! Every fatal condition is one variant of [`EncodeError`]. Pass-log removal
//! failures are not errors; they are reported as [`CleanupWarning`] values.

use std::path::PathBuf;
use thiserror::Error;

use crate::bitrate::PlanError;
use crate::encode::EncodePass;
use crate::probe::ProbeError;

/// Fatal error for a single encoding request
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder or prober could not be found or started
    #[error("Required command '{0}' not found. Please install it.")]
    MissingDependency(String),

    /// The input could not be probed or has no usable video stream
    #[error("Could not read video information from {}: {reason}", .path.display())]
    ProbeFailure { path: PathBuf, reason: String },

    /// Non-positive effective duration after trim and speed adjustment
    #[error("Effective duration is zero or negative: {0}")]
    InvalidDuration(String),

    /// The request itself is unusable (bad speed, same input and output, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A trim point could not be parsed
    #[error("Invalid time '{0}': expected seconds or [HH:]MM:SS[.mmm]")]
    InvalidTime(String),

    /// The encoder exited with a non-zero status
    #[error("FFmpeg {pass} failed with {}{}", describe_code(.code), describe_output(.output))]
    EncoderFailure {
        pass: EncodePass,
        code: Option<i32>,
        output: String,
    },

    /// The run was interrupted and the encoder was stopped
    #[error("Encoding cancelled by interrupt")]
    Cancelled,

    /// The scene list could not be read
    #[error("Scene list error: {0}")]
    SceneList(String),

    /// IO error while preparing or finalizing the output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

fn describe_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", output.trim_end())
    }
}

impl From<PlanError> for EncodeError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::InvalidDuration(secs) => EncodeError::InvalidDuration(format!(
                "{:.3}s. Check --start, --end and --speed.",
                secs
            )),
        }
    }
}

impl From<ProbeError> for EncodeError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Unavailable { program, .. } => EncodeError::MissingDependency(program),
            other => EncodeError::ProbeFailure {
                path: other.path().to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

impl EncodeError {
    /// Whether a batch run should stop instead of moving on to the next item
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            EncodeError::MissingDependency(_) | EncodeError::Cancelled
        )
    }
}

/// Non-fatal failure to delete a pass-log file
#[derive(Debug)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub error: std::io::Error,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to remove temporary log file {}: {}",
            self.path.display(),
            self.error
        )
    }
}
