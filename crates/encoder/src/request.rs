//! Encoding request
//!
//! Everything one invocation needs to know about what to produce. A request
//! is built once per invocation (or once per scene in batch mode) and never
//! mutated while the passes run.

use std::path::{Path, PathBuf};

use crate::error::EncodeError;

/// Default target output size in MiB
pub const DEFAULT_TARGET_SIZE_MIB: f64 = 100.0;

/// Default audio bitrate in kbps
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 96;

/// Scheduling priority for the encoder process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuPriority {
    Low,
    High,
}

impl CpuPriority {
    /// Niceness passed to `nice -n`
    pub fn niceness(self) -> i32 {
        match self {
            CpuPriority::Low => 19,
            CpuPriority::High => -20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CpuPriority::Low => "low",
            CpuPriority::High => "high",
        }
    }
}

/// One encoding request
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub input: PathBuf,
    /// Explicit output path; `None` derives one from the input name
    pub output: Option<PathBuf>,
    pub target_size_mib: f64,
    pub audio_bitrate_kbps: u32,
    pub mute: bool,
    pub speed: f64,
    /// Trim start in seconds
    pub start: Option<f64>,
    /// Trim end in seconds (source time)
    pub end: Option<f64>,
    pub fps: Option<u32>,
    /// Target size of the smaller video dimension
    pub scale: Option<u32>,
    /// Rotation in degrees, positive is clockwise
    pub rotate: Option<f64>,
    pub prepend_filters: Option<String>,
    pub append_filters: Option<String>,
    pub keep_metadata: bool,
    pub cpu_priority: Option<CpuPriority>,
    pub hardsub: bool,
    pub web_compat: bool,
    pub proto: bool,
}

impl EncodeRequest {
    /// Request with every option at its default
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            target_size_mib: DEFAULT_TARGET_SIZE_MIB,
            audio_bitrate_kbps: DEFAULT_AUDIO_BITRATE_KBPS,
            mute: false,
            speed: 1.0,
            start: None,
            end: None,
            fps: None,
            scale: None,
            rotate: None,
            prepend_filters: None,
            append_filters: None,
            keep_metadata: false,
            cpu_priority: None,
            hardsub: false,
            web_compat: false,
            proto: false,
        }
    }

    /// Same request restricted to a trim window and written to `output`
    pub fn for_segment(&self, start: f64, end: f64, output: PathBuf) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            output: Some(output),
            ..self.clone()
        }
    }

    pub fn is_trimmed(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Final output path for a container extension
    pub fn output_path(&self, container: &str) -> PathBuf {
        resolve_output_path(&self.input, self.output.as_deref(), container)
    }

    /// Reject requests that cannot produce a sensible encode
    pub fn validate(&self, container: &str) -> Result<(), EncodeError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(EncodeError::InvalidRequest(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }

        if !(self.target_size_mib.is_finite() && self.target_size_mib > 0.0) {
            return Err(EncodeError::InvalidRequest(format!(
                "target size must be positive, got {} MiB",
                self.target_size_mib
            )));
        }

        if same_path(&self.input, &self.output_path(container)) {
            return Err(EncodeError::InvalidRequest(
                "Input and output file paths are identical. This would overwrite the input file."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Explicit output wins; otherwise `<input stem>.<container>` in the working directory
pub fn resolve_output_path(input: &Path, output: Option<&Path>, container: &str) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => {
            let stem = input.file_stem().unwrap_or(input.as_os_str());
            PathBuf::from(stem).with_extension(container)
        }
    }
}

// Path equality compares components, so interior `.` segments drop out after the join
fn same_path(a: &Path, b: &Path) -> bool {
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(a) == cwd.join(b),
        Err(_) => a == b,
    }
}
