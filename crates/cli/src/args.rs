//! Encode flags shared by both binaries

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use mbify::{parse_time_strict, CpuPriority, EncodeError, EncodeRequest};

/// Scheduling priority for the encoder process
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CpuPriorityArg {
    Low,
    High,
}

impl From<CpuPriorityArg> for CpuPriority {
    fn from(arg: CpuPriorityArg) -> Self {
        match arg {
            CpuPriorityArg::Low => CpuPriority::Low,
            CpuPriorityArg::High => CpuPriority::High,
        }
    }
}

/// Options that apply to every encode
#[derive(Args, Debug, Clone)]
pub struct EncodeOptions {
    /// Target output size in MiB
    #[arg(long, default_value_t = mbify::DEFAULT_TARGET_SIZE_MIB)]
    pub size: f64,

    /// Audio bitrate in kbps
    #[arg(long, default_value_t = mbify::DEFAULT_AUDIO_BITRATE_KBPS)]
    pub audio_bitrate: u32,

    /// Drop the audio track
    #[arg(long)]
    pub mute: bool,

    /// Playback speed multiplier (2.0 plays twice as fast)
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Target size of the smaller video dimension, e.g. 720
    #[arg(long)]
    pub scale: Option<u32>,

    /// Rotate by degrees, positive is clockwise
    #[arg(long, allow_negative_numbers = true)]
    pub rotate: Option<f64>,

    /// Copy metadata from the input
    #[arg(long)]
    pub keep_metadata: bool,

    /// Burn the input's subtitle track into the video
    #[arg(long)]
    pub hardsub: bool,

    /// Force yuv420p and VP9 profile 0 for browser playback
    #[arg(long)]
    pub web_compat: bool,

    /// Run the encoder at low or high CPU priority (Unix only)
    #[arg(long, value_enum)]
    pub cpu_priority: Option<CpuPriorityArg>,

    /// Raw filters inserted at the start of the video filter chain
    #[arg(long, allow_hyphen_values = true)]
    pub prepend_filters: Option<String>,

    /// Raw filters appended to the end of the video filter chain
    #[arg(long, allow_hyphen_values = true)]
    pub append_filters: Option<String>,

    /// Prototype mode: fast single-pass constant-quality encode for checking cuts
    #[arg(long)]
    pub proto: bool,

    /// Path to a TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl EncodeOptions {
    /// Request for `input` carrying these options
    pub fn to_request(&self, input: PathBuf) -> EncodeRequest {
        EncodeRequest {
            target_size_mib: self.size,
            audio_bitrate_kbps: self.audio_bitrate,
            mute: self.mute,
            speed: self.speed,
            fps: self.fps,
            scale: self.scale,
            rotate: self.rotate,
            prepend_filters: self.prepend_filters.clone(),
            append_filters: self.append_filters.clone(),
            keep_metadata: self.keep_metadata,
            cpu_priority: self.cpu_priority.map(CpuPriority::from),
            hardsub: self.hardsub,
            web_compat: self.web_compat,
            proto: self.proto,
            ..EncodeRequest::new(input)
        }
    }
}

/// Parse an optional `--start`/`--end` value, rejecting malformed input
pub fn parse_trim_point(value: Option<&str>) -> Result<Option<f64>, EncodeError> {
    value.map(parse_time_strict).transpose()
}
