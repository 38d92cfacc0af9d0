//! mbify
//!
//! Plans the bitrate that makes a two-pass VP9 encode land on a target file
//! size and drives ffmpeg through the passes.

pub mod bitrate;
pub mod encode;
pub mod error;
pub mod orchestrator;
pub mod passlog;
pub mod probe;
pub mod request;
pub mod scenes;
pub mod size_check;
pub mod startup;
pub mod threads;
pub mod timecode;

pub use mbify_config as config;
pub use mbify_config::Config;

pub use bitrate::{
    clip_duration, effective_duration, encoder_bitrate_arg, plan_bitrate, BitratePlan, PlanError,
    MIN_VIDEO_BITRATE_KBPS, MUX_OVERHEAD_FACTOR,
};
pub use encode::{
    build_encoder_command, build_tempo_chain, build_video_filters, cancel_pair,
    render_command_line, CancelHandle, CancelSignal, EncodePass, EncoderRunner, FfmpegRunner,
    PassInvocation,
};
pub use error::{CleanupWarning, EncodeError};
pub use orchestrator::{
    format_hms, format_minutes_seconds, pass_done_banner, pass_start_banner, pass_title,
    EncodeOutcome, EncodePlan, Orchestrator, PipelineState,
};
pub use passlog::PassLog;
pub use probe::{FfprobeProber, MediaInfo, MediaProber, ProbeError};
pub use request::{CpuPriority, EncodeRequest, DEFAULT_AUDIO_BITRATE_KBPS, DEFAULT_TARGET_SIZE_MIB};
pub use scenes::{
    common_encode_args, read_scene_csv, render_scene_command, run_scenes, scene_output_path, Scene,
    SceneResult, SceneStatus,
};
pub use size_check::{check_output_size, SizeCheck};
pub use startup::{check_tool_available, parse_ffmpeg_version, run_startup_checks, ToolVersions};
pub use threads::resolve_threads;
pub use timecode::{format_seconds, parse_time, parse_time_strict};
