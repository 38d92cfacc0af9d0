//! Bitrate planning
//!
//! Derives the video bitrate that makes a two-pass encode land on a target
//! file size, given the duration of the output file.

use thiserror::Error;
use tracing::warn;

/// Lowest video bitrate ever handed to the encoder
pub const MIN_VIDEO_BITRATE_KBPS: f64 = 50.0;

/// Share of the size budget available to the streams; the rest is left for container overhead
pub const MUX_OVERHEAD_FACTOR: f64 = 0.95;

const BITS_PER_MIB: f64 = 8.0 * 1024.0 * 1024.0;

/// Error type for bitrate planning
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// Effective duration is zero or negative
    #[error("Effective duration for bitrate calculation is zero or negative ({0}s)")]
    InvalidDuration(f64),
}

/// Bitrate budget for one encode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitratePlan {
    /// Total stream bitrate after the overhead margin (kbps)
    pub total_kbps: f64,
    /// Bitrate for the video stream (kbps), never below [`MIN_VIDEO_BITRATE_KBPS`]
    pub video_kbps: f64,
    /// True when the raw video bitrate was at or below the floor and got clamped
    pub floored: bool,
}

/// Compute the bitrate plan for a target size
///
/// `total = size * 8 * 1024 * 1024 / duration * 0.95 / 1000`; the audio
/// bitrate is subtracted only when audio is encoded. A video bitrate at or
/// below the floor is clamped to the floor and flagged, not rejected.
///
/// # Errors
/// Returns [`PlanError::InvalidDuration`] when `effective_duration_secs <= 0`.
pub fn plan_bitrate(
    target_size_mib: f64,
    effective_duration_secs: f64,
    audio_bitrate_kbps: f64,
    audio_enabled: bool,
) -> Result<BitratePlan, PlanError> {
    if !(effective_duration_secs > 0.0) {
        return Err(PlanError::InvalidDuration(effective_duration_secs));
    }

    let target_bits = target_size_mib * BITS_PER_MIB;
    let total_kbps = (target_bits / effective_duration_secs) * MUX_OVERHEAD_FACTOR / 1000.0;

    let audio_kbps = if audio_enabled { audio_bitrate_kbps } else { 0.0 };
    let raw_video_kbps = total_kbps - audio_kbps;

    if raw_video_kbps <= MIN_VIDEO_BITRATE_KBPS {
        warn!(
            "Calculated video bitrate ({:.2} kbps) is too low. Setting minimum to {} kbps.",
            raw_video_kbps, MIN_VIDEO_BITRATE_KBPS
        );
        return Ok(BitratePlan {
            total_kbps,
            video_kbps: MIN_VIDEO_BITRATE_KBPS,
            floored: true,
        });
    }

    Ok(BitratePlan {
        total_kbps,
        video_kbps: raw_video_kbps,
        floored: false,
    })
}

/// Length of the encoded clip in source time
///
/// With both trim points the clip spans `end - start`; with only an end it
/// spans `end` (the clip starts at zero); with only a start it runs to the end
/// of the source. An end beyond the probed duration is clamped to it.
pub fn clip_duration(probed_duration_secs: f64, start_secs: Option<f64>, end_secs: Option<f64>) -> f64 {
    let end = end_secs.map(|end| {
        if end > probed_duration_secs {
            warn!(
                "End time {:.3}s is past the end of the input ({:.3}s); using the input duration",
                end, probed_duration_secs
            );
            probed_duration_secs
        } else {
            end
        }
    });

    match (start_secs, end) {
        (Some(start), Some(end)) => end - start,
        (None, Some(end)) => end,
        (Some(start), None) => probed_duration_secs - start,
        (None, None) => probed_duration_secs,
    }
}

/// Duration of the output file once the speed multiplier is applied
pub fn effective_duration(clip_duration_secs: f64, speed: f64) -> f64 {
    clip_duration_secs / speed
}

/// Render a video bitrate for `-b:v`, rounded down to whole kbps
pub fn encoder_bitrate_arg(video_kbps: f64) -> String {
    format!("{}k", video_kbps.floor() as u64)
}
