//! Post-encode size check
//!
//! Compares the finished output against the requested size. Overshooting is
//! possible when the bitrate floor kicks in or the audio budget exceeds the
//! total, and is reported as a warning.

use crate::bitrate::MIN_VIDEO_BITRATE_KBPS;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Result of the size check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeCheck {
    /// Output is at or below the target
    WithinTarget,
    /// Constant-quality encode; no size target applies
    NotApplicable,
    /// Output exceeds the target
    OverTarget {
        target_bytes: u64,
        output_bytes: u64,
        /// `output_bytes / target_bytes`
        ratio: f64,
    },
}

impl SizeCheck {
    /// Human-readable warning for an overshoot
    pub fn warning(&self) -> Option<String> {
        match self {
            SizeCheck::WithinTarget | SizeCheck::NotApplicable => None,
            SizeCheck::OverTarget {
                target_bytes,
                output_bytes,
                ratio,
            } => Some(format!(
                "Output is {:.2} MiB, {:.0}% of the {:.2} MiB target. \
                 The target may be too small for this duration (video bitrate floor is {} kbps).",
                *output_bytes as f64 / BYTES_PER_MIB,
                ratio * 100.0,
                *target_bytes as f64 / BYTES_PER_MIB,
                MIN_VIDEO_BITRATE_KBPS
            )),
        }
    }
}

/// Check an output size against a target in MiB
pub fn check_output_size(target_size_mib: f64, output_bytes: u64) -> SizeCheck {
    let target_bytes = (target_size_mib * BYTES_PER_MIB) as u64;

    if output_bytes <= target_bytes {
        SizeCheck::WithinTarget
    } else {
        let ratio = if target_bytes > 0 {
            output_bytes as f64 / target_bytes as f64
        } else {
            f64::INFINITY
        };
        SizeCheck::OverTarget {
            target_bytes,
            output_bytes,
            ratio,
        }
    }
}
