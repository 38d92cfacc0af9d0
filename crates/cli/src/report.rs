//! Terminal reports: the conversion summary and the completion message

use chrono::{DateTime, Local};
use mbify::{
    format_hms, format_seconds, Config, EncodeOutcome, EncodePlan, SceneResult, SceneStatus, ToolVersions,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Detected tool versions, printed once the tools are known to run
pub fn tool_version_lines(versions: &ToolVersions) -> Vec<String> {
    let describe = |major: Option<u32>| match major {
        Some(major) => format!("{}.x", major),
        None => "unknown (snapshot build)".to_string(),
    };
    vec![
        format!("FFmpeg version: {}", describe(versions.ffmpeg)),
        format!("FFprobe version: {}", describe(versions.ffprobe)),
    ]
}

/// Summary printed before the first pass
pub fn summary_lines(plan: &EncodePlan, config: &Config, started_at: DateTime<Local>) -> Vec<String> {
    let request = &plan.request;
    let media = &plan.media;
    let mut lines = vec![
        "--- WebM Conversion Summary ---".to_string(),
        format!("Start Time: {}", started_at.format(TIME_FORMAT)),
        format!("Input File: {}", request.input.display()),
        format!("Output File: {}", plan.output.display()),
    ];

    if request.proto {
        lines.push("Mode: Prototype (Fast Clip Check)".to_string());
    } else {
        lines.push("Mode: Target Size (2-Pass VBR)".to_string());
        lines.push(format!("Target Size: {} MiB", request.target_size_mib));
    }

    lines.push("--- Video Information ---".to_string());
    lines.push(format!("Original Resolution: {}x{}", media.width, media.height));
    lines.push(format!("Original FPS: {:.2}", media.frame_rate));
    lines.push(format!("Input Video Duration: {:.2} seconds", media.duration_secs));
    if request.is_trimmed() {
        lines.push(format!(
            "Trimming Start: {} (s)",
            format_seconds(request.start.unwrap_or(0.0))
        ));
        lines.push(format!(
            "Trimming End: {} (s)",
            request.end.map(format_seconds).unwrap_or_else(|| "End".to_string())
        ));
    }
    lines.push(format!(
        "Encoded Clip Duration (Content Length): {:.2} seconds",
        plan.clip_duration_secs
    ));
    if request.speed != 1.0 {
        lines.push(format!("Playback Speed: {}x", request.speed));
    }
    lines.push(format!(
        "Final Output Duration (Time-Scaled): {:.2} seconds",
        plan.effective_duration_secs
    ));
    if let Some(scale) = request.scale {
        lines.push(format!("Target Scale (min dimension): {}p", scale));
    }
    if let Some(fps) = request.fps {
        lines.push(format!("Target FPS: {}", fps));
    }
    if let Some(rotate) = request.rotate {
        lines.push(format!("Rotation: {} degrees", rotate));
    }

    lines.push("--- Audio Information ---".to_string());
    if plan.audio_enabled {
        lines.push(format!("Audio Bitrate: {} kbps (Enabled)", request.audio_bitrate_kbps));
    } else if request.mute {
        lines.push("Audio will be muted.".to_string());
    } else {
        lines.push("Input has no audio; output will be silent.".to_string());
    }

    if !request.proto {
        lines.push("--- Calculated Bitrates ---".to_string());
        lines.push(format!("Target Total Bitrate: {:.2} kbps", plan.bitrate.total_kbps));
        lines.push(format!("Target Video Bitrate: {:.2} kbps", plan.bitrate.video_kbps));
    }

    lines.push("--- Additional Configuration ---".to_string());
    lines.push(format!("FFmpeg Threads: {}", plan.threads));
    if request.proto {
        lines.push(format!("Prototype CRF: {}", config.prototype.crf));
    } else {
        lines.push(format!("VP9 Quality Setting: {}", config.encoder.quality));
    }
    if let Some(priority) = request.cpu_priority {
        lines.push(format!("CPU Priority: {}", priority.as_str()));
    }
    if let Some(filters) = &request.prepend_filters {
        lines.push(format!("Prepending filters: {}", filters));
    }
    if let Some(filters) = &request.append_filters {
        lines.push(format!("Appending filters: {}", filters));
    }
    lines.push("--------------------------------------".to_string());

    lines
}

/// Completion message for a single encode
pub fn completion_lines(outcome: &EncodeOutcome, finished_at: DateTime<Local>) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "Compression completed successfully!".to_string(),
        format!("Output: {}", outcome.output.display()),
        format!("Final Output Size: {:.2} MiB", outcome.size_mib()),
        format!("Total Time Taken: {}", format_hms(outcome.elapsed)),
        format!("End Time: {}", finished_at.format(TIME_FORMAT)),
    ];
    lines.extend(outcome.warnings.iter().map(|w| format!("Warning: {}", w)));
    lines
}

/// One line per finished scene
pub fn scene_result_line(result: &SceneResult) -> String {
    match &result.status {
        SceneStatus::Encoded { size_mib } => {
            format!("Scene {} SUCCESS: {:.2} MiB", result.label, size_mib)
        }
        SceneStatus::Failed(reason) => format!("Scene {} FAILED: {}", result.label, reason),
    }
}
