//! Filter graph construction
//!
//! The video chain is assembled in a fixed order: prepended filters,
//! subtitle burn-in, rotation, speed, scaling, frame rate, appended filters.

use std::path::Path;

use crate::probe::MediaInfo;
use crate::request::EncodeRequest;
use crate::timecode::format_seconds;

/// Smallest and largest factor a single `atempo` instance accepts
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Build the ordered list of video filters for a request
///
/// Burned-in subtitles are matched against the source timeline: the frames
/// are shifted forward by the trim start before the subtitles filter and
/// shifted back afterwards, so a trimmed clip shows the right lines.
pub fn build_video_filters(request: &EncodeRequest, media: &MediaInfo) -> Vec<String> {
    let mut filters = Vec::new();

    if let Some(prepend) = non_empty(request.prepend_filters.as_deref()) {
        filters.push(prepend.to_string());
    }

    if request.hardsub {
        let offset = request.start.unwrap_or(0.0);
        filters.push(format!("setpts=PTS+{}/TB", format_seconds(offset)));
        filters.push(format!("subtitles={}", escape_filter_path(&request.input)));
        filters.push("setpts=PTS-STARTPTS".to_string());
    }

    if let Some(degrees) = request.rotate.filter(|d| *d != 0.0) {
        filters.push(format!("rotate={}", degrees.to_radians()));
    }

    if request.speed != 1.0 {
        filters.push(format!("setpts={}*PTS", 1.0 / request.speed));
    }

    if let Some(size) = request.scale {
        if media.is_portrait() {
            filters.push(format!("scale={}:-2", size));
        } else {
            filters.push(format!("scale=-2:{}", size));
        }
    }

    if let Some(fps) = request.fps {
        filters.push(format!("fps={}", fps));
    }

    if let Some(append) = non_empty(request.append_filters.as_deref()) {
        filters.push(append.to_string());
    }

    filters
}

/// Split a speed factor into `atempo` stages that each stay within [0.5, 2.0]
///
/// The product of the stages equals `speed`.
pub fn build_tempo_chain(speed: f64) -> Vec<String> {
    let mut chain = Vec::new();
    let mut remaining = speed;

    while remaining > ATEMPO_MAX {
        chain.push(format!("atempo={}", ATEMPO_MAX));
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        chain.push(format!("atempo={}", ATEMPO_MIN));
        remaining /= ATEMPO_MIN;
    }
    chain.push(format!("atempo={}", remaining));

    chain
}

/// Escape a path for use as a filter option value inside a filter graph
///
/// Two levels apply: the option value level (`\ ' :`) and the graph level
/// (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let value = escape_chars(&raw, &['\\', '\'', ':']);
    escape_chars(&value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(s: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
