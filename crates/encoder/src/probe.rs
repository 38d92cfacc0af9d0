//! Media probing through ffprobe
//!
//! Runs `ffprobe -print_format json -show_format -show_streams` and extracts
//! the duration, the first video stream and every audio stream.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Error type for probing
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The prober binary could not be started
    #[error("could not run {program}: {source}")]
    Unavailable {
        program: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The prober exited with a non-zero status
    #[error("ffprobe exited with {} for {}: {stderr}", describe_status(.code), .path.display())]
    Failed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The prober output could not be understood
    #[error("malformed ffprobe output for {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    /// The file has no video stream
    #[error("no video stream found in {}", .0.display())]
    NoVideoStream(PathBuf),
}

fn describe_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl ProbeError {
    /// Input file the error refers to
    pub fn path(&self) -> &Path {
        match self {
            ProbeError::Unavailable { path, .. }
            | ProbeError::Failed { path, .. }
            | ProbeError::Malformed { path, .. } => path,
            ProbeError::NoVideoStream(path) => path,
        }
    }
}

/// Audio stream descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub index: u32,
    pub codec_name: Option<String>,
    pub channels: Option<u32>,
}

/// Snapshot of the source file at probe time
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u64,
    pub height: u64,
    /// Frames per second; 0.0 when the stream reports a zero denominator
    pub frame_rate: f64,
    pub audio_streams: Vec<AudioStream>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        !self.audio_streams.is_empty()
    }

    /// True when the video is taller than it is wide
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Structured-metadata query interface
pub trait MediaProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

/// [`MediaProber`] backed by the ffprobe binary
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: String,
}

impl FfprobeProber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        debug!("Probing {} with {}", path.display(), self.program);

        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|source| ProbeError::Unavailable {
                program: self.program.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                path: path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Deserialize, Debug)]
struct FfprobeJsonOutput {
    format: Option<FfprobeJsonFormat>,
    #[serde(default)]
    streams: Vec<FfprobeJsonStream>,
}

#[derive(Deserialize, Debug)]
struct FfprobeJsonFormat {
    duration: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FfprobeJsonStream {
    index: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u64>,
    height: Option<u64>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
}

/// Build a [`MediaInfo`] from ffprobe's JSON output
pub fn parse_probe_output(path: &Path, json: &str) -> Result<MediaInfo, ProbeError> {
    let malformed = |reason: String| ProbeError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let parsed: FfprobeJsonOutput =
        serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

    let duration_str = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| malformed("format.duration is missing".to_string()))?;
    let duration_secs = duration_str
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed(format!("format.duration '{}' is not a number", duration_str)))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(malformed("video stream has no width/height".to_string())),
    };

    let frame_rate = parse_frame_rate(video.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| {
            malformed(format!(
                "unexpected r_frame_rate '{}'",
                video.r_frame_rate.as_deref().unwrap_or_default()
            ))
        })?;

    let audio_streams = parsed
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .enumerate()
        .map(|(i, s)| AudioStream {
            index: s.index.unwrap_or(i as u32),
            codec_name: s.codec_name.clone(),
            channels: s.channels,
        })
        .collect();

    Ok(MediaInfo {
        duration_secs,
        width,
        height,
        frame_rate,
        audio_streams,
    })
}

/// Parse a rational `num/den` frame rate
///
/// A zero denominator yields `Some(0.0)`; anything that is not two integers
/// separated by `/` yields `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.trim().split_once('/')?;
    let num = num.trim().parse::<i64>().ok()?;
    let den = den.trim().parse::<i64>().ok()?;
    if den == 0 {
        Some(0.0)
    } else {
        Some(num as f64 / den as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "channels": 2, "r_frame_rate": "0/0"},
            {"index": 2, "codec_name": "subrip", "codec_type": "subtitle"},
            {"index": 3, "codec_name": "opus", "codec_type": "audio", "channels": 6}
        ],
        "format": {"filename": "in.mkv", "duration": "125.480000"}
    }"#;

    fn path() -> PathBuf {
        PathBuf::from("in.mkv")
    }

    #[test]
    fn test_parse_probe_output_extracts_video_and_audio() {
        let info = parse_probe_output(&path(), SAMPLE).unwrap();

        assert_eq!(info.duration_secs, 125.48);
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
        assert_eq!(info.audio_streams.len(), 2);
        assert_eq!(info.audio_streams[0].index, 1);
        assert_eq!(info.audio_streams[1].codec_name.as_deref(), Some("opus"));
        assert_eq!(info.audio_streams[1].channels, Some(6));
        assert!(info.has_audio());
        assert!(!info.is_portrait());
    }

    #[test]
    fn test_parse_probe_output_without_audio() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 720, "height": 1280, "r_frame_rate": "25/1"}],
                       "format": {"duration": "10"}}"#;
        let info = parse_probe_output(&path(), json).unwrap();
        assert!(!info.has_audio());
        assert!(info.is_portrait());
        assert_eq!(info.frame_rate, 25.0);
    }

    #[test]
    fn test_no_video_stream_fails() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "10"}}"#;
        assert!(matches!(
            parse_probe_output(&path(), json),
            Err(ProbeError::NoVideoStream(_))
        ));
    }

    #[test]
    fn test_missing_duration_is_malformed() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1, "height": 1}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(&path(), json),
            Err(ProbeError::Malformed { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_probe_output(&path(), "not json").unwrap_err();
        assert!(matches!(err, ProbeError::Malformed { .. }));
        assert_eq!(err.path(), Path::new("in.mkv"));
    }

    #[test]
    fn test_missing_frame_rate_defaults_to_zero() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 480}], "format": {"duration": "1.5"}}"#;
        let info = parse_probe_output(&path(), json).unwrap();
        assert_eq!(info.frame_rate, 0.0);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("60/1"), Some(60.0));
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.001);
        assert_eq!(parse_frame_rate("0/0"), Some(0.0));
        assert_eq!(parse_frame_rate("30/0"), Some(0.0));
        assert_eq!(parse_frame_rate("thirty"), None);
        assert_eq!(parse_frame_rate("30"), None);
    }

    #[test]
    fn test_missing_prober_is_unavailable() {
        let prober = FfprobeProber::new("mbify-test-no-such-ffprobe");
        let err = prober.probe(Path::new("in.mkv")).unwrap_err();
        assert!(matches!(err, ProbeError::Unavailable { .. }));
    }
}
