//! Scene-list batch encoding
//!
//! Reads a scene list exported by PySceneDetect (`--csv`) and encodes each
//! scene as its own target-size clip, or prints the equivalent command lines.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::encode::CancelSignal;
use crate::encode::EncoderRunner;
use crate::error::EncodeError;
use crate::orchestrator::Orchestrator;
use crate::probe::MediaProber;
use crate::request::{EncodeRequest, DEFAULT_AUDIO_BITRATE_KBPS, DEFAULT_TARGET_SIZE_MIB};
use crate::timecode::format_seconds;

const SCENE_NUMBER_COLUMN: &str = "Scene Number";
const START_COLUMN: &str = "Start Time (seconds)";
const END_COLUMN: &str = "End Time (seconds)";

/// One scene to encode
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Scene number, zero-padded to three digits when numeric
    pub label: String,
    pub start_secs: f64,
    /// Start of the following scene, or the scene's own end for the last one
    pub end_secs: f64,
}

impl Scene {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Outcome of one scene in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SceneResult {
    pub label: String,
    pub output: PathBuf,
    pub status: SceneStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneStatus {
    Encoded { size_mib: f64 },
    Failed(String),
}

impl SceneResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SceneStatus::Encoded { .. })
    }
}

/// Read a scene list from a file
pub fn read_scene_csv(path: &Path) -> Result<Vec<Scene>, EncodeError> {
    let file = File::open(path)
        .map_err(|e| EncodeError::SceneList(format!("cannot open {}: {}", path.display(), e)))?;
    parse_scene_csv(BufReader::new(file))
}

/// Parse a scene list
///
/// Lines before the header row (the one containing `Scene Number`) are
/// skipped, which covers the timecode preamble PySceneDetect writes.
pub fn parse_scene_csv(reader: impl BufRead) -> Result<Vec<Scene>, EncodeError> {
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let fields = split_csv_line(&line?);
                if fields.iter().any(|f| f == SCENE_NUMBER_COLUMN) {
                    break fields;
                }
            }
            None => {
                return Err(EncodeError::SceneList(format!(
                    "no header row with a '{}' column",
                    SCENE_NUMBER_COLUMN
                )))
            }
        }
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| EncodeError::SceneList(format!("missing column '{}'", name)))
    };
    let number_col = column(SCENE_NUMBER_COLUMN)?;
    let start_col = column(START_COLUMN)?;
    let end_col = column(END_COLUMN)?;

    let mut rows = Vec::new();
    for (index, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(&line);
        let field = |col: usize, name: &str| {
            fields.get(col).map(String::as_str).ok_or_else(|| {
                EncodeError::SceneList(format!("line {}: missing '{}'", index + 1, name))
            })
        };
        let seconds = |col: usize, name: &str| -> Result<f64, EncodeError> {
            let raw = field(col, name)?;
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    EncodeError::SceneList(format!("line {}: '{}' is not a number of seconds", index + 1, raw))
                })
        };

        rows.push((
            scene_label(field(number_col, SCENE_NUMBER_COLUMN)?),
            seconds(start_col, START_COLUMN)?,
            seconds(end_col, END_COLUMN)?,
        ));
    }

    let starts: Vec<f64> = rows.iter().map(|(_, start, _)| *start).collect();
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (label, start_secs, own_end))| Scene {
            label,
            start_secs,
            end_secs: starts.get(i + 1).copied().unwrap_or(own_end),
        })
        .collect())
}

/// Split one CSV record, honouring double-quoted fields
///
/// Records are read line by line, so a quoted field cannot span a line
/// break. Scene-detection exports never produce one.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(&['\r', '\n'][..]).chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// Zero-pad numeric scene numbers to three digits; keep anything else as is
pub fn scene_label(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<u32>() {
        Ok(n) => format!("{:03}", n),
        Err(_) => raw.to_string(),
    }
}

/// `<dir>/<input stem>-S<label>[-PROTO].<container>`
pub fn scene_output_path(output_dir: &Path, input: &Path, label: &str, proto: bool, container: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = if proto { "-PROTO" } else { "" };
    output_dir.join(format!("{}-S{}{}.{}", stem, label, suffix, container))
}

/// Wrap a value in double quotes for a POSIX shell
pub fn double_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Command-line flags reproducing every non-default setting of a request
///
/// Trim points and paths are per scene and are not included.
pub fn common_encode_args(template: &EncodeRequest) -> Vec<String> {
    let mut args = Vec::new();
    let mut push = |flag: &str, value: Option<String>| {
        args.push(flag.to_string());
        if let Some(value) = value {
            args.push(value);
        }
    };

    if template.target_size_mib != DEFAULT_TARGET_SIZE_MIB {
        push("--size", Some(template.target_size_mib.to_string()));
    }
    if template.audio_bitrate_kbps != DEFAULT_AUDIO_BITRATE_KBPS {
        push("--audio-bitrate", Some(template.audio_bitrate_kbps.to_string()));
    }
    if template.mute {
        push("--mute", None);
    }
    if template.speed != 1.0 {
        push("--speed", Some(template.speed.to_string()));
    }
    if let Some(fps) = template.fps {
        push("--fps", Some(fps.to_string()));
    }
    if let Some(scale) = template.scale {
        push("--scale", Some(scale.to_string()));
    }
    if let Some(rotate) = template.rotate {
        push("--rotate", Some(rotate.to_string()));
    }
    if template.keep_metadata {
        push("--keep-metadata", None);
    }
    if template.hardsub {
        push("--hardsub", None);
    }
    if template.web_compat {
        push("--web-compat", None);
    }
    if let Some(priority) = template.cpu_priority {
        push("--cpu-priority", Some(priority.as_str().to_string()));
    }
    if let Some(filters) = &template.prepend_filters {
        push("--prepend-filters", Some(double_quote(filters)));
    }
    if let Some(filters) = &template.append_filters {
        push("--append-filters", Some(double_quote(filters)));
    }
    if template.proto {
        push("--proto", None);
    }

    args
}

/// Shell line that encodes one scene with the single-file command
pub fn render_scene_command(
    program: &str,
    input: &Path,
    output: &Path,
    scene: &Scene,
    common_args: &[String],
) -> String {
    let mut parts = vec![
        program.to_string(),
        double_quote(&input.to_string_lossy()),
        double_quote(&output.to_string_lossy()),
        "--start".to_string(),
        format_seconds(scene.start_secs),
        "--end".to_string(),
        format_seconds(scene.end_secs),
    ];
    parts.extend(common_args.iter().cloned());
    parts.join(" ")
}

/// Encode every scene in order
///
/// A scene that fails is recorded and the batch moves on. Cancellation and
/// missing tools end the batch with an error.
pub async fn run_scenes<P: MediaProber, R: EncoderRunner>(
    orchestrator: &Orchestrator<P, R>,
    template: &EncodeRequest,
    scenes: &[Scene],
    output_dir: &Path,
    cancel: &CancelSignal,
    mut on_result: impl FnMut(&SceneResult),
) -> Result<Vec<SceneResult>, EncodeError> {
    std::fs::create_dir_all(output_dir)?;
    let container = orchestrator.config().encoder.container.clone();

    let mut results = Vec::with_capacity(scenes.len());
    for scene in scenes {
        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled);
        }

        let output = scene_output_path(output_dir, &template.input, &scene.label, template.proto, &container);
        info!(
            "Processing Scene {} ({}s for {}s) -> {}",
            scene.label,
            format_seconds(scene.start_secs),
            format_seconds(scene.duration_secs()),
            output.display()
        );

        let request = template.for_segment(scene.start_secs, scene.end_secs, output.clone());
        let status = match orchestrator.run(&request, cancel).await {
            Ok(outcome) => SceneStatus::Encoded {
                size_mib: outcome.size_mib(),
            },
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => SceneStatus::Failed(e.to_string()),
        };

        let result = SceneResult {
            label: scene.label.clone(),
            output,
            status,
        };
        on_result(&result);
        results.push(result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{cancel_pair, PassInvocation};
    use crate::probe::{MediaInfo, ProbeError};
    use crate::request::CpuPriority;
    use mbify_config::Config;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SCENEDETECT_CSV: &str = "\
Timecode List:,00:00:05.000,00:00:12.500
Scene Number,Start Frame,Start Timecode,Start Time (seconds),End Frame,End Timecode,End Time (seconds),Length (frames)
1,1,00:00:00.000,0.000,120,00:00:05.000,5.000,120
2,121,00:00:05.000,5.000,300,00:00:12.500,12.500,180
3,301,00:00:12.500,12.500,480,00:00:20.000,20.000,180
";

    #[test]
    fn test_parse_scenedetect_export() {
        let scenes = parse_scene_csv(Cursor::new(SCENEDETECT_CSV)).unwrap();

        assert_eq!(
            scenes,
            vec![
                Scene { label: "001".to_string(), start_secs: 0.0, end_secs: 5.0 },
                Scene { label: "002".to_string(), start_secs: 5.0, end_secs: 12.5 },
                Scene { label: "003".to_string(), start_secs: 12.5, end_secs: 20.0 },
            ]
        );
    }

    #[test]
    fn test_end_is_next_scene_start() {
        let csv = "Scene Number,Start Time (seconds),End Time (seconds)\n\
                   1,0.0,4.0\n\
                   2,4.5,9.0\n";
        let scenes = parse_scene_csv(Cursor::new(csv)).unwrap();
        assert_eq!(scenes[0].end_secs, 4.5);
        assert_eq!(scenes[1].end_secs, 9.0);
        assert_eq!(scenes[0].duration_secs(), 4.5);
    }

    #[test]
    fn test_quoted_fields_and_blank_lines() {
        let csv = "\"Scene Number\",\"Start Time (seconds)\",\"End Time (seconds)\"\r\n\
                   \"intro, part \"\"a\"\"\",\"1.5\",\"3\"\r\n\
                   \r\n";
        let scenes = parse_scene_csv(Cursor::new(csv)).unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].label, "intro, part \"a\"");
        assert_eq!(scenes[0].start_secs, 1.5);
    }

    #[test]
    fn test_split_csv_line_quoting() {
        assert_eq!(
            split_csv_line("1, \"a, \"\"b\"\"\" ,3\r\n"),
            vec!["1", "a, \"b\"", "3"]
        );
        // An open quote runs to the end of the line
        assert_eq!(split_csv_line("1,\"unterminated,2"), vec!["1", "unterminated,2"]);
    }

    #[test]
    fn test_missing_header_is_error() {
        let err = parse_scene_csv(Cursor::new("a,b,c\n1,2,3\n")).unwrap_err();
        assert!(matches!(err, EncodeError::SceneList(_)));
    }

    #[test]
    fn test_missing_column_is_error() {
        let err = parse_scene_csv(Cursor::new("Scene Number,Start Time (seconds)\n1,0\n")).unwrap_err();
        assert!(err.to_string().contains("End Time (seconds)"));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let csv = "Scene Number,Start Time (seconds),End Time (seconds)\n1,soon,3\n";
        let err = parse_scene_csv(Cursor::new(csv)).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_header_only_yields_no_scenes() {
        let csv = "Scene Number,Start Time (seconds),End Time (seconds)\n";
        assert!(parse_scene_csv(Cursor::new(csv)).unwrap().is_empty());
    }

    #[test]
    fn test_scene_label() {
        assert_eq!(scene_label("7"), "007");
        assert_eq!(scene_label("123"), "123");
        assert_eq!(scene_label("1234"), "1234");
        assert_eq!(scene_label("B-roll"), "B-roll");
    }

    #[test]
    fn test_scene_output_path() {
        assert_eq!(
            scene_output_path(Path::new("out_scenes"), Path::new("/v/movie.mkv"), "004", false, "webm"),
            PathBuf::from("out_scenes/movie-S004.webm")
        );
        assert_eq!(
            scene_output_path(Path::new("out_scenes"), Path::new("movie.mkv"), "004", true, "webm"),
            PathBuf::from("out_scenes/movie-S004-PROTO.webm")
        );
    }

    #[test]
    fn test_common_args_only_non_defaults() {
        assert!(common_encode_args(&EncodeRequest::new("in.mp4")).is_empty());

        let mut template = EncodeRequest::new("in.mp4");
        template.target_size_mib = 8.0;
        template.mute = true;
        template.scale = Some(720);
        template.cpu_priority = Some(CpuPriority::Low);
        template.append_filters = Some("eq=gamma=1.2,hflip".to_string());

        assert_eq!(
            common_encode_args(&template),
            vec![
                "--size", "8", "--mute", "--scale", "720", "--cpu-priority", "low",
                "--append-filters", "\"eq=gamma=1.2,hflip\"",
            ]
        );
    }

    #[test]
    fn test_render_scene_command() {
        let scene = Scene {
            label: "002".to_string(),
            start_secs: 5.0,
            end_secs: 12.5,
        };
        let line = render_scene_command(
            "mbify",
            Path::new("my movie.mkv"),
            Path::new("out_scenes/my movie-S002.webm"),
            &scene,
            &["--mute".to_string()],
        );
        assert_eq!(
            line,
            "mbify \"my movie.mkv\" \"out_scenes/my movie-S002.webm\" --start 5.000 --end 12.500 --mute"
        );
    }

    #[test]
    fn test_double_quote_escapes_shell_specials() {
        assert_eq!(double_quote("a \"b\" $c"), "\"a \\\"b\\\" \\$c\"");
    }

    struct FixedProber;

    impl MediaProber for FixedProber {
        fn probe(&self, _path: &Path) -> Result<MediaInfo, ProbeError> {
            Ok(MediaInfo {
                duration_secs: 20.0,
                width: 640,
                height: 360,
                frame_rate: 25.0,
                audio_streams: Vec::new(),
            })
        }
    }

    /// Fails every pass with an argument containing `fail_marker`
    struct SceneRunner {
        fail_marker: &'static str,
        fatal: bool,
    }

    impl EncoderRunner for SceneRunner {
        async fn run(&self, invocation: PassInvocation, _cancel: &CancelSignal) -> Result<(), EncodeError> {
            let args: Vec<String> = invocation
                .command
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();

            if args.iter().any(|a| a.contains(self.fail_marker)) {
                return Err(if self.fatal {
                    EncodeError::MissingDependency("ffmpeg".to_string())
                } else {
                    EncodeError::EncoderFailure {
                        pass: invocation.pass,
                        code: Some(1),
                        output: String::new(),
                    }
                });
            }
            if invocation.pass.writes_output() {
                std::fs::write(args.last().unwrap(), b"webm").unwrap();
            }
            Ok(())
        }
    }

    fn scenes() -> Vec<Scene> {
        parse_scene_csv(Cursor::new(SCENEDETECT_CSV)).unwrap()
    }

    #[tokio::test]
    async fn test_batch_continues_after_scene_failure() {
        let dir = TempDir::new().unwrap();
        let runner = SceneRunner {
            fail_marker: "-S002",
            fatal: false,
        };
        let orchestrator = Orchestrator::new(Config::default(), FixedProber, runner);
        let template = EncodeRequest::new("movie.mkv");
        let mut seen = Vec::new();

        let results = run_scenes(
            &orchestrator,
            &template,
            &scenes(),
            &dir.path().join("scenes"),
            &CancelSignal::never(),
            |r| seen.push(r.label.clone()),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec!["001", "002", "003"]);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
        assert_eq!(results[2].output, dir.path().join("scenes").join("movie-S003.webm"));
        assert!(results[2].output.exists());
    }

    #[tokio::test]
    async fn test_missing_tool_stops_batch() {
        let dir = TempDir::new().unwrap();
        let runner = SceneRunner {
            fail_marker: "-S001",
            fatal: true,
        };
        let orchestrator = Orchestrator::new(Config::default(), FixedProber, runner);

        let err = run_scenes(
            &orchestrator,
            &EncodeRequest::new("movie.mkv"),
            &scenes(),
            dir.path(),
            &CancelSignal::never(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EncodeError::MissingDependency(_)));
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops() {
        let dir = TempDir::new().unwrap();
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let runner = SceneRunner {
            fail_marker: "never-matches",
            fatal: false,
        };
        let orchestrator = Orchestrator::new(Config::default(), FixedProber, runner);

        let err = run_scenes(&orchestrator, &EncodeRequest::new("movie.mkv"), &scenes(), dir.path(), &signal, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::Cancelled));
    }
}
