//! FFmpeg command construction
//!
//! Builds the argument vector for each pass of an [`EncodePlan`] and renders
//! commands as copy-pasteable shell lines.

use std::ffi::OsStr;
use std::process::Command;

use mbify_config::Config;
use tracing::warn;

use crate::bitrate::encoder_bitrate_arg;
use crate::encode::filters::build_tempo_chain;
use crate::encode::EncodePass;
use crate::orchestrator::EncodePlan;
use crate::timecode::format_seconds;

/// Output sink for the analysis pass
pub fn null_device() -> &'static str {
    if cfg!(windows) {
        "NUL"
    } else {
        "/dev/null"
    }
}

/// Build the encoder command for one pass of a plan
///
/// Layout: optional `nice` prefix, global flags, seek and input, trim
/// length, video filters and codec, pass-specific rate control, pixel
/// format, then metadata and audio for passes that write output, thread
/// count and output.
pub fn build_encoder_command(plan: &EncodePlan, config: &Config, pass: EncodePass) -> Command {
    let request = &plan.request;
    let ffmpeg = &config.tools.ffmpeg;

    let mut cmd = match request.cpu_priority {
        Some(priority) if cfg!(unix) => {
            let mut cmd = Command::new("nice");
            cmd.arg("-n").arg(priority.niceness().to_string()).arg(ffmpeg);
            cmd
        }
        Some(priority) => {
            warn!(
                "CPU priority '{}' is only supported on Unix, running at normal priority",
                priority.as_str()
            );
            Command::new(ffmpeg)
        }
        None => Command::new(ffmpeg),
    };

    cmd.args(["-hide_banner", "-nostats", "-loglevel", "warning"]);
    cmd.args(["-progress", "pipe:1", "-y"]);

    if let Some(start) = request.start {
        cmd.arg("-ss").arg(format_seconds(start));
    }
    cmd.arg("-i").arg(&request.input);

    if request.is_trimmed() {
        cmd.arg("-t").arg(format_seconds(plan.clip_duration_secs));
    }

    if !plan.video_filters.is_empty() {
        cmd.arg("-vf").arg(plan.video_filters.join(","));
    }
    cmd.arg("-c:v").arg(&config.encoder.video_codec);

    let video_bitrate = encoder_bitrate_arg(plan.bitrate.video_kbps);
    match pass {
        EncodePass::First => {
            cmd.arg("-b:v").arg(&video_bitrate);
            cmd.args(["-pass", "1", "-passlogfile"]).arg(plan.passlog.base());
            cmd.arg("-an");
        }
        EncodePass::Second => {
            cmd.arg("-b:v").arg(&video_bitrate);
            cmd.args(["-pass", "2", "-passlogfile"]).arg(plan.passlog.base());
            cmd.arg("-deadline").arg(&config.encoder.quality);
        }
        EncodePass::Prototype => {
            cmd.arg("-crf").arg(config.prototype.crf.to_string());
            cmd.args(["-b:v", "0", "-deadline", "realtime", "-cpu-used", "8"]);
        }
    }

    // Both passes must see the same video stream
    if request.web_compat {
        cmd.args(["-pix_fmt", "yuv420p", "-profile:v", "0"]);
    }

    if pass.writes_output() {
        if request.keep_metadata {
            cmd.args(["-map_metadata", "0"]);
        }

        if plan.audio_enabled {
            cmd.arg("-c:a").arg(&config.encoder.audio_codec);
            cmd.arg("-b:a").arg(format!("{}k", request.audio_bitrate_kbps));
            if request.speed != 1.0 {
                cmd.arg("-af").arg(build_tempo_chain(request.speed).join(","));
            }
        } else {
            cmd.arg("-an");
        }
    }

    cmd.arg("-threads").arg(plan.threads.to_string());

    if pass.writes_output() {
        cmd.arg(&plan.output);
    } else {
        cmd.arg("-f").arg(&config.encoder.container).arg(null_device());
    }

    cmd
}

/// Quote one argument for a POSIX shell when it needs it
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+%@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Render a command as a single shell line
pub fn render_command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg: &OsStr| shell_quote(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitrate::BitratePlan;
    use crate::passlog::PassLog;
    use crate::probe::MediaInfo;
    use crate::request::{CpuPriority, EncodeRequest};
    use proptest::prelude::*;
    use std::path::{Path, PathBuf};

    /// Helper to convert Command args to a Vec of strings for easier testing
    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    /// Helper to check if args contain a standalone flag
    fn has_flag(args: &[String], flag: &str) -> bool {
        args.iter().any(|arg| arg == flag)
    }

    fn index_of(args: &[String], flag: &str) -> usize {
        args.iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("{} missing from {:?}", flag, args))
    }

    fn plan_for(request: EncodeRequest) -> EncodePlan {
        let media = MediaInfo {
            duration_secs: 120.0,
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            audio_streams: Vec::new(),
        };
        let audio_enabled = !request.mute;
        EncodePlan {
            output: PathBuf::from("out/clip.webm"),
            passlog: PassLog::for_output(Path::new("out/clip.webm")),
            clip_duration_secs: 30.0,
            effective_duration_secs: 30.0 / request.speed,
            bitrate: BitratePlan {
                total_kbps: 1000.0,
                video_kbps: 904.7,
                floored: false,
            },
            audio_enabled,
            threads: 4,
            video_filters: vec!["scale=-2:720".to_string()],
            media,
            request,
        }
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_]{1,20}(/[a-zA-Z0-9_.]{1,20}){0,3}").unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_two_pass_commands_share_input_side(
            input in path_strategy(),
            start in proptest::option::of(0.0f64..1000.0),
            mute in proptest::bool::ANY,
        ) {
            let mut request = EncodeRequest::new(&input);
            request.start = start;
            request.mute = mute;
            let plan = plan_for(request);
            let config = Config::default();

            let first = get_command_args(&build_encoder_command(&plan, &config, EncodePass::First));
            let second = get_command_args(&build_encoder_command(&plan, &config, EncodePass::Second));

            let vf = index_of(&first, "-c:v");
            prop_assert_eq!(&first[..vf], &second[..vf]);
            prop_assert!(has_flag_with_value(&first, "-i", &input));
            prop_assert!(has_flag_with_value(&first, "-b:v", "904k"));
            prop_assert!(has_flag_with_value(&second, "-b:v", "904k"));
            prop_assert!(has_flag_with_value(&first, "-pass", "1"));
            prop_assert!(has_flag_with_value(&second, "-pass", "2"));
            prop_assert!(has_flag(&first, "-an"));
            prop_assert_eq!(has_flag(&second, "-an"), mute);
            prop_assert_eq!(first.last().map(String::as_str), Some(null_device()));
            prop_assert_eq!(second.last().map(String::as_str), Some("out/clip.webm"));
            if start.is_some() {
                prop_assert!(index_of(&first, "-ss") < index_of(&first, "-i"));
                prop_assert!(has_flag(&first, "-t"));
            } else {
                prop_assert!(!has_flag(&first, "-ss"));
            }
        }
    }

    #[test]
    fn test_first_pass_layout() {
        let plan = plan_for(EncodeRequest::new("in.mp4"));
        let config = Config::default();
        let cmd = build_encoder_command(&plan, &config, EncodePass::First);
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("ffmpeg"));
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostats", "-loglevel", "warning", "-progress", "pipe:1", "-y",
                "-i", "in.mp4", "-vf", "scale=-2:720", "-c:v", "libvpx-vp9", "-b:v", "904k",
                "-pass", "1", "-passlogfile", "out/clip_passlog", "-an", "-threads", "4",
                "-f", "webm", null_device(),
            ]
        );
    }

    #[test]
    fn test_second_pass_with_audio_and_speed() {
        let mut request = EncodeRequest::new("in.mp4");
        request.speed = 4.0;
        request.keep_metadata = true;
        request.web_compat = true;
        let plan = plan_for(request);
        let args = get_command_args(&build_encoder_command(&plan, &Config::default(), EncodePass::Second));

        assert!(has_flag_with_value(&args, "-deadline", "best"));
        assert!(has_flag_with_value(&args, "-map_metadata", "0"));
        assert!(has_flag_with_value(&args, "-pix_fmt", "yuv420p"));
        assert!(has_flag_with_value(&args, "-profile:v", "0"));
        assert!(has_flag_with_value(&args, "-c:a", "libopus"));
        assert!(has_flag_with_value(&args, "-b:a", "96k"));
        assert!(has_flag_with_value(&args, "-af", "atempo=2,atempo=2"));
        assert!(!has_flag(&args, "-an"));
        assert!(index_of(&args, "-threads") < args.len() - 2);
    }

    #[test]
    fn test_web_compat_applies_to_both_passes() {
        let mut request = EncodeRequest::new("in.mp4");
        request.web_compat = true;
        request.keep_metadata = true;
        let plan = plan_for(request);
        let config = Config::default();

        let first = get_command_args(&build_encoder_command(&plan, &config, EncodePass::First));
        let second = get_command_args(&build_encoder_command(&plan, &config, EncodePass::Second));

        for args in [&first, &second] {
            assert!(has_flag_with_value(args, "-pix_fmt", "yuv420p"));
            assert!(has_flag_with_value(args, "-profile:v", "0"));
        }
        assert!(!has_flag(&first, "-map_metadata"));
        assert!(!has_flag(&first, "-c:a"));
        assert!(has_flag_with_value(&second, "-map_metadata", "0"));
    }

    #[test]
    fn test_prototype_is_single_constant_quality_pass() {
        let mut config = Config::default();
        config.prototype.crf = 35;
        let mut request = EncodeRequest::new("in.mp4");
        request.proto = true;
        let plan = plan_for(request);
        let args = get_command_args(&build_encoder_command(&plan, &config, EncodePass::Prototype));

        assert!(has_flag_with_value(&args, "-crf", "35"));
        assert!(has_flag_with_value(&args, "-b:v", "0"));
        assert!(has_flag_with_value(&args, "-deadline", "realtime"));
        assert!(has_flag_with_value(&args, "-cpu-used", "8"));
        assert!(!has_flag(&args, "-pass"));
        assert!(!has_flag(&args, "-passlogfile"));
        assert_eq!(args.last().map(String::as_str), Some("out/clip.webm"));
    }

    #[test]
    fn test_trim_window_sets_seek_and_length() {
        let mut request = EncodeRequest::new("in.mp4");
        request.start = Some(10.0);
        request.end = Some(40.0);
        let plan = plan_for(request);
        let args = get_command_args(&build_encoder_command(&plan, &Config::default(), EncodePass::Second));

        assert!(has_flag_with_value(&args, "-ss", "10.000"));
        assert!(has_flag_with_value(&args, "-t", "30.000"));
        assert!(index_of(&args, "-ss") < index_of(&args, "-i"));
        assert!(index_of(&args, "-t") > index_of(&args, "-i"));
    }

    #[test]
    fn test_end_only_trims_without_seek() {
        let mut request = EncodeRequest::new("in.mp4");
        request.end = Some(30.0);
        let plan = plan_for(request);
        let args = get_command_args(&build_encoder_command(&plan, &Config::default(), EncodePass::First));

        assert!(!has_flag(&args, "-ss"));
        assert!(has_flag_with_value(&args, "-t", "30.000"));
    }

    #[cfg(unix)]
    #[test]
    fn test_cpu_priority_wraps_in_nice() {
        let mut request = EncodeRequest::new("in.mp4");
        request.cpu_priority = Some(CpuPriority::Low);
        let plan = plan_for(request);
        let cmd = build_encoder_command(&plan, &Config::default(), EncodePass::First);
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("nice"));
        assert_eq!(&args[..3], &["-n", "19", "ffmpeg"]);
    }

    #[test]
    fn test_configured_tools_and_codecs() {
        let mut config = Config::default();
        config.tools.ffmpeg = "/opt/ffmpeg/bin/ffmpeg".to_string();
        config.encoder.video_codec = "libvpx".to_string();
        let plan = plan_for(EncodeRequest::new("in.mp4"));
        let cmd = build_encoder_command(&plan, &config, EncodePass::Second);

        assert_eq!(cmd.get_program(), OsStr::new("/opt/ffmpeg/bin/ffmpeg"));
        let args = get_command_args(&cmd);
        assert!(has_flag_with_value(&args, "-c:v", "libvpx"));
        assert_eq!(args.last().map(String::as_str), Some("out/clip.webm"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("-c:v"), "-c:v");
        assert_eq!(shell_quote("my clip.mp4"), "'my clip.mp4'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_render_command_line() {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-i", "holiday video.mp4", "-vf", "scale=-2:720"]);
        assert_eq!(
            render_command_line(&cmd),
            "ffmpeg -i 'holiday video.mp4' -vf scale=-2:720"
        );
    }
}
