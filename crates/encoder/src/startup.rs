//! Tool availability checks
//!
//! Verifies that the prober and encoder binaries can be started before any
//! work begins, so a missing tool is reported once instead of per pass.

use std::process::Command;

use mbify_config::Config;
use tracing::debug;

use crate::error::EncodeError;

/// Check that `program` runs by invoking `<program> -version`
///
/// Returns the version banner on success.
pub fn check_tool_available(program: &str) -> Result<String, EncodeError> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| {
            debug!("Failed to run {} -version: {}", program, e);
            EncodeError::MissingDependency(program.to_string())
        })?;

    if !output.status.success() {
        debug!("{} -version exited with {}", program, output.status);
        return Err(EncodeError::MissingDependency(program.to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract the major version from `ffmpeg -version` or `ffprobe -version` output
///
/// Handles plain releases (`ffmpeg version 7.1.2`) and `n`-prefixed git
/// builds (`ffmpeg version n6.1-12-gdeadbee`). Snapshot builds such as
/// `N-113456-g...` carry no release number and yield `None`.
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let token = version_output.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        let tool = words.next()?;
        if !tool.starts_with("ff") || words.next()? != "version" {
            return None;
        }
        words.next()
    })?;

    token
        .strip_prefix('n')
        .unwrap_or(token)
        .split(|c| c == '.' || c == '-')
        .next()?
        .parse()
        .ok()
}

/// Major versions found by [`run_startup_checks`]; `None` for snapshot builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolVersions {
    pub ffprobe: Option<u32>,
    pub ffmpeg: Option<u32>,
}

/// Check the prober and the encoder configured in `cfg`
pub fn run_startup_checks(cfg: &Config) -> Result<ToolVersions, EncodeError> {
    let ffprobe = detect_version(&cfg.tools.ffprobe)?;
    let ffmpeg = detect_version(&cfg.tools.ffmpeg)?;
    Ok(ToolVersions { ffprobe, ffmpeg })
}

fn detect_version(program: &str) -> Result<Option<u32>, EncodeError> {
    let banner = check_tool_available(program)?;
    let major = parse_ffmpeg_version(&banner);
    match major {
        Some(major) => debug!("{} major version {}", program, major),
        None => debug!("{} version could not be determined", program),
    }
    Ok(major)
}
