//! Encoder process runner
//!
//! Spawns one encoder pass, relays its progress and diagnostics while it
//! runs, and stops it on cancellation: `q` on stdin first, a kill once the
//! grace period has passed. The child is spawned with `kill_on_drop`, so it
//! is terminated on every exit path, including a dropped future.

use std::collections::VecDeque;
use std::future::Future;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::encode::cancel::CancelSignal;
use crate::encode::command::render_command_line;
use crate::encode::EncodePass;
use crate::error::EncodeError;

/// Number of trailing diagnostic lines kept for failure reports
const STDERR_TAIL_LINES: usize = 20;

/// One pass ready to run
#[derive(Debug)]
pub struct PassInvocation {
    pub pass: EncodePass,
    pub command: Command,
    /// Duration of the output, used to turn timestamps into a percentage
    pub expected_duration_secs: f64,
}

/// Command execution interface for encoder passes
pub trait EncoderRunner {
    /// Run a pass to completion
    ///
    /// Returns [`EncodeError::EncoderFailure`] on a non-zero exit and
    /// [`EncodeError::Cancelled`] when `cancel` fires first.
    fn run(
        &self,
        invocation: PassInvocation,
        cancel: &CancelSignal,
    ) -> impl Future<Output = Result<(), EncodeError>> + Send;
}

/// [`EncoderRunner`] that spawns the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    shutdown_grace: Duration,
    echo_output: bool,
}

impl FfmpegRunner {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            shutdown_grace,
            echo_output: true,
        }
    }

    /// Do not relay progress or diagnostics to the terminal
    pub fn quiet(mut self) -> Self {
        self.echo_output = false;
        self
    }
}

impl EncoderRunner for FfmpegRunner {
    async fn run(&self, invocation: PassInvocation, cancel: &CancelSignal) -> Result<(), EncodeError> {
        let PassInvocation {
            pass,
            command,
            expected_duration_secs,
        } = invocation;

        let program = command.get_program().to_string_lossy().into_owned();
        debug!("Running {}: {}", pass, render_command_line(&command));

        let mut child = tokio::process::Command::from(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EncodeError::MissingDependency(program.clone()),
                _ => EncodeError::Io(e),
            })?;

        let echo = self.echo_output;
        let progress_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(track_progress(stdout, pass, expected_duration_secs, echo)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr, echo)));

        let mut cancel = cancel.clone();
        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let status = match finished {
            Some(status) => status?,
            None => {
                stop_gracefully(&mut child, self.shutdown_grace).await;
                if let Some(task) = progress_task {
                    task.abort();
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Err(EncodeError::Cancelled);
            }
        };

        if let Some(task) = progress_task {
            let _ = task.await;
        }
        let tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            Ok(())
        } else {
            Err(EncodeError::EncoderFailure {
                pass,
                code: status.code(),
                output: tail.join("\n"),
            })
        }
    }
}

async fn stop_gracefully(child: &mut Child, grace: Duration) {
    info!("Interrupt received. Terminating FFmpeg process...");

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(b"q").await;
        let _ = stdin.flush().await;
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => debug!("Encoder stopped after interrupt"),
        Err(_) => {
            warn!("FFmpeg did not terminate in {:?}. Forcing kill...", grace);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill FFmpeg: {}", e);
            }
        }
    }
}

/// A `-progress` report line that matters for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// Output timestamp reached, in seconds
    Position(f64),
    /// The encoder finished writing
    End,
}

/// Parse one `key=value` line of `-progress` output
///
/// `out_time_ms` carries microseconds as well, despite its name.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value
            .parse::<i64>()
            .ok()
            .map(|us| ProgressUpdate::Position(us.max(0) as f64 / 1_000_000.0)),
        "progress" if value == "end" => Some(ProgressUpdate::End),
        _ => None,
    }
}

/// Position as a percentage of the expected duration, clamped to 0..=100
pub fn progress_percent(position_secs: f64, expected_duration_secs: f64) -> f64 {
    if expected_duration_secs <= 0.0 {
        return 0.0;
    }
    (position_secs / expected_duration_secs * 100.0).clamp(0.0, 100.0)
}

async fn track_progress(stdout: impl AsyncRead + Unpin, pass: EncodePass, expected_secs: f64, echo: bool) {
    let mut lines = BufReader::new(stdout).lines();
    let mut last_shown = -1.0;

    while let Ok(Some(line)) = lines.next_line().await {
        let percent = match parse_progress_line(&line) {
            Some(ProgressUpdate::Position(secs)) => progress_percent(secs, expected_secs),
            Some(ProgressUpdate::End) => 100.0,
            None => continue,
        };
        if echo && (percent - last_shown).abs() >= 0.1 {
            eprint!("\r{} progress: {:5.1}%", pass, percent);
            let _ = std::io::stderr().flush();
            last_shown = percent;
        }
    }

    if echo && last_shown >= 0.0 {
        eprintln!();
    }
}

async fn collect_stderr(stderr: impl AsyncRead + Unpin, echo: bool) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        if echo {
            eprintln!("{}", line);
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect()
}
