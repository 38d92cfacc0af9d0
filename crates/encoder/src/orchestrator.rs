//! Pass orchestration
//!
//! Drives one request through the pipeline:
//! Probing → Planning → Pass1 → Pass2 (or SinglePass) → Finalizing → Done,
//! with `Failed` reachable from every state. Passes never overlap and a
//! failed pass is never retried.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use mbify_config::Config;
use tracing::{debug, info, warn};

use crate::bitrate::{clip_duration, effective_duration, plan_bitrate, BitratePlan};
use crate::encode::{build_encoder_command, build_video_filters, CancelSignal, EncodePass, EncoderRunner, PassInvocation};
use crate::error::EncodeError;
use crate::passlog::PassLog;
use crate::probe::{MediaInfo, MediaProber};
use crate::request::EncodeRequest;
use crate::size_check::{check_output_size, SizeCheck};
use crate::threads::resolve_threads;

/// Pipeline state, reported to the state observer on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Probing,
    Planning,
    Pass1,
    Pass2,
    SinglePass,
    Finalizing,
    Done,
    /// Terminal failure with the error message
    Failed(String),
}

impl PipelineState {
    pub fn as_str(&self) -> &str {
        match self {
            PipelineState::Probing => "probing",
            PipelineState::Planning => "planning",
            PipelineState::Pass1 => "pass1",
            PipelineState::Pass2 => "pass2",
            PipelineState::SinglePass => "single_pass",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed(_) => "failed",
        }
    }

    fn for_pass(pass: EncodePass) -> Self {
        match pass {
            EncodePass::First => PipelineState::Pass1,
            EncodePass::Second => PipelineState::Pass2,
            EncodePass::Prototype => PipelineState::SinglePass,
        }
    }
}

/// Everything decided before the first encoder invocation
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub request: EncodeRequest,
    pub output: PathBuf,
    pub media: MediaInfo,
    /// Clip length in source time, after trimming
    pub clip_duration_secs: f64,
    /// Output length, after trimming and speed adjustment
    pub effective_duration_secs: f64,
    pub bitrate: BitratePlan,
    /// Audio is encoded only when not muted and the source has audio
    pub audio_enabled: bool,
    pub passlog: PassLog,
    pub threads: u32,
    pub video_filters: Vec<String>,
}

impl EncodePlan {
    /// Passes in execution order
    pub fn passes(&self) -> Vec<EncodePass> {
        if self.request.proto {
            vec![EncodePass::Prototype]
        } else {
            vec![EncodePass::First, EncodePass::Second]
        }
    }

    /// Encoder commands in execution order
    pub fn commands(&self, config: &Config) -> Vec<(EncodePass, Command)> {
        self.passes()
            .into_iter()
            .map(|pass| (pass, build_encoder_command(self, config, pass)))
            .collect()
    }
}

/// Result of a completed request
#[derive(Debug)]
pub struct EncodeOutcome {
    pub output: PathBuf,
    pub size_bytes: u64,
    pub plan: EncodePlan,
    /// Non-fatal problems: cleanup failures and target overshoot
    pub warnings: Vec<String>,
    pub pass_times: Vec<(EncodePass, Duration)>,
    pub elapsed: Duration,
    pub size_check: SizeCheck,
}

impl EncodeOutcome {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Callback invoked on every state transition
pub type StateObserver = Box<dyn Fn(&PipelineState) + Send + Sync>;

/// Sequences probing, planning and the encoder passes for a request
pub struct Orchestrator<P, R> {
    config: Config,
    prober: P,
    runner: R,
    observer: Option<StateObserver>,
}

impl<P: MediaProber, R: EncoderRunner> Orchestrator<P, R> {
    pub fn new(config: Config, prober: P, runner: R) -> Self {
        Self {
            config,
            prober,
            runner,
            observer: None,
        }
    }

    /// Attach a state observer
    pub fn with_observer(mut self, observer: impl Fn(&PipelineState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn transition(&self, state: PipelineState) {
        debug!("Pipeline state: {}", state.as_str());
        if let Some(observer) = &self.observer {
            observer(&state);
        }
    }

    fn fail(&self, err: EncodeError) -> EncodeError {
        self.transition(PipelineState::Failed(err.to_string()));
        err
    }

    /// Probe the input and plan the encode without running any pass
    pub fn prepare(&self, request: &EncodeRequest) -> Result<EncodePlan, EncodeError> {
        self.transition(PipelineState::Probing);
        request
            .validate(&self.config.encoder.container)
            .map_err(|e| self.fail(e))?;
        let media = self
            .prober
            .probe(&request.input)
            .map_err(|e| self.fail(e.into()))?;

        self.transition(PipelineState::Planning);
        let clip_duration_secs = clip_duration(media.duration_secs, request.start, request.end);
        let effective_duration_secs = effective_duration(clip_duration_secs, request.speed);

        if !request.mute && !media.has_audio() {
            info!("Input has no audio stream; encoding without audio");
        }
        let audio_enabled = !request.mute && media.has_audio();

        let bitrate = plan_bitrate(
            request.target_size_mib,
            effective_duration_secs,
            f64::from(request.audio_bitrate_kbps),
            audio_enabled,
        )
        .map_err(|e| self.fail(e.into()))?;

        let output = request.output_path(&self.config.encoder.container);
        let plan = EncodePlan {
            passlog: PassLog::for_output(&output),
            threads: resolve_threads(&self.config),
            video_filters: build_video_filters(request, &media),
            request: request.clone(),
            output,
            media,
            clip_duration_secs,
            effective_duration_secs,
            bitrate,
            audio_enabled,
        };

        debug!(
            "Planned {} at {:.2} kbps video / {:.2} kbps total over {:.3}s",
            plan.output.display(),
            plan.bitrate.video_kbps,
            plan.bitrate.total_kbps,
            plan.effective_duration_secs
        );
        Ok(plan)
    }

    /// Prepare and execute a request
    pub async fn run(&self, request: &EncodeRequest, cancel: &CancelSignal) -> Result<EncodeOutcome, EncodeError> {
        let plan = self.prepare(request)?;
        self.execute(plan, cancel).await
    }

    /// Run the passes of a prepared plan and finalize the output
    ///
    /// Pass-log files are removed whether or not the passes succeed.
    pub async fn execute(&self, plan: EncodePlan, cancel: &CancelSignal) -> Result<EncodeOutcome, EncodeError> {
        let started = Instant::now();

        let passes = self.run_passes(&plan, cancel).await;
        let mut warnings: Vec<String> = if plan.request.proto {
            Vec::new()
        } else {
            plan.passlog.cleanup().iter().map(ToString::to_string).collect()
        };
        let pass_times = passes.map_err(|e| self.fail(e))?;

        self.transition(PipelineState::Finalizing);
        let size_bytes = std::fs::metadata(&plan.output)
            .map_err(|e| self.fail(e.into()))?
            .len();

        let size_check = if plan.request.proto {
            SizeCheck::NotApplicable
        } else {
            check_output_size(plan.request.target_size_mib, size_bytes)
        };
        if let Some(warning) = size_check.warning() {
            warn!("{}", warning);
            warnings.push(warning);
        }

        self.transition(PipelineState::Done);
        Ok(EncodeOutcome {
            output: plan.output.clone(),
            size_bytes,
            plan,
            warnings,
            pass_times,
            elapsed: started.elapsed(),
            size_check,
        })
    }

    async fn run_passes(
        &self,
        plan: &EncodePlan,
        cancel: &CancelSignal,
    ) -> Result<Vec<(EncodePass, Duration)>, EncodeError> {
        if let Some(dir) = plan.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut times = Vec::new();
        for (pass, command) in plan.commands(&self.config) {
            if cancel.is_cancelled() {
                return Err(EncodeError::Cancelled);
            }

            self.transition(PipelineState::for_pass(pass));
            println!("{}", pass_start_banner(pass));
            let pass_started = Instant::now();

            let invocation = PassInvocation {
                pass,
                command,
                expected_duration_secs: plan.effective_duration_secs,
            };
            self.runner.run(invocation, cancel).await?;

            let took = pass_started.elapsed();
            println!("{}", pass_done_banner(pass, took));
            times.push((pass, took));
        }
        Ok(times)
    }
}

/// Banner name of a pass
pub fn pass_title(pass: EncodePass) -> &'static str {
    match pass {
        EncodePass::First => "Pass 1",
        EncodePass::Second => "Pass 2",
        EncodePass::Prototype => "Prototype Pass",
    }
}

/// Banner printed to stdout when a pass starts
pub fn pass_start_banner(pass: EncodePass) -> String {
    format!("--- Starting FFmpeg {} ---", pass_title(pass))
}

/// Banner printed to stdout when a pass finishes
pub fn pass_done_banner(pass: EncodePass, took: Duration) -> String {
    format!(
        "--- FFmpeg {} completed in {} ---",
        pass_title(pass),
        format_minutes_seconds(took)
    )
}

/// `Xm Ys`, rounded down to whole seconds
pub fn format_minutes_seconds(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// `H:MM:SS`, rounded down to whole seconds
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
