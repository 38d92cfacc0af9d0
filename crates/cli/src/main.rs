//! CLI entry point for mbify
//!
//! Compresses one video to a target size with a two-pass VP9 encode.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use mbify::{cancel_pair, run_startup_checks};
use mbify_cli::args::{parse_trim_point, EncodeOptions};
use mbify_cli::report::{completion_lines, summary_lines, tool_version_lines};
use mbify_cli::{build_orchestrator, ensure_exists, init_logging, load_config, spawn_interrupt_handler, CliError};

/// mbify - compress a video to a target file size
#[derive(Parser, Debug)]
#[command(name = "mbify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video to compress
    input: PathBuf,

    /// Output file (default: input name with the container extension)
    output: Option<PathBuf>,

    /// Trim start, in seconds or [HH:]MM:SS[.ms]
    #[arg(long)]
    start: Option<String>,

    /// Trim end, in seconds or [HH:]MM:SS[.ms]
    #[arg(long)]
    end: Option<String>,

    #[command(flatten)]
    options: EncodeOptions,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.options.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    ensure_exists(&args.input)?;
    let config = load_config(args.options.config.as_deref())?;
    let versions = run_startup_checks(&config)?;
    for line in tool_version_lines(&versions) {
        println!("{}", line);
    }

    let mut request = args.options.to_request(args.input);
    request.output = args.output;
    request.start = parse_trim_point(args.start.as_deref())?;
    request.end = parse_trim_point(args.end.as_deref())?;

    let orchestrator = build_orchestrator(config);
    let started_at = Local::now();
    let plan = orchestrator.prepare(&request)?;
    for line in summary_lines(&plan, orchestrator.config(), started_at) {
        println!("{}", line);
    }

    let (handle, signal) = cancel_pair();
    let interrupt = spawn_interrupt_handler(handle);
    let result = orchestrator.execute(plan, &signal).await;
    interrupt.abort();

    let outcome = result?;
    for line in completion_lines(&outcome, Local::now()) {
        println!("{}", line);
    }
    Ok(())
}
