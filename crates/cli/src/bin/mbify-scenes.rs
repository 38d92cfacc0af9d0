//! Batch entry point: encode every scene listed in a scene-detection CSV
//!
//! Each scene becomes its own target-size encode. With `--print` the
//! equivalent `mbify` command lines are written to stdout instead.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use mbify::scenes::double_quote;
use mbify::{
    cancel_pair, common_encode_args, read_scene_csv, render_scene_command, run_scenes,
    run_startup_checks, scene_output_path, Config, EncodeRequest, Scene,
};
use mbify_cli::args::EncodeOptions;
use mbify_cli::report::{scene_result_line, tool_version_lines};
use mbify_cli::{build_orchestrator, ensure_exists, init_logging, load_config, spawn_interrupt_handler, CliError};

/// mbify-scenes - compress each detected scene of a video to a target size
#[derive(Parser, Debug)]
#[command(name = "mbify-scenes")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source video
    input_video: PathBuf,

    /// Scene list exported by a scene detector
    scenes_csv: PathBuf,

    /// Directory receiving one file per scene
    #[arg(long, default_value = "./out_scenes")]
    output_dir: PathBuf,

    /// Print the mbify command for each scene instead of running it
    #[arg(long)]
    print: bool,

    #[command(flatten)]
    options: EncodeOptions,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.options.verbose);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every scene succeeded
async fn run(args: Args) -> Result<bool, CliError> {
    ensure_exists(&args.input_video)?;
    ensure_exists(&args.scenes_csv)?;
    let config = load_config(args.options.config.as_deref())?;

    let scenes = read_scene_csv(&args.scenes_csv)?;
    if scenes.is_empty() {
        println!("No scenes found in the CSV file.");
        return Ok(true);
    }

    let template = args.options.to_request(args.input_video.clone());
    if args.print {
        for line in print_commands(&template, &scenes, &args.output_dir, args.options.config.as_deref(), &config) {
            println!("{}", line);
        }
        return Ok(true);
    }

    let versions = run_startup_checks(&config)?;
    for line in tool_version_lines(&versions) {
        println!("{}", line);
    }
    println!("Found {} scenes. Output directory: {}", scenes.len(), args.output_dir.display());
    if template.proto {
        println!("PROTO mode: fast constant-quality encodes, sizes will not match the target.");
    }

    let orchestrator = build_orchestrator(config);
    let (handle, signal) = cancel_pair();
    let interrupt = spawn_interrupt_handler(handle);
    let result = run_scenes(&orchestrator, &template, &scenes, &args.output_dir, &signal, |r| {
        println!("{}", scene_result_line(r))
    })
    .await;
    interrupt.abort();

    let results = result?;
    let failed = results.iter().filter(|r| !r.is_success()).count();
    println!("Finished {} scenes, {} failed.", results.len(), failed);
    Ok(failed == 0)
}

/// One `mbify` line per scene, nothing is created
fn print_commands(
    template: &EncodeRequest,
    scenes: &[Scene],
    output_dir: &Path,
    config_path: Option<&Path>,
    config: &Config,
) -> Vec<String> {
    let mut common = common_encode_args(template);
    if let Some(path) = config_path {
        common.push("--config".to_string());
        common.push(double_quote(&path.to_string_lossy()));
    }

    scenes
        .iter()
        .map(|scene| {
            let output = scene_output_path(
                output_dir,
                &template.input,
                &scene.label,
                template.proto,
                &config.encoder.container,
            );
            render_scene_command("mbify", &template.input, &output, scene, &common)
        })
        .collect()
}
