//! camcal: calibrate a camera from a directory of checkerboard JPEG images.

use camcal::chessboard::PatternSize;
use camcal::report::format_run;
use camcal::{run, CalibrationConfig, ConsoleProgress, PipelineError, RunOptions};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camcal::core::level_from_verbosity;
#[cfg(feature = "tracing")]
use camcal::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use camcal::core::init_with_level;

#[derive(Debug, Parser)]
#[command(
    name = "camcal",
    version,
    about = "Monocular camera calibration from checkerboard images"
)]
struct Cli {
    /// Do not write preview images (corner overlays, original vs undistorted).
    #[arg(long)]
    no_gui: bool,

    /// Inner corners along the board x axis (overrides the config file).
    #[arg(long)]
    rows: Option<u32>,

    /// Inner corners along the board y axis (overrides the config file).
    #[arg(long)]
    cols: Option<u32>,

    /// JSON CalibrationConfig; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for choosing the undistortion demo image.
    #[arg(long)]
    seed: Option<u64>,

    /// Undistort the demo image with the optimal new camera matrix instead
    /// of the calibrated one.
    #[arg(long)]
    undistort_with_optimal: bool,

    /// Also write the parameter summary as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG`
    /// takes precedence in builds with the `tracing` feature.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory containing the calibration images (*.jpg, *.jpeg).
    images_directory: PathBuf,
}

fn load_config(cli: &Cli) -> Result<CalibrationConfig, PipelineError> {
    let config = match cli.config.as_deref() {
        Some(path) => CalibrationConfig::load(path)?,
        None => CalibrationConfig::default(),
    };
    let pattern = config.pattern();
    let rows = cli.rows.unwrap_or(pattern.rows);
    let cols = cli.cols.unwrap_or(pattern.cols);
    Ok(config.with_pattern(PatternSize::new(rows, cols)))
}

fn write_json(path: &Path, run: &camcal::CalibrationRun) -> Result<(), PipelineError> {
    let io_error = |source: std::io::Error| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(&run.summary()).map_err(|e| io_error(e.into()))?;
    std::fs::write(path, json + "\n").map_err(io_error)
}

fn try_main(cli: &Cli) -> Result<(), PipelineError> {
    let config = load_config(cli)?;
    let options = RunOptions {
        previews: !cli.no_gui,
        seed: cli.seed,
        undistort_with_optimal: cli.undistort_with_optimal,
    };

    println!("Reading images from directory: {}", cli.images_directory.display());
    let result = match run(&cli.images_directory, &config, &options, &mut ConsoleProgress) {
        Ok(result) => result,
        Err(PipelineError::NoInputImagesFound(_)) => {
            println!("Unable to find any jpeg images in the passed directory. ");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    println!("{}", format_run(&result));
    println!("Calibration saved to {}", result.archive_path.display());
    if let Some(preview) = &result.demo.preview {
        println!("Original vs undistorted image written to {}", preview.display());
    }
    if let Some(path) = &cli.json {
        write_json(path, &result)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "tracing")]
    init_tracing(false, level_from_verbosity(cli.verbose));
    #[cfg(not(feature = "tracing"))]
    let _ = init_with_level(level_from_verbosity(cli.verbose));

    match try_main(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
