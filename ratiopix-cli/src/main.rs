//! ratiopix CLI: batch fluorescence ratiometry.
//!
//! Walks a source directory, splits every matching file into its series and
//! writes one masked, calibrated ratio image per series.
#![allow(clippy::uninlined_format_args, clippy::redundant_closure_for_method_calls)]

mod prompt;

use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use log::{error, info};
use prompt::LinePrompt;
use ratiopix_algorithms::NativeOps;
use ratiopix_core::progress::{render_bar, FILE_LINE, SERIES_LINE};
use ratiopix_core::{
    BatchRunner, ErrorPolicy, ProgressReporter, RatioConfig, RatioPipeline, RunOptions,
    ThresholdMode,
};
use ratiopix_io::{find_files, TiffExporter, TiffReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] ratiopix_core::Error),

    #[error("Invalid parameter file {path}: {source}")]
    Params {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How the segmentation threshold is chosen.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThreshMethod {
    /// Moments threshold per series, never prompts
    FullyAutomatic,
    /// Prompt on the first series, reuse the pair for the rest of the run
    ManualOnce,
    /// Prompt on every series
    FullyManual,
}

impl From<ThreshMethod> for ThresholdMode {
    fn from(method: ThreshMethod) -> Self {
        match method {
            ThreshMethod::FullyAutomatic => ThresholdMode::FullyAutomatic,
            ThreshMethod::ManualOnce => ThresholdMode::ManualOnce,
            ThreshMethod::FullyManual => ThresholdMode::FullyManual,
        }
    }
}

/// Masked channel-ratio images from multi-series microscopy files.
#[derive(Parser, Debug)]
#[command(name = "ratiopix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory searched recursively for input files
    src_dir: PathBuf,

    /// Output directory (defaults to each input file's directory)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Only process files whose name ends with this suffix
    #[arg(long, default_value = "nd2")]
    filename_filter: String,

    /// 1-based channel used for segmentation (default 1, or the --params value)
    #[arg(long)]
    seg_chnl: Option<usize>,

    /// Align channels before computing the ratio
    #[arg(long)]
    do_stackreg: bool,

    /// Threshold mode
    #[arg(long, value_enum, default_value = "fully-automatic")]
    thresh_method: ThreshMethod,

    /// Stop at the first failing file or series
    #[arg(long)]
    fail_fast: bool,

    /// Also write an RGB image with the calibration bar burned in
    #[arg(long)]
    flatten: bool,

    /// JSON file overriding pipeline constants
    #[arg(long)]
    params: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Writes progress bars and status lines through `log`.
struct LogProgress;

/// Progress bar tagged with the logical line it belongs to.
fn progress_message(line: usize, progress: usize, total: usize, prefix: &str) -> String {
    let tag = match line {
        FILE_LINE => "files",
        SERIES_LINE => "series",
        _ => "progress",
    };
    format!("[{tag}] {}", render_bar(progress, total, prefix))
}

impl ProgressReporter for LogProgress {
    fn update(&self, line: usize, progress: usize, total: usize, prefix: &str) {
        info!("{}", progress_message(line, progress, total, prefix));
    }

    fn status(&self, message: &str) {
        info!("{}", message);
    }
}

fn load_config(params: Option<&Path>) -> Result<RatioConfig> {
    let Some(path) = params else {
        return Ok(RatioConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Params {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: &Cli) -> Result<bool> {
    let mut config = load_config(cli.params.as_deref())?;
    if let Some(channel) = cli.seg_chnl {
        config = config.with_segmentation_channel(channel);
    }
    if cli.do_stackreg {
        config = config.with_alignment(true);
    }
    let pipeline = RatioPipeline::new(NativeOps::new(), config)?;

    let files = find_files(&cli.src_dir, &cli.filename_filter, cli.out_dir.as_deref())?;
    info!(
        "Found {} file(s) ending in '{}' under {}",
        files.len(),
        cli.filename_filter,
        cli.src_dir.display()
    );

    let reader = TiffReader::new();
    let exporter = TiffExporter::new();
    let options = RunOptions {
        out_dir: cli.out_dir.clone(),
        error_policy: if cli.fail_fast {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::Continue
        },
        flatten: cli.flatten,
    };
    let runner = BatchRunner::new(pipeline, &reader, &reader, &exporter, &LogProgress, options);

    let stdin = std::io::stdin();
    let mut prompt = LinePrompt::new(stdin.lock(), std::io::stderr());
    let summary = runner.run(&files, cli.thresh_method.into(), &mut prompt)?;

    info!(
        "{} file(s), {} series written, {} prompt(s), {} failure(s)",
        summary.files,
        summary.series_written,
        summary.prompts,
        summary.failures.len()
    );
    for failure in &summary.failures {
        match failure.series {
            Some(series) => error!(
                "{} (series {}): {}",
                failure.path.display(),
                series + 1,
                failure.message
            ),
            None => error!("{}: {}", failure.path.display(), failure.message),
        }
    }
    Ok(summary.is_clean())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    builder.format_timestamp_secs();
    builder.init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
