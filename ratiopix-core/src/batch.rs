//! File and series loop around the ratio pipeline.

use crate::naming::{calibration_path, ratio_path, series_stem};
use crate::ops::{ImageEncoder, MetadataService, PixelOps, SeriesDecoder, ThresholdPrompt};
use crate::pipeline::RatioPipeline;
use crate::progress::{ProgressReporter, FILE_LINE, SERIES_LINE};
use crate::series::InputFile;
use crate::threshold::{ThresholdMode, ThresholdState};
use crate::{Error, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// What happens after a file or series fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the run at the first failure.
    FailFast,
    /// Log the failure, skip the file (metadata) or series, keep going.
    #[default]
    Continue,
}

/// Options of one batch run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Output directory. `None` writes next to each input file.
    pub out_dir: Option<PathBuf>,
    pub error_policy: ErrorPolicy,
    /// Also write a flattened RGB rendering with the calibration bar.
    pub flatten: bool,
}

/// A unit of work that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: PathBuf,
    /// Zero-based series, `None` when the whole file failed.
    pub series: Option<usize>,
    pub message: String,
}

/// Totals of one batch run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files whose metadata could be read.
    pub files: usize,
    /// Series that produced a ratio image.
    pub series_written: usize,
    /// Times the operator was asked for a threshold.
    pub prompts: usize,
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives the ratio pipeline over a list of files.
pub struct BatchRunner<'a, O: PixelOps> {
    pipeline: RatioPipeline<O>,
    metadata: &'a dyn MetadataService,
    decoder: &'a dyn SeriesDecoder<Stack = O::Stack>,
    encoder: &'a dyn ImageEncoder<Stack = O::Stack>,
    progress: &'a dyn ProgressReporter,
    options: RunOptions,
}

impl<'a, O: PixelOps> BatchRunner<'a, O> {
    pub fn new(
        pipeline: RatioPipeline<O>,
        metadata: &'a dyn MetadataService,
        decoder: &'a dyn SeriesDecoder<Stack = O::Stack>,
        encoder: &'a dyn ImageEncoder<Stack = O::Stack>,
        progress: &'a dyn ProgressReporter,
        options: RunOptions,
    ) -> Self {
        Self {
            pipeline,
            metadata,
            decoder,
            encoder,
            progress,
            options,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &RatioPipeline<O> {
        &self.pipeline
    }

    /// Processes `files` in order, one series at a time.
    ///
    /// The threshold state starts unset and is threaded through every series
    /// of every file.
    ///
    /// # Errors
    /// Under [`ErrorPolicy::FailFast`] returns the first failure. Under
    /// [`ErrorPolicy::Continue`] failures are recorded in the summary instead,
    /// except [`Error::Prompt`], which always halts the run.
    pub fn run(
        &self,
        files: &[PathBuf],
        mode: ThresholdMode,
        prompt: &mut dyn ThresholdPrompt<O::Stack>,
    ) -> Result<RunSummary> {
        self.progress.status("Run starting");
        if mode == ThresholdMode::ManualOnce && files.len() > 1 {
            warn!(
                "the threshold confirmed on the first series is reused for all {} files; \
                 it may not suit files acquired with a different exposure",
                files.len()
            );
        }

        let mut summary = RunSummary::default();
        let mut state = ThresholdState::new(mode);

        for (file_id, path) in files.iter().enumerate() {
            self.progress.update(
                FILE_LINE,
                file_id + 1,
                files.len(),
                &format!("Processing: {file_id}"),
            );

            let file = match InputFile::inspect(path.clone(), self.metadata) {
                Ok(file) => file,
                Err(err) => {
                    self.record(&mut summary, path, None, err)?;
                    continue;
                }
            };
            summary.files += 1;
            info!(
                "{}: {} series",
                path.display(),
                file.series_count()
            );

            for series in 0..file.series_count() {
                self.progress
                    .update(SERIES_LINE, series + 1, file.series_count(), "Opening series : ");
                match self.process_series(&file, series, state, prompt) {
                    Ok(done) => {
                        state = done.state;
                        summary.series_written += 1;
                        summary.prompts += usize::from(done.prompted);
                        summary.outputs.extend(done.outputs);
                    }
                    Err(err) => self.record(&mut summary, path, Some(series), err)?,
                }
            }
        }

        self.progress.status("Run finished");
        Ok(summary)
    }

    fn process_series(
        &self,
        file: &InputFile,
        series: usize,
        state: ThresholdState,
        prompt: &mut dyn ThresholdPrompt<O::Stack>,
    ) -> Result<SeriesDone> {
        let count = file.series_count();
        let index = file
            .absolute_index(series)
            .ok_or_else(|| Error::import(file.path(), series, "series index out of range"))?;
        let stack = self.decoder.open_series(file.path(), index)?;

        let name = file
            .path()
            .file_name()
            .map_or_else(|| file.base_name().to_string(), |n| n.to_string_lossy().into_owned());
        let label = format!("{name} [series {}/{count}]", series + 1);
        let outcome = self.pipeline.run(stack, &label, state, prompt)?;

        let out_dir = self.options.out_dir.as_deref().unwrap_or(file.directory());
        let stem = series_stem(file.base_name(), series, count);
        let aligned = self.pipeline.config().align_channels;

        let ratio_file = ratio_path(out_dir, &stem, aligned);
        self.encoder.write_image(&outcome.ratio, &ratio_file)?;
        info!("{label}: wrote {}", ratio_file.display());
        let mut outputs = vec![ratio_file];

        if self.options.flatten {
            let rgb = self.pipeline.ops().flatten(&outcome.ratio)?;
            let flat_file = calibration_path(out_dir, &stem);
            self.encoder.write_rgb(&rgb, &flat_file)?;
            outputs.push(flat_file);
        }

        Ok(SeriesDone {
            outputs,
            prompted: outcome.prompted,
            state: outcome.state,
        })
    }

    fn record(
        &self,
        summary: &mut RunSummary,
        path: &Path,
        series: Option<usize>,
        err: Error,
    ) -> Result<()> {
        match series {
            Some(series) => warn!("{}: series {} failed: {err}", path.display(), series + 1),
            None => warn!("{}: skipped: {err}", path.display()),
        }
        // A dead prompt cannot answer any later series either.
        if self.options.error_policy == ErrorPolicy::FailFast || matches!(err, Error::Prompt(_)) {
            return Err(err);
        }
        summary.failures.push(Failure {
            path: path.to_path_buf(),
            series,
            message: err.to_string(),
        });
        Ok(())
    }
}

struct SeriesDone {
    outputs: Vec<PathBuf>,
    prompted: bool,
    state: ThresholdState,
}
