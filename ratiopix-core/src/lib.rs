//! ratiopix-core: Core types and orchestration for fluorescence ratiometry.
//!
//! This crate holds the data model (stacks, series tables, threshold state),
//! the capability traits every imaging backend implements, and the
//! orchestration that ties them together: the per-series [`RatioPipeline`]
//! and the file-level [`BatchRunner`].
//!

pub mod batch;
pub mod config;
pub mod display;
pub mod error;
pub mod naming;
pub mod ops;
pub mod pipeline;
pub mod progress;
pub mod series;
pub mod stack;
pub mod threshold;

pub use batch::{BatchRunner, ErrorPolicy, Failure, RunOptions, RunSummary};
pub use config::RatioConfig;
pub use display::{BarColor, CalibrationBar, Corner, DisplayRange, Lut, RgbImage};
pub use error::{Error, Result};
pub use ops::{
    AutoThresholdMethod, ImageEncoder, MetadataService, PixelOps, SeriesDecoder,
    ThresholdPrompt, ThresholdRequest,
};
pub use pipeline::{RatioPipeline, SeriesOutcome};
pub use progress::{NoProgress, ProgressReporter};
pub use series::{absolute_series_indices, inspect_series, InputFile};
pub use stack::{BitDepth, ImageStack, Roi};
pub use threshold::{ThresholdMode, ThresholdPair, ThresholdState};
