//! Capability traits for every collaborator the pipeline delegates to.
//!
//! The orchestration in [`crate::pipeline`] and [`crate::batch`] only talks to
//! these traits, so any imaging backend (or a test fake) can be plugged in.

use crate::display::{CalibrationBar, DisplayRange, Lut, RgbImage};
use crate::threshold::ThresholdPair;
use crate::Result;
use std::path::Path;

/// Histogram-based automatic threshold methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoThresholdMethod {
    /// Moment-preserving threshold (Tsai).
    Moments,
    /// Iterative intermeans (IsoData variant).
    Default,
}

/// File metadata queries.
pub trait MetadataService {
    /// Number of independent series in `path`.
    ///
    /// # Errors
    /// Returns a metadata error if the file cannot be parsed.
    fn series_count(&self, path: &Path) -> Result<usize>;

    /// Number of resolution levels of `series` (zero-based).
    ///
    /// # Errors
    /// Returns a metadata error if the file cannot be parsed or the series
    /// does not exist.
    fn resolution_count(&self, path: &Path, series: usize) -> Result<usize>;
}

/// Opens one series of a file as an image stack.
pub trait SeriesDecoder {
    type Stack;

    /// Opens the series addressed by `absolute_index` as a composite stack.
    ///
    /// # Errors
    /// Returns an import error if decoding fails.
    fn open_series(&self, path: &Path, absolute_index: usize) -> Result<Self::Stack>;
}

/// Writes rendered stacks to disk.
pub trait ImageEncoder {
    type Stack;

    /// Writes `stack` as a single uncompressed image, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Returns an export error on any write failure.
    fn write_image(&self, stack: &Self::Stack, path: &Path) -> Result<()>;

    /// Writes an already flattened RGB rendering.
    ///
    /// # Errors
    /// Returns an export error on any write failure.
    fn write_rgb(&self, image: &RgbImage, path: &Path) -> Result<()>;
}

/// Pixel operations used by the ratio pipeline.
///
/// Channel numbers are 1-based, matching the user-facing parameters.
pub trait PixelOps {
    type Stack;

    fn set_title(&self, stack: &mut Self::Stack, title: &str);

    /// Spatially registers every channel onto channel 1.
    ///
    /// # Errors
    /// Returns a processing error if the stack cannot be registered.
    fn align_channels(&self, stack: &mut Self::Stack, max_shift: usize) -> Result<()>;

    /// Converts samples to 32-bit float.
    ///
    /// # Errors
    /// Returns a processing error if the conversion is not possible.
    fn to_float(&self, stack: &mut Self::Stack) -> Result<()>;

    /// Gaussian blur of every plane.
    ///
    /// # Errors
    /// Returns a processing error for a non-positive sigma.
    fn gaussian_blur(&self, stack: &mut Self::Stack, sigma: f64) -> Result<()>;

    /// Copies the first slice of `channel` into a new single-channel stack.
    ///
    /// # Errors
    /// Returns a processing error if the channel does not exist.
    fn duplicate_channel(&self, stack: &Self::Stack, channel: usize) -> Result<Self::Stack>;

    /// Subtracts a rolling-ball background of `radius`.
    ///
    /// # Errors
    /// Returns a processing error for a non-positive radius.
    fn subtract_background(&self, stack: &mut Self::Stack, radius: f64) -> Result<()>;

    /// Laplacian edge response at smoothing scale `smoothing`.
    ///
    /// # Errors
    /// Returns a processing error for a non-positive scale.
    fn laplacian(&self, stack: &Self::Stack, smoothing: f64) -> Result<Self::Stack>;

    /// Computes a threshold pair from the stack histogram.
    ///
    /// With `dark_background` the pair selects the bright side.
    ///
    /// # Errors
    /// Returns a processing error if the stack holds no finite pixels.
    fn auto_threshold(
        &self,
        stack: &Self::Stack,
        method: AutoThresholdMethod,
        dark_background: bool,
    ) -> Result<ThresholdPair>;

    /// Binarizes to 0/255: pixels inside `pair` become 255.
    ///
    /// Without `black_background` the result carries an inverted LUT.
    ///
    /// # Errors
    /// Returns a processing error if the stack cannot be binarized.
    fn convert_to_mask(
        &self,
        stack: &mut Self::Stack,
        pair: ThresholdPair,
        black_background: bool,
    ) -> Result<()>;

    fn is_inverted_lut(&self, stack: &Self::Stack) -> bool;

    fn invert_lut(&self, stack: &mut Self::Stack);

    /// Sets every pixel outside `pair` to NaN.
    ///
    /// # Errors
    /// Returns a processing error if the stack is not float.
    fn nan_background(&self, stack: &mut Self::Stack, pair: ThresholdPair) -> Result<()>;

    /// Divides every pixel by `value`.
    ///
    /// # Errors
    /// Returns a processing error for a zero divisor.
    fn divide_scalar(&self, stack: &mut Self::Stack, value: f32) -> Result<()>;

    /// Pixel-wise `a / b` as a new float stack.
    ///
    /// # Errors
    /// Returns a processing error if the shapes differ.
    fn divide(&self, a: &Self::Stack, b: &Self::Stack) -> Result<Self::Stack>;

    /// Pixel-wise `a * b` as a new float stack.
    ///
    /// # Errors
    /// Returns a processing error if the shapes differ.
    fn multiply(&self, a: &Self::Stack, b: &Self::Stack) -> Result<Self::Stack>;

    fn apply_lut(&self, stack: &mut Self::Stack, lut: Lut);

    /// Clears any active selection.
    fn select_none(&self, stack: &mut Self::Stack);

    fn set_display_range(&self, stack: &mut Self::Stack, range: DisplayRange);

    /// Attaches a calibration bar overlay.
    ///
    /// # Errors
    /// Returns a processing error if the stack has no display range yet.
    fn add_calibration_bar(&self, stack: &mut Self::Stack, bar: &CalibrationBar) -> Result<()>;

    /// Minimum and maximum over finite pixels.
    fn value_range(&self, stack: &Self::Stack) -> Option<(f32, f32)>;

    /// Renders the first plane through its LUT and display range with the
    /// overlay burned in.
    ///
    /// # Errors
    /// Returns a processing error if the stack has no display range.
    fn flatten(&self, stack: &Self::Stack) -> Result<RgbImage>;
}

/// What the human sees when asked for a threshold.
pub struct ThresholdRequest<'a, S> {
    /// Human readable series label, e.g. `plate.nd2 [series 2/4]`.
    pub label: &'a str,
    /// The edge-response image to threshold.
    pub edges: &'a S,
    /// Finite value range of `edges`.
    pub value_range: Option<(f32, f32)>,
    /// Automatic suggestion to start from.
    pub suggestion: ThresholdPair,
}

/// Blocking human confirmation of a threshold pair.
pub trait ThresholdPrompt<S> {
    /// Blocks until the operator confirms a pair.
    ///
    /// # Errors
    /// Returns a prompt error if no pair can be obtained.
    fn request_threshold(&mut self, request: ThresholdRequest<'_, S>) -> Result<ThresholdPair>;
}
