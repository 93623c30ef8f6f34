//! Per-series ratio pipeline.
//!
//! Turns one composite stack into one calibrated ratio image:
//!
//! 1. optional channel alignment
//! 2. float conversion and Gaussian blur
//! 3. numerator / denominator channel copies
//! 4. segmentation channel copy with rolling-background subtraction
//! 5. Laplacian edge response
//! 6. binarization according to the run's [`ThresholdMode`]
//! 7. mask normalization (background NaN, foreground 1.0)
//! 8. masked ratio
//! 9. LUT, display range and calibration bar
//!
//! Every intermediate stack is owned by [`RatioPipeline::run`] and dropped
//! when it returns, whether it succeeds or fails.

use crate::config::RatioConfig;
use crate::display::{CalibrationBar, Lut};
use crate::ops::{AutoThresholdMethod, PixelOps, ThresholdPrompt, ThresholdRequest};
use crate::threshold::{ThresholdMode, ThresholdPair, ThresholdState};
use crate::Result;
use log::debug;

/// Largest value of an 8-bit mask.
const MASK_FOREGROUND: f32 = 255.0;

/// Result of one successful series.
#[derive(Debug)]
pub struct SeriesOutcome<S> {
    /// The rendered ratio image, ready for export.
    pub ratio: S,
    /// Pair the mask was binarized with.
    pub threshold: ThresholdPair,
    /// Whether the operator was asked for this series.
    pub prompted: bool,
    /// State to hand to the next series.
    pub state: ThresholdState,
}

/// The ratio pipeline bound to a pixel backend.
pub struct RatioPipeline<O> {
    ops: O,
    config: RatioConfig,
    calibration: CalibrationBar,
}

impl<O: PixelOps> RatioPipeline<O> {
    /// Creates a pipeline after validating `config`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` is invalid.
    pub fn new(ops: O, config: RatioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ops,
            config,
            calibration: CalibrationBar::default(),
        })
    }

    /// Replaces the calibration bar layout.
    #[must_use]
    pub fn with_calibration_bar(mut self, bar: CalibrationBar) -> Self {
        self.calibration = bar;
        self
    }

    #[must_use]
    pub fn ops(&self) -> &O {
        &self.ops
    }

    #[must_use]
    pub fn config(&self) -> &RatioConfig {
        &self.config
    }

    /// Processes one series.
    ///
    /// `state` is the threshold state left by the previous series; the
    /// state for the next series is returned in the outcome. On error the
    /// caller keeps its own copy, so a failed series never captures a pair.
    ///
    /// # Errors
    /// Returns the first error raised by a pixel operation or the prompt.
    pub fn run(
        &self,
        mut stack: O::Stack,
        label: &str,
        state: ThresholdState,
        prompt: &mut dyn ThresholdPrompt<O::Stack>,
    ) -> Result<SeriesOutcome<O::Stack>> {
        let ops = &self.ops;
        let config = &self.config;

        if config.align_channels {
            debug!("{label}: aligning channels (max shift {})", config.max_alignment_shift);
            ops.align_channels(&mut stack, config.max_alignment_shift)?;
        }

        ops.to_float(&mut stack)?;
        ops.gaussian_blur(&mut stack, config.blur_sigma)?;

        let mut numerator = ops.duplicate_channel(&stack, config.numerator_channel)?;
        ops.set_title(&mut numerator, "C1");
        let mut denominator = ops.duplicate_channel(&stack, config.denominator_channel)?;
        ops.set_title(&mut denominator, "C2");

        let mut segment = ops.duplicate_channel(&stack, config.segmentation_channel)?;
        ops.set_title(&mut segment, "Backsubtract");
        ops.subtract_background(&mut segment, config.background_radius)?;
        debug!(
            "{label}: background subtracted on channel {} (radius {})",
            config.segmentation_channel, config.background_radius
        );

        let mut mask = ops.laplacian(&segment, config.laplacian_smoothing)?;
        ops.set_title(&mut mask, "Laplacian");
        drop(segment);
        drop(stack);

        let (threshold, prompted) = self.choose_threshold(&mask, label, state, prompt)?;
        let black_background = state.mode() == ThresholdMode::FullyAutomatic;
        ops.convert_to_mask(&mut mask, threshold, black_background)?;
        debug!(
            "{label}: mask from threshold [{:.4}, {:.4}] ({})",
            threshold.min,
            threshold.max,
            state.mode()
        );

        if ops.is_inverted_lut(&mask) {
            ops.invert_lut(&mut mask);
        }
        ops.to_float(&mut mask)?;
        let foreground = ops.auto_threshold(&mask, AutoThresholdMethod::Default, true)?;
        ops.nan_background(&mut mask, foreground)?;
        ops.divide_scalar(&mut mask, MASK_FOREGROUND)?;

        let quotient = ops.divide(&numerator, &denominator)?;
        let mut ratio = ops.multiply(&quotient, &mask)?;
        ops.set_title(&mut ratio, label);

        ops.apply_lut(&mut ratio, Lut::GreenFireBlue);
        ops.select_none(&mut ratio);
        ops.set_display_range(&mut ratio, config.display_range);
        ops.add_calibration_bar(&mut ratio, &self.calibration)?;

        Ok(SeriesOutcome {
            ratio,
            threshold,
            prompted,
            state: state.after_series(threshold),
        })
    }

    fn choose_threshold(
        &self,
        edges: &O::Stack,
        label: &str,
        state: ThresholdState,
        prompt: &mut dyn ThresholdPrompt<O::Stack>,
    ) -> Result<(ThresholdPair, bool)> {
        let ops = &self.ops;
        if state.mode() == ThresholdMode::FullyAutomatic {
            let pair = ops.auto_threshold(edges, AutoThresholdMethod::Moments, true)?;
            return Ok((pair, false));
        }
        if let Some(pair) = state.captured() {
            debug!("{label}: reusing threshold [{:.4}, {:.4}]", pair.min, pair.max);
            return Ok((pair, false));
        }
        let suggestion = ops.auto_threshold(edges, AutoThresholdMethod::Moments, true)?;
        let pair = prompt.request_threshold(ThresholdRequest {
            label,
            edges,
            value_range: ops.value_range(edges),
            suggestion,
        })?;
        Ok((pair, true))
    }
}
