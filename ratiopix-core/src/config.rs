//! Pipeline configuration.

use crate::display::DisplayRange;
use crate::{Error, Result};
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Constants and channel choices for the ratio pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RatioConfig {
    /// Gaussian blur sigma applied to all channels (pixels).
    pub blur_sigma: f64,
    /// Rolling-ball radius for background subtraction (pixels).
    pub background_radius: f64,
    /// Smoothing scale of the Laplacian edge filter (pixels).
    pub laplacian_smoothing: f64,
    /// Display window of the ratio image.
    pub display_range: DisplayRange,
    /// 1-based numerator channel.
    pub numerator_channel: usize,
    /// 1-based denominator channel.
    pub denominator_channel: usize,
    /// 1-based segmentation channel.
    pub segmentation_channel: usize,
    /// Align channels before anything else.
    pub align_channels: bool,
    /// Largest shift searched when aligning channels (pixels).
    pub max_alignment_shift: usize,
}

impl Default for RatioConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            background_radius: 20.0,
            laplacian_smoothing: 1.0,
            display_range: DisplayRange::new(0.0, 3.0),
            numerator_channel: 1,
            denominator_channel: 2,
            segmentation_channel: 1,
            align_channels: false,
            max_alignment_shift: 20,
        }
    }
}

impl RatioConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the 1-based segmentation channel.
    #[must_use]
    pub fn with_segmentation_channel(mut self, channel: usize) -> Self {
        self.segmentation_channel = channel;
        self
    }

    /// Enables or disables channel alignment.
    #[must_use]
    pub fn with_alignment(mut self, enabled: bool) -> Self {
        self.align_channels = enabled;
        self
    }

    /// Sets the blur sigma.
    #[must_use]
    pub fn with_blur_sigma(mut self, sigma: f64) -> Self {
        self.blur_sigma = sigma;
        self
    }

    /// Sets the rolling-ball radius.
    #[must_use]
    pub fn with_background_radius(mut self, radius: f64) -> Self {
        self.background_radius = radius;
        self
    }

    /// Sets the display range of the ratio image.
    #[must_use]
    pub fn with_display_range(mut self, min: f64, max: f64) -> Self {
        self.display_range = DisplayRange::new(min, max);
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    /// Returns a configuration error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, channel) in [
            ("numerator_channel", self.numerator_channel),
            ("denominator_channel", self.denominator_channel),
            ("segmentation_channel", self.segmentation_channel),
        ] {
            if channel == 0 {
                return Err(Error::Config(format!("{name} is 1-based, got 0")));
            }
        }
        for (name, value) in [
            ("blur_sigma", self.blur_sigma),
            ("background_radius", self.background_radius),
            ("laplacian_smoothing", self.laplacian_smoothing),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.display_range.max.partial_cmp(&self.display_range.min) != Some(Ordering::Greater) {
            return Err(Error::Config(format!(
                "display range [{}, {}] is empty",
                self.display_range.min, self.display_range.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_workflow_constants() {
        let config = RatioConfig::default();
        assert!((config.blur_sigma - 1.5).abs() < f64::EPSILON);
        assert!((config.background_radius - 20.0).abs() < f64::EPSILON);
        assert!((config.laplacian_smoothing - 1.0).abs() < f64::EPSILON);
        assert!((config.display_range.max - 3.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = RatioConfig::new()
            .with_segmentation_channel(2)
            .with_alignment(true)
            .with_blur_sigma(2.0);
        assert_eq!(config.segmentation_channel, 2);
        assert!(config.align_channels);
        assert!(config.validate().is_ok());

        assert!(RatioConfig::new().with_segmentation_channel(0).validate().is_err());
        assert!(RatioConfig::new().with_background_radius(-1.0).validate().is_err());
        assert!(RatioConfig::new().with_display_range(3.0, 0.0).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_overrides_keep_defaults() {
        let config: RatioConfig = serde_json::from_str(r#"{"blur_sigma": 2.5}"#).unwrap();
        assert!((config.blur_sigma - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.denominator_channel, 2);
    }
}
