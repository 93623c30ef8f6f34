//! Threshold modes and the run-wide threshold state.
//!
//! The mode is fixed for a run. Whether a manually chosen pair is available
//! is tracked separately, so clearing the pair never changes the mode.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower and upper bound used to binarize the edge image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThresholdPair {
    pub min: f64,
    pub max: f64,
}

impl ThresholdPair {
    /// Creates a pair, swapping the bounds if they are given in reverse.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Returns true if `value` lies within the pair (inclusive).
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// How the segmentation threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMode {
    /// Moments threshold computed per series, no human involved.
    #[default]
    FullyAutomatic,
    /// Ask once on the first series and reuse for the rest of the run.
    ManualOnce,
    /// Ask on every series.
    FullyManual,
}

impl ThresholdMode {
    /// Returns true if this mode ever asks a human.
    #[must_use]
    pub fn is_manual(self) -> bool {
        !matches!(self, ThresholdMode::FullyAutomatic)
    }
}

impl std::fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdMode::FullyAutomatic => write!(f, "Fully automatic"),
            ThresholdMode::ManualOnce => write!(f, "Manual once and apply to all"),
            ThresholdMode::FullyManual => write!(f, "Fully manual"),
        }
    }
}

/// Run-wide threshold state threaded through successive series.
///
/// Passed into each series by value and handed back with its result. A
/// failed series leaves the caller's copy untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThresholdState {
    mode: ThresholdMode,
    captured: Option<ThresholdPair>,
}

impl ThresholdState {
    /// Creates an unset state for `mode`.
    #[must_use]
    pub fn new(mode: ThresholdMode) -> Self {
        Self {
            mode,
            captured: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// The pair available for reuse, if any.
    #[must_use]
    pub fn captured(&self) -> Option<ThresholdPair> {
        match self.mode {
            ThresholdMode::FullyAutomatic => None,
            ThresholdMode::ManualOnce | ThresholdMode::FullyManual => self.captured,
        }
    }

    /// Returns true if the next series must ask a human.
    #[must_use]
    pub fn needs_prompt(&self) -> bool {
        self.mode.is_manual() && self.captured.is_none()
    }

    /// Records that a series binarized its mask with `pair` and returns the
    /// state for the next series.
    ///
    /// Manual-once keeps the pair for the rest of the run. Fully-manual
    /// drops it so the next series asks again. Automatic never keeps one.
    #[must_use]
    pub fn after_series(self, pair: ThresholdPair) -> Self {
        let captured = match self.mode {
            ThresholdMode::FullyAutomatic | ThresholdMode::FullyManual => None,
            ThresholdMode::ManualOnce => Some(self.captured.unwrap_or(pair)),
        };
        Self {
            mode: self.mode,
            captured,
        }
    }
}
