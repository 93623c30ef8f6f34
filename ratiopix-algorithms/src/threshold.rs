//! Histogram-based automatic thresholds.
//!
//! Float data is binned into 256 bins spanning its finite range. A method
//! returns a bin level; pixels in bins above the level are foreground on a
//! dark background.

use ratiopix_core::{AutoThresholdMethod, ThresholdPair};

/// Number of histogram bins.
pub const BINS: usize = 256;

/// 256-bin histogram over the finite range of the data.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Pixel count per bin.
    pub counts: [u64; BINS],
    /// Smallest finite value.
    pub min: f32,
    /// Largest finite value.
    pub max: f32,
}

impl Histogram {
    /// Bins every finite value. Returns `None` if there are none.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_values<'a>(values: impl Iterator<Item = &'a f32> + Clone) -> Option<Self> {
        let (min, max) = values
            .clone()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        let mut counts = [0u64; BINS];
        let span = max - min;
        for v in values.copied().filter(|v| v.is_finite()) {
            let bin = if span > 0.0 {
                (((v - min) / span) * BINS as f32) as usize
            } else {
                0
            };
            counts[bin.min(BINS - 1)] += 1;
        }
        Some(Self { counts, min, max })
    }

    /// Lower edge of bin `level`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn level_value(&self, level: usize) -> f64 {
        let width = (f64::from(self.max) - f64::from(self.min)) / BINS as f64;
        f64::from(self.min) + level as f64 * width
    }

    /// Converts a level into a threshold pair.
    ///
    /// On a dark background the pair covers the bins above `level`,
    /// otherwise the bins up to and including it.
    #[must_use]
    pub fn pair_for_level(&self, level: usize, dark_background: bool) -> ThresholdPair {
        let split = self.level_value((level + 1).min(BINS));
        if dark_background {
            ThresholdPair::new(split, f64::from(self.max))
        } else {
            ThresholdPair::new(f64::from(self.min), split)
        }
    }
}

/// Moment-preserving threshold (Tsai, 1985).
///
/// Returns `None` for a histogram with a single populated bin.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn moments_level(counts: &[u64; BINS]) -> Option<usize> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    let histo: Vec<f64> = counts.iter().map(|&c| c as f64 / total).collect();

    let (mut m1, mut m2, mut m3) = (0.0, 0.0, 0.0);
    for (i, p) in histo.iter().enumerate() {
        let i = i as f64;
        m1 += i * p;
        m2 += i * i * p;
        m3 += i * i * i * p;
    }
    let m0 = 1.0;
    let cd = m0 * m2 - m1 * m1;
    if cd.abs() < f64::EPSILON {
        return None;
    }
    let c0 = (-m2 * m2 + m1 * m3) / cd;
    let c1 = (m0 * -m3 + m2 * m1) / cd;
    let disc = (c1 * c1 - 4.0 * c0).max(0.0).sqrt();
    let z0 = 0.5 * (-c1 - disc);
    let z1 = 0.5 * (-c1 + disc);
    let p0 = (z1 - m1) / (z1 - z0);

    let mut sum = 0.0;
    for (i, p) in histo.iter().enumerate() {
        sum += p;
        if sum > p0 {
            return Some(i);
        }
    }
    Some(BINS - 1)
}

/// ImageJ "Default" threshold: iterative intermeans ignoring the extreme bins.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn default_level(counts: &[u64; BINS]) -> usize {
    let mut data = *counts;
    data[0] = 0;
    data[BINS - 1] = 0;

    let mut min = 0;
    while min < BINS - 1 && data[min] == 0 {
        min += 1;
    }
    let mut max = BINS - 1;
    while max > 0 && data[max] == 0 {
        max -= 1;
    }
    if min >= max {
        return BINS / 2;
    }

    let mut moving = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0, 0.0, 0.0, 0.0);
        for (i, &c) in data.iter().enumerate().take(moving + 1).skip(min) {
            sum1 += i as f64 * c as f64;
            sum2 += c as f64;
        }
        for (i, &c) in data.iter().enumerate().take(max + 1).skip(moving + 1) {
            sum3 += i as f64 * c as f64;
            sum4 += c as f64;
        }
        let low = if sum2 > 0.0 { sum1 / sum2 } else { 0.0 };
        let high = if sum4 > 0.0 { sum3 / sum4 } else { 0.0 };
        result = (low + high) / 2.0;
        moving += 1;
        if !((moving + 1) as f64 <= result && moving < max - 1) {
            break;
        }
    }
    result.round() as usize
}

/// Computes a threshold pair for `values`.
///
/// A constant image selects everything. Returns `None` when no value is
/// finite.
pub fn auto_threshold<'a>(
    values: impl Iterator<Item = &'a f32> + Clone,
    method: AutoThresholdMethod,
    dark_background: bool,
) -> Option<ThresholdPair> {
    let histogram = Histogram::from_values(values)?;
    if histogram.max <= histogram.min {
        return Some(ThresholdPair::new(
            f64::from(histogram.min),
            f64::from(histogram.max),
        ));
    }
    let level = match method {
        AutoThresholdMethod::Moments => moments_level(&histogram.counts).unwrap_or(BINS / 2),
        AutoThresholdMethod::Default => default_level(&histogram.counts),
    };
    Some(histogram.pair_for_level(level, dark_background))
}
