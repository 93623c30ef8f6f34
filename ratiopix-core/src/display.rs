//! Display state carried by image stacks: lookup tables, display range and
//! the calibration bar overlay.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lookup tables known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Lut {
    /// Black to white.
    #[default]
    Grays,
    /// Black to blue to green to yellow to white.
    GreenFireBlue,
}

/// Control points for the Green Fire Blue ramp as `(position, [r, g, b])`.
const GREEN_FIRE_BLUE: [(f32, [f32; 3]); 5] = [
    (0.0, [0.0, 0.0, 0.0]),
    (0.25, [0.0, 20.0, 180.0]),
    (0.5, [0.0, 190.0, 90.0]),
    (0.75, [200.0, 230.0, 0.0]),
    (1.0, [255.0, 255.0, 255.0]),
];

impl std::fmt::Display for Lut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lut::Grays => write!(f, "Grays"),
            Lut::GreenFireBlue => write!(f, "Green Fire Blue"),
        }
    }
}

impl Lut {
    /// Maps a normalized value in [0, 1] to an RGB triple.
    ///
    /// Values outside the unit interval are clamped. NaN maps to black.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn color(self, value: f32) -> [u8; 3] {
        if value.is_nan() {
            return [0, 0, 0];
        }
        let t = value.clamp(0.0, 1.0);
        match self {
            Lut::Grays => {
                let v = (t * 255.0).round() as u8;
                [v, v, v]
            }
            Lut::GreenFireBlue => {
                let upper = GREEN_FIRE_BLUE
                    .iter()
                    .position(|(pos, _)| *pos >= t)
                    .unwrap_or(GREEN_FIRE_BLUE.len() - 1)
                    .max(1);
                let (p0, c0) = GREEN_FIRE_BLUE[upper - 1];
                let (p1, c1) = GREEN_FIRE_BLUE[upper];
                let w = (t - p0) / (p1 - p0);
                let mut rgb = [0u8; 3];
                for (out, (a, b)) in rgb.iter_mut().zip(c0.iter().zip(c1.iter())) {
                    *out = (a + (b - a) * w).round().clamp(0.0, 255.0) as u8;
                }
                rgb
            }
        }
    }
}

/// Intensity window used when rendering a stack.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    /// Creates a new display range.
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Normalizes `value` into [0, 1] relative to this window.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((f64::from(value) - self.min) / span) as f32
    }
}

impl Default for DisplayRange {
    fn default() -> Self {
        Self { min: 0.0, max: 3.0 }
    }
}

/// Corner of the image a calibration bar is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Corner {
    #[default]
    UpperRight,
    UpperLeft,
    LowerRight,
    LowerLeft,
}

/// Flat colors used for calibration bar fill and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BarColor {
    White,
    Black,
}

impl BarColor {
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            BarColor::White => [255, 255, 255],
            BarColor::Black => [0, 0, 0],
        }
    }
}

/// Calibration bar overlay mapping display colors back to intensities.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationBar {
    pub location: Corner,
    pub fill: BarColor,
    pub label: BarColor,
    /// Number of labelled ticks, including both ends.
    pub number: usize,
    /// Decimal places in tick labels.
    pub decimals: usize,
    pub font_size: u32,
    pub zoom: f64,
}

impl Default for CalibrationBar {
    fn default() -> Self {
        Self {
            location: Corner::UpperRight,
            fill: BarColor::White,
            label: BarColor::Black,
            number: 5,
            decimals: 3,
            font_size: 12,
            zoom: 1.0,
        }
    }
}

impl CalibrationBar {
    /// Tick values, evenly spaced from `range.min` to `range.max`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ticks(&self, range: DisplayRange) -> Vec<f64> {
        match self.number {
            0 => Vec::new(),
            1 => vec![range.min],
            n => {
                let step = (range.max - range.min) / (n - 1) as f64;
                (0..n).map(|i| range.min + step * i as f64).collect()
            }
        }
    }

    /// Tick labels formatted with the configured number of decimals.
    #[must_use]
    pub fn labels(&self, range: DisplayRange) -> Vec<String> {
        self.ticks(range)
            .into_iter()
            .map(|v| format!("{v:.prec$}", prec = self.decimals))
            .collect()
    }
}

/// Flattened 8-bit RGB rendering, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[u8; 3]>,
}

impl RgbImage {
    /// Creates an image filled with `color`.
    #[must_use]
    pub fn filled(width: usize, height: usize, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Sets one pixel, ignoring coordinates outside the image.
    pub fn put(&mut self, x: usize, y: usize, color: [u8; 3]) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Interleaved `r, g, b` samples.
    #[must_use]
    pub fn as_interleaved(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }
}
