//! In-memory multi-channel image stacks.

use crate::display::{CalibrationBar, DisplayRange, Lut};
use crate::{Error, Result};
use ndarray::{s, Array2, Array4, ArrayView2, ArrayViewMut2, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sample type the stack was decoded from (or converted to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitDepth {
    U8,
    U16,
    F32,
}

impl BitDepth {
    /// Largest representable value for integer depths, 1.0 for float.
    #[must_use]
    pub fn max_value(self) -> f32 {
        match self {
            BitDepth::U8 => 255.0,
            BitDepth::U16 => 65535.0,
            BitDepth::F32 => 1.0,
        }
    }
}

/// Rectangular selection in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// A multi-channel, multi-slice pixel buffer with its display state.
///
/// Pixels are stored as `f32` in `(channel, slice, y, x)` order regardless of
/// the source depth; [`BitDepth`] records what the samples represent.
#[derive(Debug, Clone)]
pub struct ImageStack {
    title: String,
    data: Array4<f32>,
    bit_depth: BitDepth,
    lut: Lut,
    inverted_lut: bool,
    display_range: Option<DisplayRange>,
    roi: Option<Roi>,
    overlay: Option<CalibrationBar>,
}

impl ImageStack {
    /// Creates a stack from a `(channel, slice, y, x)` array.
    ///
    /// # Errors
    /// Returns an error if any dimension is zero.
    pub fn new(title: impl Into<String>, data: Array4<f32>, bit_depth: BitDepth) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Processing(format!(
                "image stack must not be empty, got shape {:?}",
                data.shape()
            )));
        }
        Ok(Self {
            title: title.into(),
            data,
            bit_depth,
            lut: Lut::Grays,
            inverted_lut: false,
            display_range: None,
            roi: None,
            overlay: None,
        })
    }

    /// Creates a single-channel, single-slice stack from one plane.
    ///
    /// # Errors
    /// Returns an error if the plane is empty.
    pub fn from_plane(
        title: impl Into<String>,
        plane: Array2<f32>,
        bit_depth: BitDepth,
    ) -> Result<Self> {
        let (h, w) = plane.dim();
        let data = plane
            .into_shape_with_order((1, 1, h, w))
            .map_err(|e| Error::Processing(e.to_string()))?;
        Self::new(title, data, bit_depth)
    }

    /// Creates a stack whose channels are the given planes (one slice each).
    ///
    /// # Errors
    /// Returns an error if there are no planes or their shapes differ.
    pub fn from_channels(
        title: impl Into<String>,
        planes: &[Array2<f32>],
        bit_depth: BitDepth,
    ) -> Result<Self> {
        let first = planes
            .first()
            .ok_or_else(|| Error::Processing("no channel planes given".into()))?;
        let (h, w) = first.dim();
        let mut data = Array4::<f32>::zeros((planes.len(), 1, h, w));
        for (c, plane) in planes.iter().enumerate() {
            if plane.dim() != (h, w) {
                return Err(Error::Processing(format!(
                    "channel {} has shape {:?}, expected {:?}",
                    c + 1,
                    plane.dim(),
                    (h, w)
                )));
            }
            data.slice_mut(s![c, 0, .., ..]).assign(plane);
        }
        Self::new(title, data, bit_depth)
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    #[must_use]
    pub fn slices(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// Returns the raw `(channel, slice, y, x)` array.
    #[must_use]
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array4<f32> {
        &mut self.data
    }

    /// Returns one plane. `channel` and `slice` are zero-based.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    #[must_use]
    pub fn plane(&self, channel: usize, slice: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![channel, slice, .., ..])
    }

    /// Returns one plane mutably. `channel` and `slice` are zero-based.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn plane_mut(&mut self, channel: usize, slice: usize) -> ArrayViewMut2<'_, f32> {
        self.data.slice_mut(s![channel, slice, .., ..])
    }

    /// Checks a 1-based channel number against this stack.
    ///
    /// # Errors
    /// Returns an error when the channel does not exist.
    pub fn check_channel(&self, channel: usize) -> Result<usize> {
        if channel == 0 || channel > self.channels() {
            return Err(Error::Processing(format!(
                "channel {channel} requested but '{}' has {} channel(s)",
                self.title,
                self.channels()
            )));
        }
        Ok(channel - 1)
    }

    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn set_bit_depth(&mut self, bit_depth: BitDepth) {
        self.bit_depth = bit_depth;
    }

    #[must_use]
    pub fn lut(&self) -> Lut {
        self.lut
    }

    pub fn set_lut(&mut self, lut: Lut) {
        self.lut = lut;
    }

    #[must_use]
    pub fn is_inverted_lut(&self) -> bool {
        self.inverted_lut
    }

    pub fn set_inverted_lut(&mut self, inverted: bool) {
        self.inverted_lut = inverted;
    }

    #[must_use]
    pub fn display_range(&self) -> Option<DisplayRange> {
        self.display_range
    }

    pub fn set_display_range(&mut self, range: DisplayRange) {
        self.display_range = Some(range);
    }

    #[must_use]
    pub fn roi(&self) -> Option<Roi> {
        self.roi
    }

    pub fn set_roi(&mut self, roi: Option<Roi>) {
        self.roi = roi;
    }

    #[must_use]
    pub fn overlay(&self) -> Option<&CalibrationBar> {
        self.overlay.as_ref()
    }

    pub fn set_overlay(&mut self, bar: CalibrationBar) {
        self.overlay = Some(bar);
    }

    /// Minimum and maximum over finite pixels, `None` if there are none.
    #[must_use]
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
