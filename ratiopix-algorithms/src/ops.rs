//! Native [`PixelOps`] backend over [`ImageStack`].

use crate::{align, background, filters, render, threshold};
use ndarray::{Array2, Array4, Zip};
use ratiopix_core::{
    AutoThresholdMethod, BitDepth, CalibrationBar, DisplayRange, Error, ImageStack, Lut, PixelOps,
    Result, RgbImage, ThresholdPair,
};

/// Pixel operations implemented directly on `ndarray`, parallelized with rayon.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeOps;

impl NativeOps {
    /// Creates the native backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::Processing(format!("{name} must be positive, got {value}")))
    }
}

/// Replaces every plane of `stack` with `f(plane)`.
fn map_planes(stack: &mut ImageStack, f: impl Fn(&Array2<f32>) -> Array2<f32>) {
    for c in 0..stack.channels() {
        for z in 0..stack.slices() {
            let plane = stack.plane(c, z).to_owned();
            let out = f(&plane);
            stack.plane_mut(c, z).assign(&out);
        }
    }
}

fn pixelwise(
    a: &ImageStack,
    b: &ImageStack,
    op: fn(f32, f32) -> f32,
    title: String,
) -> Result<ImageStack> {
    if a.data().shape() != b.data().shape() {
        return Err(Error::Processing(format!(
            "cannot combine '{}' {:?} with '{}' {:?}",
            a.title(),
            a.data().shape(),
            b.title(),
            b.data().shape()
        )));
    }
    let data: Array4<f32> = Zip::from(a.data())
        .and(b.data())
        .par_map_collect(|&x, &y| op(x, y));
    ImageStack::new(title, data, BitDepth::F32)
}

impl PixelOps for NativeOps {
    type Stack = ImageStack;

    fn set_title(&self, stack: &mut ImageStack, title: &str) {
        stack.set_title(title);
    }

    fn align_channels(&self, stack: &mut ImageStack, max_shift: usize) -> Result<()> {
        if stack.channels() < 2 {
            return Ok(());
        }
        let reference = stack.plane(0, 0).to_owned();
        for c in 1..stack.channels() {
            let (dy, dx) = align::estimate_shift(reference.view(), stack.plane(c, 0), max_shift);
            log::debug!("Channel {} of '{}' shifted by ({dy}, {dx})", c + 1, stack.title());
            if (dy, dx) == (0, 0) {
                continue;
            }
            for z in 0..stack.slices() {
                let moved = align::translate(stack.plane(c, z), dy, dx);
                stack.plane_mut(c, z).assign(&moved);
            }
        }
        Ok(())
    }

    fn to_float(&self, stack: &mut ImageStack) -> Result<()> {
        stack.set_bit_depth(BitDepth::F32);
        Ok(())
    }

    fn gaussian_blur(&self, stack: &mut ImageStack, sigma: f64) -> Result<()> {
        require_positive("blur sigma", sigma)?;
        map_planes(stack, |plane| filters::gaussian_blur(plane.view(), sigma));
        Ok(())
    }

    fn duplicate_channel(&self, stack: &ImageStack, channel: usize) -> Result<ImageStack> {
        let index = stack.check_channel(channel)?;
        let mut copy = ImageStack::from_plane(
            format!("C{channel}-{}", stack.title()),
            stack.plane(index, 0).to_owned(),
            stack.bit_depth(),
        )?;
        copy.set_lut(stack.lut());
        Ok(copy)
    }

    fn subtract_background(&self, stack: &mut ImageStack, radius: f64) -> Result<()> {
        require_positive("rolling ball radius", radius)?;
        map_planes(stack, |plane| {
            let mut out = plane.clone();
            background::subtract_background(&mut out, radius);
            out
        });
        Ok(())
    }

    fn laplacian(&self, stack: &ImageStack, smoothing: f64) -> Result<ImageStack> {
        require_positive("laplacian smoothing", smoothing)?;
        let mut edges = stack.clone();
        map_planes(&mut edges, |plane| {
            filters::laplacian_of_gaussian(plane.view(), smoothing)
        });
        edges.set_bit_depth(BitDepth::F32);
        edges.set_title(format!("{} Laplacian", stack.title()));
        Ok(edges)
    }

    fn auto_threshold(
        &self,
        stack: &ImageStack,
        method: AutoThresholdMethod,
        dark_background: bool,
    ) -> Result<ThresholdPair> {
        threshold::auto_threshold(stack.data().iter(), method, dark_background).ok_or_else(|| {
            Error::Processing(format!("'{}' has no finite pixels to threshold", stack.title()))
        })
    }

    fn convert_to_mask(
        &self,
        stack: &mut ImageStack,
        pair: ThresholdPair,
        black_background: bool,
    ) -> Result<()> {
        stack.data_mut().par_mapv_inplace(|v| {
            if pair.contains(f64::from(v)) {
                255.0
            } else {
                0.0
            }
        });
        stack.set_bit_depth(BitDepth::U8);
        stack.set_inverted_lut(!black_background);
        stack.set_display_range(DisplayRange::new(0.0, 255.0));
        Ok(())
    }

    fn is_inverted_lut(&self, stack: &ImageStack) -> bool {
        stack.is_inverted_lut()
    }

    fn invert_lut(&self, stack: &mut ImageStack) {
        let inverted = stack.is_inverted_lut();
        stack.set_inverted_lut(!inverted);
    }

    fn nan_background(&self, stack: &mut ImageStack, pair: ThresholdPair) -> Result<()> {
        if stack.bit_depth() != BitDepth::F32 {
            return Err(Error::Processing(format!(
                "NaN background needs a 32-bit float image, '{}' is {:?}",
                stack.title(),
                stack.bit_depth()
            )));
        }
        stack.data_mut().par_mapv_inplace(|v| {
            if pair.contains(f64::from(v)) {
                v
            } else {
                f32::NAN
            }
        });
        Ok(())
    }

    fn divide_scalar(&self, stack: &mut ImageStack, value: f32) -> Result<()> {
        if value == 0.0 {
            return Err(Error::Processing("division by zero".into()));
        }
        stack.data_mut().par_mapv_inplace(|v| v / value);
        Ok(())
    }

    fn divide(&self, a: &ImageStack, b: &ImageStack) -> Result<ImageStack> {
        pixelwise(a, b, |x, y| x / y, format!("Result of {}", a.title()))
    }

    fn multiply(&self, a: &ImageStack, b: &ImageStack) -> Result<ImageStack> {
        pixelwise(a, b, |x, y| x * y, format!("Result of {}", a.title()))
    }

    fn apply_lut(&self, stack: &mut ImageStack, lut: Lut) {
        stack.set_lut(lut);
        stack.set_inverted_lut(false);
    }

    fn select_none(&self, stack: &mut ImageStack) {
        stack.set_roi(None);
    }

    fn set_display_range(&self, stack: &mut ImageStack, range: DisplayRange) {
        stack.set_display_range(range);
    }

    fn add_calibration_bar(&self, stack: &mut ImageStack, bar: &CalibrationBar) -> Result<()> {
        if stack.display_range().is_none() {
            return Err(Error::Processing(format!(
                "cannot add a calibration bar to '{}' without a display range",
                stack.title()
            )));
        }
        stack.set_overlay(bar.clone());
        Ok(())
    }

    fn value_range(&self, stack: &ImageStack) -> Option<(f32, f32)> {
        stack.finite_range()
    }

    fn flatten(&self, stack: &ImageStack) -> Result<RgbImage> {
        render::flatten(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn two_channel(a: f32, b: f32) -> ImageStack {
        ImageStack::from_channels(
            "pair",
            &[Array2::from_elem((8, 8), a), Array2::from_elem((8, 8), b)],
            BitDepth::U16,
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_channel_copies_one_plane() {
        let ops = NativeOps::new();
        let stack = two_channel(4.0, 2.0);
        let c2 = ops.duplicate_channel(&stack, 2).unwrap();
        assert_eq!(c2.channels(), 1);
        assert_eq!(c2.title(), "C2-pair");
        assert_relative_eq!(c2.plane(0, 0)[[3, 3]], 2.0);
        assert!(ops.duplicate_channel(&stack, 3).is_err());
    }

    #[test]
    fn test_mask_then_nan_background() {
        let ops = NativeOps::new();
        let mut plane = Array2::<f32>::zeros((4, 4));
        plane[[1, 1]] = 9.0;
        let mut stack = ImageStack::from_plane("edges", plane, BitDepth::F32).unwrap();

        ops.convert_to_mask(&mut stack, ThresholdPair::new(5.0, 10.0), false)
            .unwrap();
        assert!(ops.is_inverted_lut(&stack));
        assert_eq!(stack.bit_depth(), BitDepth::U8);
        assert_relative_eq!(stack.plane(0, 0)[[1, 1]], 255.0);

        assert!(ops.nan_background(&mut stack, ThresholdPair::new(128.0, 255.0)).is_err());
        ops.to_float(&mut stack).unwrap();
        ops.nan_background(&mut stack, ThresholdPair::new(128.0, 255.0))
            .unwrap();
        ops.divide_scalar(&mut stack, 255.0).unwrap();
        assert_relative_eq!(stack.plane(0, 0)[[1, 1]], 1.0);
        assert!(stack.plane(0, 0)[[0, 0]].is_nan());
    }

    #[test]
    fn test_divide_rejects_shape_mismatch() {
        let ops = NativeOps::new();
        let a = ImageStack::from_plane("a", Array2::<f32>::ones((4, 4)), BitDepth::F32).unwrap();
        let b = ImageStack::from_plane("b", Array2::<f32>::ones((4, 5)), BitDepth::F32).unwrap();
        assert!(ops.divide(&a, &b).is_err());
        assert!(ops.multiply(&a, &b).is_err());
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let ops = NativeOps::new();
        let mut stack = two_channel(1.0, 1.0);
        assert!(ops.gaussian_blur(&mut stack, 0.0).is_err());
        assert!(ops.subtract_background(&mut stack, -1.0).is_err());
        assert!(ops.laplacian(&stack, f64::NAN).is_err());
        assert!(ops.divide_scalar(&mut stack, 0.0).is_err());
        assert!(ops
            .add_calibration_bar(&mut stack, &CalibrationBar::default())
            .is_err());
    }

    #[test]
    fn test_align_moves_second_channel_onto_first() {
        let ops = NativeOps::new();
        let spot = |cy: f32, cx: f32| {
            Array2::from_shape_fn((64, 64), |(y, x)| {
                let d = (y as f32 - cy).powi(2) + (x as f32 - cx).powi(2);
                100.0 * (-d / 40.0).exp()
            })
        };
        let mut stack =
            ImageStack::from_channels("drift", &[spot(30.0, 30.0), spot(33.0, 28.0)], BitDepth::U16)
                .unwrap();
        ops.align_channels(&mut stack, 8).unwrap();
        assert!(stack.plane(1, 0)[[30, 30]] > 99.0);
    }
}
