//! Channel registration by translation.
//!
//! Each plane is standardized (zero mean, unit variance) so channels with
//! different brightness can be compared, then the integer shift minimizing
//! the mean squared difference is searched coarse to fine on a 2x pyramid.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Planes are not downsampled below this size.
const MIN_PYRAMID_SIDE: usize = 32;

/// Search radius when refining a coarse estimate on the next finer level.
const REFINE_RADIUS: isize = 2;

#[allow(clippy::cast_precision_loss)]
fn standardize(plane: ArrayView2<f32>) -> Array2<f32> {
    let n = plane.len() as f32;
    let mean = plane.sum() / n;
    let var = plane.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    let std = var.sqrt().max(f32::EPSILON);
    plane.mapv(|v| (v - mean) / std)
}

fn downsample(plane: &Array2<f32>) -> Array2<f32> {
    let (h, w) = plane.dim();
    Array2::from_shape_fn((h / 2, w / 2), |(y, x)| {
        (plane[[2 * y, 2 * x]]
            + plane[[2 * y + 1, 2 * x]]
            + plane[[2 * y, 2 * x + 1]]
            + plane[[2 * y + 1, 2 * x + 1]])
            / 4.0
    })
}

/// Mean squared difference between `reference(y, x)` and
/// `moving(y - dy, x - dx)` over the overlap.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn score(reference: &Array2<f32>, moving: &Array2<f32>, dy: isize, dx: isize) -> f64 {
    let (h, w) = reference.dim();
    let (h, w) = (h as isize, w as isize);
    let y0 = dy.max(0);
    let y1 = (h + dy).min(h);
    let x0 = dx.max(0);
    let x1 = (w + dx).min(w);
    if y1 - y0 < 2 || x1 - x0 < 2 {
        return f64::INFINITY;
    }
    let mut acc = 0.0f64;
    for y in y0..y1 {
        for x in x0..x1 {
            let d = reference[[y as usize, x as usize]]
                - moving[[(y - dy) as usize, (x - dx) as usize]];
            acc += f64::from(d * d);
        }
    }
    acc / ((y1 - y0) * (x1 - x0)) as f64
}

fn best_shift(
    reference: &Array2<f32>,
    moving: &Array2<f32>,
    centre: (isize, isize),
    radius: isize,
) -> (isize, isize) {
    let candidates: Vec<(isize, isize)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (centre.0 + dy, centre.1 + dx)))
        .collect();
    let (_, dy, dx) = candidates
        .into_par_iter()
        .map(|(dy, dx)| (score(reference, moving, dy, dx), dy, dx))
        .reduce(
            || (f64::INFINITY, centre.0, centre.1),
            |a, b| {
                // Ties go to the smaller shift.
                let closer = b.1.abs() + b.2.abs() < a.1.abs() + a.2.abs();
                if b.0 < a.0 || (b.0 == a.0 && closer) {
                    b
                } else {
                    a
                }
            },
        );
    (dy, dx)
}

/// Estimates the integer shift `(dy, dx)` that maps `moving` onto
/// `reference`, searching at most `max_shift` pixels in each direction.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn estimate_shift(
    reference: ArrayView2<f32>,
    moving: ArrayView2<f32>,
    max_shift: usize,
) -> (isize, isize) {
    if max_shift == 0 {
        return (0, 0);
    }
    let mut refs = vec![standardize(reference)];
    let mut movs = vec![standardize(moving)];
    let mut reach = max_shift;
    while reach > 2 {
        let (h, w) = refs[refs.len() - 1].dim();
        if h / 2 < MIN_PYRAMID_SIDE || w / 2 < MIN_PYRAMID_SIDE {
            break;
        }
        let r = downsample(&refs[refs.len() - 1]);
        let m = downsample(&movs[movs.len() - 1]);
        refs.push(r);
        movs.push(m);
        reach = reach.div_ceil(2);
    }

    let top = refs.len() - 1;
    let mut shift = best_shift(&refs[top], &movs[top], (0, 0), reach as isize);
    for level in (0..top).rev() {
        shift = best_shift(&refs[level], &movs[level], (shift.0 * 2, shift.1 * 2), REFINE_RADIUS);
    }
    let limit = max_shift as isize;
    (shift.0.clamp(-limit, limit), shift.1.clamp(-limit, limit))
}

/// Returns `plane` translated by `(dy, dx)`: `out(y, x) = plane(y - dy, x - dx)`.
/// Uncovered pixels are zero.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn translate(plane: ArrayView2<f32>, dy: isize, dx: isize) -> Array2<f32> {
    let (h, w) = plane.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let sy = y as isize - dy;
        let sx = x as isize - dx;
        if sy >= 0 && sx >= 0 && (sy as usize) < h && (sx as usize) < w {
            plane[[sy as usize, sx as usize]]
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| {
            let (y, x) = (y as f32, x as f32);
            let a = (-((y - 30.0).powi(2) + (x - 40.0).powi(2)) / 50.0).exp();
            let b = (-((y - 80.0).powi(2) + (x - 90.0).powi(2)) / 120.0).exp();
            let c = (-((y - 70.0).powi(2) + (x - 25.0).powi(2)) / 30.0).exp();
            100.0 * a + 60.0 * b + 80.0 * c
        })
    }

    #[test]
    fn test_recovers_known_translation() {
        let reference = blobs(128, 128);
        let moving = translate(reference.view(), -5, 7);
        // Dimmer copy: registration must not depend on brightness.
        let moving = moving.mapv(|v| v * 0.3 + 2.0);
        let (dy, dx) = estimate_shift(reference.view(), moving.view(), 12);
        assert_eq!((dy, dx), (5, -7));
    }

    #[test]
    fn test_identical_planes_need_no_shift() {
        let reference = blobs(64, 64);
        assert_eq!(estimate_shift(reference.view(), reference.view(), 6), (0, 0));
        assert_eq!(estimate_shift(reference.view(), reference.view(), 0), (0, 0));
    }

    #[test]
    fn test_translate_fills_with_zero() {
        let plane = Array2::from_elem((4, 4), 1.0f32);
        let shifted = translate(plane.view(), 1, -2);
        assert!((shifted[[0, 0]]).abs() < f32::EPSILON);
        assert!((shifted[[1, 0]] - 1.0).abs() < f32::EPSILON);
        assert!((shifted[[1, 3]]).abs() < f32::EPSILON);
    }
}
