//! Rolling-ball background estimation.
//!
//! The background is the grey-level opening of the image with a ball of the
//! given radius. Large radii are handled on a shrunken copy (block minimum)
//! and the result is interpolated back, as ImageJ does.

use ndarray::{Array2, ArrayView2, Zip};

/// Shrink factor used for a given ball radius.
#[must_use]
pub fn shrink_factor(radius: f64) -> usize {
    if radius <= 10.0 {
        1
    } else if radius <= 30.0 {
        2
    } else if radius <= 100.0 {
        4
    } else {
        8
    }
}

/// Offsets and cap heights of a ball structuring element.
struct Ball {
    offsets: Vec<(isize, isize, f32)>,
}

impl Ball {
    #[allow(clippy::cast_possible_truncation)]
    fn new(radius: f64) -> Self {
        let r = radius.max(1.0);
        let extent = r.floor() as isize;
        let mut offsets = Vec::new();
        for dy in -extent..=extent {
            for dx in -extent..=extent {
                #[allow(clippy::cast_precision_loss)]
                let d2 = (dy * dy + dx * dx) as f64;
                if d2 <= r * r {
                    offsets.push((dy, dx, (r * r - d2).sqrt() as f32));
                }
            }
        }
        Self { offsets }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn neighbour(y: usize, x: usize, dy: isize, dx: isize, h: usize, w: usize) -> Option<(usize, usize)> {
    let ny = y as isize + dy;
    let nx = x as isize + dx;
    (ny >= 0 && nx >= 0 && (ny as usize) < h && (nx as usize) < w).then(|| (ny as usize, nx as usize))
}

fn erode(plane: &Array2<f32>, ball: &Ball) -> Array2<f32> {
    let (h, w) = plane.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        let mut best = f32::INFINITY;
        for &(dy, dx, z) in &ball.offsets {
            if let Some(p) = neighbour(y, x, dy, dx, h, w) {
                best = best.min(plane[p] - z);
            }
        }
        *o = best;
    });
    out
}

fn dilate(plane: &Array2<f32>, ball: &Ball) -> Array2<f32> {
    let (h, w) = plane.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        let mut best = f32::NEG_INFINITY;
        for &(dy, dx, z) in &ball.offsets {
            if let Some(p) = neighbour(y, x, -dy, -dx, h, w) {
                best = best.max(plane[p] + z);
            }
        }
        *o = best;
    });
    out
}

fn shrink(plane: ArrayView2<f32>, factor: usize) -> Array2<f32> {
    let (h, w) = plane.dim();
    let sh = h.div_ceil(factor);
    let sw = w.div_ceil(factor);
    Array2::from_shape_fn((sh, sw), |(y, x)| {
        let y0 = y * factor;
        let x0 = x * factor;
        plane
            .slice(ndarray::s![y0..(y0 + factor).min(h), x0..(x0 + factor).min(w)])
            .iter()
            .copied()
            .fold(f32::INFINITY, f32::min)
    })
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn enlarge(small: &Array2<f32>, factor: usize, h: usize, w: usize) -> Array2<f32> {
    let (sh, sw) = small.dim();
    let f = factor as f64;
    let locate = |v: usize, len: usize| -> (usize, usize, f32) {
        let pos = ((v as f64 + 0.5) / f - 0.5).clamp(0.0, (len - 1) as f64);
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(len - 1);
        (lo, hi, (pos - lo as f64) as f32)
    };
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (y0, y1, fy) = locate(y, sh);
        let (x0, x1, fx) = locate(x, sw);
        let top = small[[y0, x0]] * (1.0 - fx) + small[[y0, x1]] * fx;
        let bottom = small[[y1, x0]] * (1.0 - fx) + small[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Estimates the rolling-ball background of `plane`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_ball_background(plane: ArrayView2<f32>, radius: f64) -> Array2<f32> {
    let (h, w) = plane.dim();
    let factor = shrink_factor(radius);
    let ball = Ball::new(radius / factor as f64);

    if factor == 1 {
        let owned = plane.to_owned();
        return dilate(&erode(&owned, &ball), &ball);
    }
    let small = shrink(plane, factor);
    let opened = dilate(&erode(&small, &ball), &ball);
    enlarge(&opened, factor, h, w)
}

/// Subtracts the rolling-ball background from `plane` in place.
pub fn subtract_background(plane: &mut Array2<f32>, radius: f64) {
    let background = rolling_ball_background(plane.view(), radius);
    *plane -= &background;
}
