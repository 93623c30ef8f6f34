//! Linear filters: separable Gaussian blur and Laplacian of Gaussian.
//!
//! Borders are handled by edge replication. Rows and columns are filtered in
//! parallel.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

/// Kernel extent in sigmas on each side of the centre.
const KERNEL_SIGMAS: f64 = 3.5;

/// Normalized 1-D Gaussian kernel of odd length.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (KERNEL_SIGMAS * sigma).ceil().max(1.0) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel.into_iter().map(|w| w as f32).collect()
}

fn convolve_line(src: ArrayView1<f32>, mut dst: ArrayViewMut1<f32>, kernel: &[f32]) {
    let n = src.len();
    let r = kernel.len() / 2;
    for i in 0..n {
        let mut acc = 0.0f32;
        for (k, w) in kernel.iter().enumerate() {
            let j = (i + k).saturating_sub(r).min(n - 1);
            acc += w * src[j];
        }
        dst[i] = acc;
    }
}

/// Convolves `plane` with `kernel` along rows, then along columns.
#[must_use]
pub fn convolve_separable(plane: ArrayView2<f32>, kernel: &[f32]) -> Array2<f32> {
    let mut horizontal = Array2::<f32>::zeros(plane.raw_dim());
    Zip::from(horizontal.rows_mut())
        .and(plane.rows())
        .par_for_each(|dst, src| convolve_line(src, dst, kernel));

    let mut out = Array2::<f32>::zeros(plane.raw_dim());
    Zip::from(out.columns_mut())
        .and(horizontal.columns())
        .par_for_each(|dst, src| convolve_line(src, dst, kernel));
    out
}

/// Gaussian blur with standard deviation `sigma` (pixels).
#[must_use]
pub fn gaussian_blur(plane: ArrayView2<f32>, sigma: f64) -> Array2<f32> {
    convolve_separable(plane, &gaussian_kernel(sigma))
}

/// Laplacian of Gaussian at scale `smoothing`.
///
/// Bright blobs give a negative response at their centre and a positive rim,
/// so object boundaries sit on the zero crossings.
#[must_use]
pub fn laplacian_of_gaussian(plane: ArrayView2<f32>, smoothing: f64) -> Array2<f32> {
    let smooth = gaussian_blur(plane, smoothing);
    let (h, w) = smooth.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    Zip::indexed(&mut out).par_for_each(|(y, x), o| {
        let c = smooth[[y, x]];
        let up = smooth[[y.saturating_sub(1), x]];
        let down = smooth[[(y + 1).min(h - 1), x]];
        let left = smooth[[y, x.saturating_sub(1)]];
        let right = smooth[[y, (x + 1).min(w - 1)]];
        *o = up + down + left + right - 4.0 * c;
    });
    out
}
