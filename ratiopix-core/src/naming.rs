//! Output file naming.

use std::path::{Path, PathBuf};

/// Suffix of ratio images.
pub const RATIO_SUFFIX: &str = "_ratio.tif";
/// Suffix of ratio images computed on aligned channels.
pub const ALIGNED_RATIO_SUFFIX: &str = "_ratio_chnlaligned.tif";
/// Suffix of flattened calibration renderings.
pub const CALIBRATION_SUFFIX: &str = "_calibration.tif";

/// Number of digits needed to print every series number of a file.
#[must_use]
pub fn series_pad_width(series_count: usize) -> usize {
    series_count.max(1).to_string().len()
}

/// Stem shared by every output of one series.
///
/// Single-series files keep the bare base name; otherwise a zero-padded
/// 1-based series tag is appended so series never overwrite each other.
#[must_use]
pub fn series_stem(base_name: &str, series: usize, series_count: usize) -> String {
    if series_count <= 1 {
        base_name.to_string()
    } else {
        let width = series_pad_width(series_count);
        format!("{base_name}_s{:0width$}", series + 1)
    }
}

/// Path of the ratio image for one series.
#[must_use]
pub fn ratio_path(out_dir: &Path, stem: &str, aligned: bool) -> PathBuf {
    let suffix = if aligned {
        ALIGNED_RATIO_SUFFIX
    } else {
        RATIO_SUFFIX
    };
    out_dir.join(format!("{stem}{suffix}"))
}

/// Path of the flattened calibration rendering for one series.
#[must_use]
pub fn calibration_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{stem}{CALIBRATION_SUFFIX}"))
}
