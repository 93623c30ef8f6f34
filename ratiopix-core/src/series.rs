//! Input files and their series index tables.

use crate::ops::MetadataService;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Computes the absolute index of every series from per-series resolution
/// counts.
///
/// Series 0 maps to 0; series `i` maps to the previous offset plus the
/// resolution count of series `i - 1`, so every index addresses the full
/// resolution level.
#[must_use]
pub fn absolute_series_indices(resolution_counts: &[usize]) -> Vec<usize> {
    let mut offset = 0usize;
    let mut indices = Vec::with_capacity(resolution_counts.len());
    for (i, _) in resolution_counts.iter().enumerate() {
        if i > 0 {
            offset += resolution_counts[i - 1];
        }
        indices.push(offset);
    }
    indices
}

/// Queries `metadata` for the series layout of `path`.
///
/// # Errors
/// Propagates the metadata service error, which aborts the file.
pub fn inspect_series<M>(metadata: &M, path: &Path) -> Result<Vec<usize>>
where
    M: MetadataService + ?Sized,
{
    let count = metadata.series_count(path)?;
    let mut resolutions = Vec::with_capacity(count);
    // The last series' resolution count never shifts an offset.
    for series in 0..count.saturating_sub(1) {
        resolutions.push(metadata.resolution_count(path, series)?);
    }
    if count > 0 {
        resolutions.push(1);
    }
    Ok(absolute_series_indices(&resolutions))
}

/// A discovered input file with its resolved series table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    path: PathBuf,
    directory: PathBuf,
    base_name: String,
    series_indices: Vec<usize>,
}

impl InputFile {
    /// Builds the record for `path` with an already resolved series table.
    ///
    /// # Errors
    /// Returns a filesystem error if `path` has no file name.
    pub fn new(path: impl Into<PathBuf>, series_indices: Vec<usize>) -> Result<Self> {
        let path = path.into();
        let base_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::filesystem(&path, "path has no usable file name"))?
            .to_string();
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            path,
            directory,
            base_name,
            series_indices,
        })
    }

    /// Inspects `path` through `metadata` and builds the record.
    ///
    /// # Errors
    /// Returns the metadata error if the file cannot be parsed.
    pub fn inspect<M>(path: impl Into<PathBuf>, metadata: &M) -> Result<Self>
    where
        M: MetadataService + ?Sized,
    {
        let path = path.into();
        let indices = inspect_series(metadata, &path)?;
        Self::new(path, indices)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name with its final extension stripped.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series_indices.len()
    }

    /// Absolute index of series `series` (zero-based), if it exists.
    #[must_use]
    pub fn absolute_index(&self, series: usize) -> Option<usize> {
        self.series_indices.get(series).copied()
    }

    #[must_use]
    pub fn series_indices(&self) -> &[usize] {
        &self.series_indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pyramid(Vec<usize>);

    impl MetadataService for Pyramid {
        fn series_count(&self, _path: &Path) -> Result<usize> {
            Ok(self.0.len())
        }

        fn resolution_count(&self, _path: &Path, series: usize) -> Result<usize> {
            self.0
                .get(series)
                .copied()
                .ok_or_else(|| Error::metadata("pyramid", "series out of range"))
        }
    }

    #[test]
    fn test_flat_file_indices_are_sequential() {
        assert_eq!(absolute_series_indices(&[1, 1, 1]), vec![0, 1, 2]);
    }

    #[test]
    fn test_pyramid_offsets_skip_reduced_levels() {
        assert_eq!(absolute_series_indices(&[3, 1, 4, 2]), vec![0, 3, 4, 8]);
    }

    #[test]
    fn test_inspect_through_metadata_service() {
        let meta = Pyramid(vec![2, 5, 1]);
        let file = InputFile::inspect("/data/run1/plate.nd2", &meta).unwrap();
        assert_eq!(file.series_count(), 3);
        assert_eq!(file.series_indices(), &[0, 2, 7]);
        assert_eq!(file.base_name(), "plate");
        assert_eq!(file.directory(), Path::new("/data/run1"));
        assert_eq!(file.absolute_index(3), None);
    }

    #[test]
    fn test_empty_file_has_no_series() {
        let meta = Pyramid(Vec::new());
        let indices = inspect_series(&meta, Path::new("empty.tif")).unwrap();
        assert!(indices.is_empty());
    }
}
