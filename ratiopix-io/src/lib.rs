//! ratiopix-io: File discovery and TIFF I/O for ratiopix.
//!
//! This crate lists input files with walkdir and reads and writes
//! multi-series TIFF files with the `tiff` crate. [`TiffReader`] and
//! [`TiffExporter`] implement the metadata, decoder and encoder traits of
//! `ratiopix-core`.
//!

mod enumerator;
mod error;
pub mod tiff_series;
mod writer;

pub use enumerator::find_files;
pub use error::{Error, Result};
pub use tiff_series::{ImageJShape, PageInfo, TiffLayout, TiffReader, TiffSeries};
pub use writer::{imagej_description, write_float_tiff, write_rgb_tiff, TiffExporter};
