//! Multi-series TIFF reading.
//!
//! A TIFF file is a flat list of pages (IFDs). They are grouped into
//! series as follows:
//! - a page with the reduced-resolution bit of `NewSubfileType` set is an
//!   extra resolution level of the current series;
//! - a full-resolution page starts a new series after a reduced page, when
//!   its dimensions change, or when the current series already holds the
//!   `channels * slices * frames` pages announced by its ImageJ description.
//!
//! Addressable units are numbered series by series, base level first and
//! then the reduced levels, so the absolute index of a series is the sum of
//! the resolution counts of the series before it.

use crate::{Error, Result};
use ndarray::Array2;
use ratiopix_core::{BitDepth, ImageStack, MetadataService, SeriesDecoder};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

/// `NewSubfileType` bit marking a reduced-resolution page.
const REDUCED_RESOLUTION: u32 = 1;

/// What the grouping needs to know about one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// IFD index in the file.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub reduced: bool,
    pub description: Option<String>,
}

/// Hyperstack dimensions announced by an ImageJ description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageJShape {
    pub channels: usize,
    pub slices: usize,
    pub frames: usize,
}

impl ImageJShape {
    /// Parses `key=value` lines of an ImageJ description.
    ///
    /// Returns `None` unless the text declares `channels`, `slices` or
    /// `frames`.
    #[must_use]
    pub fn parse(description: &str) -> Option<Self> {
        let mut shape = Self {
            channels: 1,
            slices: 1,
            frames: 1,
        };
        let mut found = false;
        for line in description.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<usize>() else {
                continue;
            };
            match key.trim() {
                "channels" => shape.channels = value.max(1),
                "slices" => shape.slices = value.max(1),
                "frames" => shape.frames = value.max(1),
                _ => continue,
            }
            found = true;
        }
        found.then_some(shape)
    }

    /// Number of pages one series occupies, `None` if the product overflows.
    #[must_use]
    pub fn planes(&self) -> Option<usize> {
        self.channels
            .checked_mul(self.slices)?
            .checked_mul(self.frames)
    }
}

/// One series: its base pages and its reduced-resolution pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiffSeries {
    /// IFD indices of the full-resolution planes, in file order.
    pub pages: Vec<usize>,
    /// IFD indices of the reduced-resolution levels.
    pub levels: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub shape: Option<ImageJShape>,
}

impl TiffSeries {
    fn start(page: &PageInfo) -> Result<Self> {
        let shape = page.description.as_deref().and_then(ImageJShape::parse);
        if let Some(s) = shape.filter(|s| s.planes().is_none()) {
            return Err(Error::InvalidFormat(format!(
                "page {}: ImageJ shape {}x{}x{} is too large",
                page.index, s.channels, s.slices, s.frames
            )));
        }
        Ok(Self {
            pages: vec![page.index],
            levels: Vec::new(),
            width: page.width,
            height: page.height,
            shape,
        })
    }

    fn is_full(&self) -> bool {
        self.shape
            .and_then(|s| s.planes())
            .is_some_and(|planes| self.pages.len() >= planes)
    }

    /// Number of resolution levels, base included.
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        1 + self.levels.len()
    }
}

/// The series table of one TIFF file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TiffLayout {
    series: Vec<TiffSeries>,
}

impl TiffLayout {
    /// Groups pages into series.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if a page announces an ImageJ shape
    /// whose plane count does not fit in `usize`.
    pub fn from_pages(pages: &[PageInfo]) -> Result<Self> {
        let mut series: Vec<TiffSeries> = Vec::new();
        let mut after_reduced = false;
        for page in pages {
            if page.reduced {
                if let Some(current) = series.last_mut() {
                    current.levels.push(page.index);
                    after_reduced = true;
                    continue;
                }
            }
            let extend = series.last().is_some_and(|current| {
                !after_reduced
                    && !current.is_full()
                    && (current.width, current.height) == (page.width, page.height)
            });
            match series.last_mut() {
                Some(current) if extend => current.pages.push(page.index),
                _ => series.push(TiffSeries::start(page)?),
            }
            after_reduced = false;
        }
        Ok(Self { series })
    }

    /// Reads the page headers of `path` and groups them.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its IFDs are corrupt.
    pub fn read(path: &Path) -> Result<Self> {
        let mut decoder = open(path)?;
        let mut pages = Vec::new();
        loop {
            pages.push(page_info(&mut decoder, pages.len())?);
            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
        }
        Self::from_pages(&pages)
    }

    #[must_use]
    pub fn series(&self) -> &[TiffSeries] {
        &self.series
    }

    /// Finds the series whose base level has the given absolute index.
    #[must_use]
    pub fn resolve(&self, absolute_index: usize) -> Option<&TiffSeries> {
        let mut offset = 0;
        for series in &self.series {
            if offset == absolute_index {
                return Some(series);
            }
            offset += series.resolution_count();
        }
        None
    }
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?)
}

fn page_info<R: Read + Seek>(decoder: &mut Decoder<R>, index: usize) -> Result<PageInfo> {
    let (width, height) = decoder.dimensions()?;
    let subfile = decoder
        .find_tag(Tag::NewSubfileType)?
        .map(|value| value.into_u32())
        .transpose()?
        .unwrap_or(0);
    let description = decoder
        .find_tag(Tag::ImageDescription)?
        .and_then(|value| value.into_string().ok());
    Ok(PageInfo {
        index,
        width,
        height,
        reduced: subfile & REDUCED_RESOLUTION != 0,
        description,
    })
}

fn samples_per_pixel(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        other => Err(Error::InvalidFormat(format!(
            "unsupported color type {other:?}"
        ))),
    }
}

/// Decoded samples of one page as `f32` plus the depth they came from.
#[allow(clippy::cast_precision_loss)]
fn decode_samples(result: DecodingResult) -> Result<(Vec<f32>, BitDepth)> {
    Ok(match result {
        DecodingResult::U8(buf) => (buf.into_iter().map(f32::from).collect(), BitDepth::U8),
        DecodingResult::U16(buf) => (buf.into_iter().map(f32::from).collect(), BitDepth::U16),
        DecodingResult::U32(buf) => (buf.into_iter().map(|v| v as f32).collect(), BitDepth::F32),
        DecodingResult::I8(buf) => (buf.into_iter().map(f32::from).collect(), BitDepth::F32),
        DecodingResult::I16(buf) => (buf.into_iter().map(f32::from).collect(), BitDepth::F32),
        DecodingResult::F32(buf) => (buf, BitDepth::F32),
        #[allow(clippy::cast_possible_truncation)]
        DecodingResult::F64(buf) => (buf.into_iter().map(|v| v as f32).collect(), BitDepth::F32),
        _ => {
            return Err(Error::InvalidFormat(
                "unsupported sample format".to_string(),
            ))
        }
    })
}

/// Decodes the current page into one plane per sample.
fn read_planes<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<(Vec<Array2<f32>>, BitDepth)> {
    let (width, height) = decoder.dimensions()?;
    let (w, h) = (width as usize, height as usize);
    let samples = samples_per_pixel(decoder.colortype()?)?;
    let (values, depth) = decode_samples(decoder.read_image()?)?;
    if values.len() != w * h * samples {
        return Err(Error::InvalidFormat(format!(
            "page holds {} samples, expected {}x{}x{samples}",
            values.len(),
            w,
            h
        )));
    }
    let planes = (0..samples)
        .map(|s| Array2::from_shape_fn((h, w), |(y, x)| values[(y * w + x) * samples + s]))
        .collect();
    Ok((planes, depth))
}

/// Decodes every base page of `series` into a composite stack.
///
/// With an ImageJ shape, planes are ordered channel fastest; otherwise each
/// page (and each sample of a multi-sample page) becomes its own channel.
fn load_series(path: &Path, series: &TiffSeries, title: &str) -> Result<ImageStack> {
    let mut decoder = open(path)?;
    let mut planes = Vec::new();
    let mut depth = BitDepth::U8;
    for &page in &series.pages {
        decoder.seek_to_image(page)?;
        let (page_planes, page_depth) = read_planes(&mut decoder)?;
        if page_depth != BitDepth::U8 && depth != BitDepth::F32 {
            depth = page_depth;
        }
        planes.extend(page_planes);
    }

    let (channels, slices) = match series.shape {
        Some(shape) if shape.planes() == Some(planes.len()) => {
            (shape.channels, shape.slices * shape.frames)
        }
        Some(shape) => {
            log::warn!(
                "{}: ImageJ shape {}x{}x{} does not match the {} planes of the series; reading pages as channels",
                path.display(),
                shape.channels,
                shape.slices,
                shape.frames,
                planes.len()
            );
            (planes.len(), 1)
        }
        None => (planes.len(), 1),
    };

    let (h, w) = (series.height as usize, series.width as usize);
    let mut data = ndarray::Array4::<f32>::zeros((channels, slices, h, w));
    for (i, plane) in planes.iter().enumerate() {
        data.slice_mut(ndarray::s![i % channels, i / channels, .., ..])
            .assign(plane);
    }
    ImageStack::new(title, data, depth).map_err(Error::from)
}

/// Reads multi-series TIFF files.
///
/// Implements both [`MetadataService`] and [`SeriesDecoder`]. The layout of
/// the most recently inspected file is kept so that inspection followed by
/// loading parses the IFDs once.
#[derive(Debug, Default)]
pub struct TiffReader {
    cache: RefCell<Option<(PathBuf, Rc<TiffLayout>)>>,
}

impl TiffReader {
    /// Creates a reader with an empty layout cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the series layout of `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed.
    pub fn layout(&self, path: &Path) -> Result<Rc<TiffLayout>> {
        if let Some((cached, layout)) = self.cache.borrow().as_ref() {
            if cached == path {
                return Ok(Rc::clone(layout));
            }
        }
        let layout = Rc::new(TiffLayout::read(path)?);
        log::debug!(
            "{}: {} series over {} resolution level(s)",
            path.display(),
            layout.series().len(),
            layout
                .series()
                .iter()
                .map(TiffSeries::resolution_count)
                .sum::<usize>()
        );
        *self.cache.borrow_mut() = Some((path.to_path_buf(), Rc::clone(&layout)));
        Ok(layout)
    }
}

impl MetadataService for TiffReader {
    fn series_count(&self, path: &Path) -> ratiopix_core::Result<usize> {
        let layout = self
            .layout(path)
            .map_err(|e| ratiopix_core::Error::metadata(path, e))?;
        Ok(layout.series().len())
    }

    fn resolution_count(&self, path: &Path, series: usize) -> ratiopix_core::Result<usize> {
        let layout = self
            .layout(path)
            .map_err(|e| ratiopix_core::Error::metadata(path, e))?;
        layout
            .series()
            .get(series)
            .map(TiffSeries::resolution_count)
            .ok_or_else(|| {
                ratiopix_core::Error::metadata(path, format!("no series {series}"))
            })
    }
}

impl SeriesDecoder for TiffReader {
    type Stack = ImageStack;

    fn open_series(&self, path: &Path, absolute_index: usize) -> ratiopix_core::Result<ImageStack> {
        let import = |e: Error| ratiopix_core::Error::import(path, absolute_index, e);
        let layout = self.layout(path).map_err(import)?;
        let series = layout.resolve(absolute_index).ok_or_else(|| {
            import(Error::InvalidFormat(format!(
                "index {absolute_index} does not address a series base level"
            )))
        })?;
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        load_series(path, series, &title).map_err(import)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize, size: u32, reduced: bool) -> PageInfo {
        PageInfo {
            index,
            width: size,
            height: size,
            reduced,
            description: None,
        }
    }

    #[test]
    fn test_plain_pages_form_one_series() {
        let layout = TiffLayout::from_pages(&[page(0, 64, false), page(1, 64, false)]).unwrap();
        assert_eq!(layout.series().len(), 1);
        assert_eq!(layout.series()[0].pages, vec![0, 1]);
    }

    #[test]
    fn test_pyramid_levels_and_resolve() {
        let layout = TiffLayout::from_pages(&[
            page(0, 64, false),
            page(1, 32, true),
            page(2, 16, true),
            page(3, 64, false),
            page(4, 32, true),
        ])
        .unwrap();
        assert_eq!(layout.series().len(), 2);
        assert_eq!(layout.series()[0].resolution_count(), 3);
        assert_eq!(layout.resolve(0).unwrap().pages, vec![0]);
        assert_eq!(layout.resolve(3).unwrap().pages, vec![3]);
        assert!(layout.resolve(1).is_none());
        assert!(layout.resolve(5).is_none());
    }

    #[test]
    fn test_dimension_change_starts_series() {
        let layout = TiffLayout::from_pages(&[
            page(0, 64, false),
            page(1, 64, false),
            page(2, 48, false),
        ])
        .unwrap();
        assert_eq!(layout.series().len(), 2);
        assert_eq!(layout.series()[1].pages, vec![2]);
    }

    #[test]
    fn test_imagej_shape_cuts_series() {
        let mut first = page(0, 64, false);
        first.description = Some("ImageJ=1.54f\nimages=2\nchannels=2\nmode=composite\n".into());
        let layout = TiffLayout::from_pages(&[
            first,
            page(1, 64, false),
            page(2, 64, false),
            page(3, 64, false),
        ])
        .unwrap();
        assert_eq!(layout.series().len(), 2);
        assert_eq!(layout.series()[0].pages, vec![0, 1]);
        assert_eq!(layout.series()[1].pages, vec![2, 3]);
    }

    #[test]
    fn test_imagej_shape_parse() {
        let shape = ImageJShape::parse("ImageJ=1.54f\nchannels=3\nslices=4\nunit=micron\n").unwrap();
        assert_eq!(shape.planes(), Some(12));
        assert!(ImageJShape::parse("ImageJ=1.54f\nmin=0.0\n").is_none());
    }

    #[test]
    fn test_oversized_imagej_shape_is_rejected() {
        let description = format!("ImageJ=1.54f\nchannels={}\nslices=2\n", usize::MAX);
        let shape = ImageJShape::parse(&description).unwrap();
        assert_eq!(shape.planes(), None);

        let mut first = page(0, 4, false);
        first.description = Some(description);
        let err = TiffLayout::from_pages(&[first, page(1, 4, false)]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
