//! TIFF writers for ratio images.

use crate::{Error, Result};
use ratiopix_core::{ImageEncoder, ImageStack, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// ImageJ description carrying the display range and LUT of `stack`, so
/// Fiji reopens the ratio with the same calibration.
#[must_use]
pub fn imagej_description(stack: &ImageStack) -> String {
    let mut text = String::from("ImageJ=1.54f\nimages=1\n");
    if let Some(range) = stack.display_range() {
        text.push_str(&format!("min={}\nmax={}\n", range.min, range.max));
    }
    text.push_str(&format!("lut={}\n", stack.lut()));
    text
}

fn create(path: &Path) -> Result<TiffEncoder<BufWriter<File>>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(TiffEncoder::new(BufWriter::new(file))?)
}

/// Writes a single-plane stack as an uncompressed 32-bit float TIFF.
///
/// # Errors
/// Returns an error if the stack has more than one plane or on any write
/// failure.
#[allow(clippy::cast_possible_truncation)]
pub fn write_float_tiff(stack: &ImageStack, path: &Path) -> Result<()> {
    if stack.channels() * stack.slices() != 1 {
        return Err(Error::InvalidFormat(format!(
            "'{}' has {} planes, expected one",
            stack.title(),
            stack.channels() * stack.slices()
        )));
    }
    let samples: Vec<f32> = stack.plane(0, 0).iter().copied().collect();
    let description = imagej_description(stack);

    let mut encoder = create(path)?;
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(stack.width() as u32, stack.height() as u32)?;
    image
        .encoder()
        .write_tag(Tag::ImageDescription, description.as_str())?;
    image.write_data(&samples)?;
    Ok(())
}

/// Writes an 8-bit RGB rendering as an uncompressed TIFF.
///
/// # Errors
/// Returns an error on any write failure.
#[allow(clippy::cast_possible_truncation)]
pub fn write_rgb_tiff(image: &RgbImage, path: &Path) -> Result<()> {
    let mut encoder = create(path)?;
    encoder.write_image::<colortype::RGB8>(
        image.width as u32,
        image.height as u32,
        &image.as_interleaved(),
    )?;
    Ok(())
}

/// [`ImageEncoder`] writing TIFF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffExporter;

impl TiffExporter {
    /// Creates a TIFF exporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImageEncoder for TiffExporter {
    type Stack = ImageStack;

    fn write_image(&self, stack: &ImageStack, path: &Path) -> ratiopix_core::Result<()> {
        write_float_tiff(stack, path).map_err(|e| ratiopix_core::Error::export(path, e))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    fn write_rgb(&self, image: &RgbImage, path: &Path) -> ratiopix_core::Result<()> {
        write_rgb_tiff(image, path).map_err(|e| ratiopix_core::Error::export(path, e))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}
