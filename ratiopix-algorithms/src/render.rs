//! Flattening a stack to RGB with its calibration bar burned in.

use ratiopix_core::{CalibrationBar, Corner, DisplayRange, Error, ImageStack, Lut, Result, RgbImage};

const STRIP_WIDTH: f64 = 12.0;
const STRIP_HEIGHT: f64 = 128.0;
const MARGIN: f64 = 4.0;
const TICK_LENGTH: usize = 4;

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 5;

/// 3x5 bitmaps, one row per entry, most significant of the low 3 bits on the left.
fn glyph(c: char) -> Option<[u8; GLYPH_HEIGHT]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    })
}

fn draw_text(image: &mut RgbImage, text: &str, x: usize, y: usize, scale: usize, color: [u8; 3]) {
    let advance = (GLYPH_WIDTH + 1) * scale;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let gx = x + i * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        image.put(gx + col * scale + sx, y + row * scale + sy, color);
                    }
                }
            }
        }
    }
}

fn text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * (GLYPH_WIDTH + 1) * scale
}

fn shade(lut: Lut, inverted: bool, t: f32) -> [u8; 3] {
    let rgb = lut.color(t);
    if inverted {
        rgb.map(|v| 255 - v)
    } else {
        rgb
    }
}

/// Burns `bar` into `image` for the given display range.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn draw_calibration_bar(
    image: &mut RgbImage,
    bar: &CalibrationBar,
    range: DisplayRange,
    lut: Lut,
    inverted: bool,
) {
    let zoom = bar.zoom.max(0.1);
    let strip_w = (STRIP_WIDTH * zoom).round().max(1.0) as usize;
    let strip_h = (STRIP_HEIGHT * zoom).round().max(2.0) as usize;
    let margin = (MARGIN * zoom).round() as usize;
    let scale = (bar.font_size as usize / 6).max(1);
    let glyph_h = GLYPH_HEIGHT * scale;

    let labels = bar.labels(range);
    let label_w = labels.iter().map(|l| text_width(l, scale)).max().unwrap_or(0);
    let box_w = margin + strip_w + TICK_LENGTH + 2 + label_w + margin;
    let box_h = margin + glyph_h / 2 + strip_h + glyph_h / 2 + margin;

    let (x0, y0) = match bar.location {
        Corner::UpperLeft => (0, 0),
        Corner::UpperRight => (image.width.saturating_sub(box_w), 0),
        Corner::LowerLeft => (0, image.height.saturating_sub(box_h)),
        Corner::LowerRight => (
            image.width.saturating_sub(box_w),
            image.height.saturating_sub(box_h),
        ),
    };

    let fill = bar.fill.rgb();
    for y in y0..y0 + box_h {
        for x in x0..x0 + box_w {
            image.put(x, y, fill);
        }
    }

    let strip_x = x0 + margin;
    let strip_y = y0 + margin + glyph_h / 2;
    for row in 0..strip_h {
        let t = 1.0 - row as f32 / (strip_h - 1) as f32;
        let color = shade(lut, inverted, t);
        for col in 0..strip_w {
            image.put(strip_x + col, strip_y + row, color);
        }
    }

    let ink = bar.label.rgb();
    let ticks = bar.ticks(range);
    for (value, label) in ticks.iter().zip(&labels) {
        let t = range.normalize(*value as f32).clamp(0.0, 1.0);
        let y = strip_y + ((1.0 - t) * (strip_h - 1) as f32).round() as usize;
        for dx in 0..TICK_LENGTH {
            image.put(strip_x + strip_w + dx, y, ink);
        }
        let text_x = strip_x + strip_w + TICK_LENGTH + 2;
        draw_text(image, label, text_x, y.saturating_sub(glyph_h / 2), scale, ink);
    }
}

/// Renders the first plane of `stack` through its LUT and display range,
/// burning in the calibration bar overlay if one is attached.
///
/// # Errors
/// Returns a processing error if the stack has no display range.
pub fn flatten(stack: &ImageStack) -> Result<RgbImage> {
    let range = stack
        .display_range()
        .ok_or_else(|| Error::Processing(format!("'{}' has no display range", stack.title())))?;
    let lut = stack.lut();
    let inverted = stack.is_inverted_lut();
    let plane = stack.plane(0, 0);

    let mut image = RgbImage::filled(stack.width(), stack.height(), [0, 0, 0]);
    for ((y, x), v) in plane.indexed_iter() {
        image.put(x, y, shade(lut, inverted, range.normalize(*v)));
    }
    if let Some(bar) = stack.overlay() {
        draw_calibration_bar(&mut image, bar, range, lut, inverted);
    }
    Ok(image)
}
