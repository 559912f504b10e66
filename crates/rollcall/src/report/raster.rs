//! Rasterizing a [`Layout`] into an RGB image.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgb, RgbImage};
use tracing::trace;

use super::layout::{Color, Element, Layout, GLYPH_SIZE, WHITE};
use crate::error::{Error, Result};

/// Rows of pixels drawn between yields to the runtime.
const BAND_HEIGHT: u32 = 256;

/// Tallest canvas accepted, in pixels.
const MAX_HEIGHT: u32 = 60_000;

/// Draw every element of `layout` onto a white canvas.
///
/// Yields to the runtime each time drawing moves into a new band of rows.
///
/// # Errors
///
/// Returns a report error if the canvas is empty or too tall.
pub async fn rasterize(layout: &Layout) -> Result<RgbImage> {
    let (width, height) = (layout.width(), layout.height());
    if width == 0 || height == 0 {
        return Err(Error::report("cannot rasterize an empty layout"));
    }
    if height > MAX_HEIGHT {
        return Err(Error::report(format!(
            "report is {height}px tall, more than the {MAX_HEIGHT}px limit"
        )));
    }

    let mut canvas = RgbImage::from_pixel(width, height, Rgb(WHITE));
    let mut band = 0;

    for element in layout.elements() {
        let element_band = element.top() / BAND_HEIGHT;
        if element_band != band {
            band = element_band;
            trace!("Rasterizing band {}", band);
            tokio::task::yield_now().await;
        }
        draw(&mut canvas, element);
    }

    Ok(canvas)
}

fn draw(canvas: &mut RgbImage, element: &Element) {
    match element {
        Element::Rect {
            x,
            y,
            width,
            height,
            color,
        } => fill(canvas, *x, *y, *width, *height, *color),
        Element::Text {
            x,
            y,
            scale,
            color,
            text,
        } => {
            let advance = GLYPH_SIZE * scale;
            for (index, ch) in text.chars().enumerate() {
                let offset = u32::try_from(index).unwrap_or(u32::MAX).saturating_mul(advance);
                glyph(canvas, x.saturating_add(offset), *y, *scale, *color, ch);
            }
        }
    }
}

/// Fill a rectangle, clipped to the canvas.
fn fill(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Color) {
    let right = x.saturating_add(width).min(canvas.width());
    let bottom = y.saturating_add(height).min(canvas.height());
    for py in y..bottom {
        for px in x..right {
            canvas.put_pixel(px, py, Rgb(color));
        }
    }
}

/// Bitmap for a character; unknown characters render as `?`.
fn bitmap(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn glyph(canvas: &mut RgbImage, x: u32, y: u32, scale: u32, color: Color, ch: char) {
    for (row, bits) in (0u32..).zip(bitmap(ch)) {
        for column in 0..GLYPH_SIZE {
            // Bit 0 is the leftmost pixel.
            if bits & (1 << column) != 0 {
                fill(
                    canvas,
                    x.saturating_add(column * scale),
                    y.saturating_add(row * scale),
                    scale,
                    scale,
                    color,
                );
            }
        }
    }
}
