//! Bitmap text using the embedded 8x8 font, scaled by whole pixels.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};

pub const GLYPH_SIZE: u32 = 8;

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale
}

pub fn draw_text(img: &mut RgbaImage, text: &str, x: i64, y: i64, scale: u32, color: Rgba<u8>) {
    let step = (GLYPH_SIZE * scale) as i64;
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as i64 * step;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = gx + (col * scale) as i64;
                let py = y + (row as u32 * scale) as i64;
                for dy in 0..scale as i64 {
                    for dx in 0..scale as i64 {
                        let (tx, ty) = (px + dx, py + dy);
                        if tx >= 0 && ty >= 0 && (tx as u32) < img.width() && (ty as u32) < img.height() {
                            img.put_pixel(tx as u32, ty as u32, color);
                        }
                    }
                }
            }
        }
    }
}

/// Draws `text` horizontally centered on `center_x`.
pub fn draw_text_centered(
    img: &mut RgbaImage,
    text: &str,
    center_x: i64,
    y: i64,
    scale: u32,
    color: Rgba<u8>,
) {
    let x = center_x - text_width(text, scale) as i64 / 2;
    draw_text(img, text, x, y, scale, color);
}

/// Faux-bold: the same run drawn twice, one pixel apart.
pub fn draw_text_bold_centered(
    img: &mut RgbaImage,
    text: &str,
    center_x: i64,
    y: i64,
    scale: u32,
    color: Rgba<u8>,
) {
    draw_text_centered(img, text, center_x, y, scale, color);
    draw_text_centered(img, text, center_x + 1, y, scale, color);
}
