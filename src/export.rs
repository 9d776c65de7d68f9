use crate::render;
use crate::types::{RegionSet, RenderRequest};
use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

pub const PNG_MIME: &str = "image/png";

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode map as PNG")?;
    Ok(bytes)
}

/// Full pipeline for one request: join, render, encode.
pub fn render_png(regions: &RegionSet, request: &RenderRequest, width: u32, height: u32) -> Result<Vec<u8>> {
    let img = render::render_map(regions, request, width, height);
    encode_png(&img)
}

/// Download name for a map: spaces become underscores, `.png` is appended.
/// Path separators and control characters are replaced too, so the result is
/// always a single file name.
pub fn export_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if stem.is_empty() {
        "map.png".to_string()
    } else {
        format!("{}.png", stem)
    }
}
