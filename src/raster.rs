//! Pixel-level drawing on an `RgbaImage`: projecting lon/lat into a pixel
//! box, scanline polygon filling and simple strokes.

use geo::{Coord, MultiPolygon, Rect};
use image::{Rgba, RgbaImage};

/// Screen-space rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Linear lon/lat -> pixel mapping. The y axis is stretched by
/// `1 / cos(mid latitude)` so shapes keep their on-the-ground proportions.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    min_x: f64,
    max_y: f64,
    scale_x: f64,
    scale_y: f64,
    origin_x: f64,
    origin_y: f64,
}

impl Viewport {
    pub fn fit(bounds: Rect<f64>, area: PixelRect) -> Self {
        let mid_lat = (bounds.min().y + bounds.max().y) / 2.0;
        let stretch = 1.0 / mid_lat.to_radians().cos().abs().max(0.1);

        let data_w = bounds.width().max(f64::EPSILON);
        let data_h = (bounds.height() * stretch).max(f64::EPSILON);
        let scale = (area.width / data_w).min(area.height / data_h);

        let used_w = bounds.width() * scale;
        let used_h = bounds.height() * stretch * scale;

        Self {
            min_x: bounds.min().x,
            max_y: bounds.max().y,
            scale_x: scale,
            scale_y: scale * stretch,
            origin_x: area.x + (area.width - used_w) / 2.0,
            origin_y: area.y + (area.height - used_h) / 2.0,
        }
    }

    pub fn project(&self, c: Coord<f64>) -> (f64, f64) {
        (
            self.origin_x + (c.x - self.min_x) * self.scale_x,
            self.origin_y + (self.max_y - c.y) * self.scale_y,
        )
    }
}

/// A horizontal run of pixels `[x0, x1)` on row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: u32,
    pub x0: u32,
    pub x1: u32,
}

fn project_rings(geometry: &MultiPolygon<f64>, viewport: &Viewport) -> Vec<Vec<(f64, f64)>> {
    geometry
        .iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
        .map(|ring| ring.coords().map(|c| viewport.project(*c)).collect())
        .collect()
}

/// Even-odd scanline fill of every ring in `geometry`, sampled at pixel
/// centers and clipped to a `width` x `height` canvas. Holes stay empty.
pub fn polygon_spans(
    geometry: &MultiPolygon<f64>,
    viewport: &Viewport,
    width: u32,
    height: u32,
) -> Vec<Span> {
    let rings = project_rings(geometry, viewport);

    let (mut top, mut bottom) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in rings.iter().flatten() {
        top = top.min(y);
        bottom = bottom.max(y);
    }
    if !top.is_finite() || !bottom.is_finite() {
        return Vec::new();
    }

    let first_row = (top - 0.5).ceil().max(0.0) as u32;
    let last_row = ((bottom - 0.5).floor().min(height as f64 - 1.0)).max(-1.0);
    if last_row < first_row as f64 {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut crossings: Vec<f64> = Vec::new();

    for row in first_row..=last_row as u32 {
        let sy = row as f64 + 0.5;
        crossings.clear();

        for ring in &rings {
            for edge in ring.windows(2) {
                let (x0, y0) = edge[0];
                let (x1, y1) = edge[1];
                if (y0 <= sy && y1 > sy) || (y1 <= sy && y0 > sy) {
                    crossings.push(x0 + (sy - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }

        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            let x0 = (pair[0] - 0.5).ceil().clamp(0.0, width as f64) as u32;
            let x1 = (pair[1] - 0.5).ceil().clamp(0.0, width as f64) as u32;
            if x1 > x0 {
                spans.push(Span { y: row, x0, x1 });
            }
        }
    }

    spans
}

pub fn fill_spans(img: &mut RgbaImage, spans: &[Span], color: Rgba<u8>) {
    for span in spans {
        for x in span.x0..span.x1 {
            img.put_pixel(x, span.y, color);
        }
    }
}

fn put_clipped(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

pub fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = (from.0 + dx * t).floor() as i64;
        let y = (from.1 + dy * t).floor() as i64;
        put_clipped(img, x, y, color);
    }
}

pub fn stroke_outline(
    img: &mut RgbaImage,
    geometry: &MultiPolygon<f64>,
    viewport: &Viewport,
    color: Rgba<u8>,
) {
    for ring in project_rings(geometry, viewport) {
        for edge in ring.windows(2) {
            draw_line(img, edge[0], edge[1], color);
        }
    }
}

pub fn fill_rect(img: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    blend_rect(img, rect, color, 1.0);
}

/// Paints `color` over `rect` with the given opacity.
pub fn blend_rect(img: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>, alpha: f64) {
    let x0 = rect.x.round().max(0.0) as u32;
    let y0 = rect.y.round().max(0.0) as u32;
    let x1 = ((rect.x + rect.width).round().max(0.0) as u32).min(img.width());
    let y1 = ((rect.y + rect.height).round().max(0.0) as u32).min(img.height());
    let alpha = alpha.clamp(0.0, 1.0);

    for y in y0..y1 {
        for x in x0..x1 {
            let under = img.get_pixel(x, y).0;
            let mut out = [0u8; 4];
            for c in 0..3 {
                out[c] = (color.0[c] as f64 * alpha + under[c] as f64 * (1.0 - alpha)).round() as u8;
            }
            out[3] = 255;
            img.put_pixel(x, y, Rgba(out));
        }
    }
}

pub fn stroke_rect(img: &mut RgbaImage, rect: PixelRect, color: Rgba<u8>) {
    let (l, t) = (rect.x, rect.y);
    let (r, b) = (rect.x + rect.width - 1.0, rect.y + rect.height - 1.0);
    draw_line(img, (l, t), (r, t), color);
    draw_line(img, (r, t), (r, b), color);
    draw_line(img, (r, b), (l, b), color);
    draw_line(img, (l, b), (l, t), color);
}
