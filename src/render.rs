use crate::colormap::ColorMap;
use crate::glyphs::{self, GLYPH_SIZE};
use crate::processing::{self, JoinedRegion};
use crate::raster::{self, PixelRect, Span, Viewport};
use crate::types::{RegionSet, RenderRequest};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EDGE: Rgba<u8> = Rgba([204, 204, 204, 255]);
const INK: Rgba<u8> = Rgba([17, 17, 17, 255]);
const CAPTION_FRAME: Rgba<u8> = Rgba([160, 160, 160, 255]);

const TITLE_SCALE: u32 = 3;
const TEXT_SCALE: u32 = 2;
const TICKS: usize = 5;

pub const COLOR_DIRECTION: &str = "Color scale: Light -> Dark = Low -> High";

/// Where each part of the figure goes on a `width` x `height` canvas.
#[derive(Debug, Clone, Copy)]
struct Layout {
    title_y: f64,
    map: PixelRect,
    colorbar: PixelRect,
    caption_top: f64,
}

impl Layout {
    fn new(width: u32, height: u32, widest_tick: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let margin = (w.min(h) / 40.0).round().max(8.0);
        let line = (GLYPH_SIZE * TEXT_SCALE) as f64;

        let title_y = margin;
        let map_top = title_y + (GLYPH_SIZE * TITLE_SCALE) as f64 + margin;

        let caption_height = 2.0 * line + line / 2.0 + line;
        let caption_top = h - margin - caption_height;

        let bar_width = (w / 40.0).round().max(10.0);
        let legend_width = bar_width + line / 2.0 + widest_tick as f64;
        let map_right = w - margin - legend_width - margin;
        let map_bottom = caption_top - margin;

        let map = PixelRect {
            x: margin,
            y: map_top,
            width: (map_right - margin).max(1.0),
            height: (map_bottom - map_top).max(1.0),
        };

        // Bar is 80% of the map height, centered beside it.
        let bar_height = map.height * 0.8;
        let colorbar = PixelRect {
            x: map_right + margin,
            y: map.y + (map.height - bar_height) / 2.0,
            width: bar_width,
            height: bar_height,
        };

        Self {
            title_y,
            map,
            colorbar,
            caption_top,
        }
    }
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        let text = format!("{:.2}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn tick_labels(cmap: &ColorMap) -> Vec<(f64, String)> {
    if cmap.max() <= cmap.min() {
        return vec![(0.0, format_tick(cmap.min()))];
    }
    (0..TICKS)
        .map(|i| {
            let t = i as f64 / (TICKS - 1) as f64;
            (t, format_tick(cmap.min() + t * (cmap.max() - cmap.min())))
        })
        .collect()
}

/// Everything derived from a request before any pixel is painted.
struct Scene<'a> {
    rows: Vec<JoinedRegion<'a>>,
    cmap: ColorMap,
    ticks: Vec<(f64, String)>,
    layout: Layout,
    viewport: Viewport,
}

impl<'a> Scene<'a> {
    fn build(regions: &'a RegionSet, request: &RenderRequest, width: u32, height: u32) -> Self {
        let rows = processing::join(regions, &request.values);
        let (min, max) = processing::value_range(&rows).unwrap_or((0, 0));
        let cmap = ColorMap::new(request.color_scale, min, max);
        let ticks = tick_labels(&cmap);
        let widest_tick = ticks
            .iter()
            .map(|(_, label)| glyphs::text_width(label, TEXT_SCALE))
            .max()
            .unwrap_or(0);

        let layout = Layout::new(width, height, widest_tick);
        let viewport = Viewport::fit(regions.bounds(), layout.map);

        Self {
            rows,
            cmap,
            ticks,
            layout,
            viewport,
        }
    }
}

/// Renders the choropleth figure for `request` on a `width` x `height` canvas.
///
/// Output depends only on the inputs: region spans are computed in parallel
/// but painted in region order.
pub fn render_map(regions: &RegionSet, request: &RenderRequest, width: u32, height: u32) -> RgbaImage {
    let scene = Scene::build(regions, request, width, height);

    debug!(
        regions = scene.rows.len(),
        min = scene.cmap.min(),
        max = scene.cmap.max(),
        scale = %request.color_scale,
        "Rendering map"
    );

    let mut img = RgbaImage::from_pixel(width, height, BACKGROUND);

    draw_regions(&mut img, &scene.rows, &scene.viewport, &scene.cmap);
    draw_colorbar(&mut img, &scene.layout, &scene.cmap, &scene.ticks);

    glyphs::draw_text_bold_centered(
        &mut img,
        &request.title,
        (scene.layout.map.x + scene.layout.map.width / 2.0) as i64,
        scene.layout.title_y as i64,
        TITLE_SCALE,
        INK,
    );
    draw_caption(&mut img, &scene.layout, &request.unit);

    img
}

fn draw_regions(img: &mut RgbaImage, rows: &[JoinedRegion<'_>], viewport: &Viewport, cmap: &ColorMap) {
    let (width, height) = img.dimensions();

    let filled: Vec<(Vec<Span>, Rgba<u8>)> = rows
        .par_iter()
        .map(|row| {
            let spans = raster::polygon_spans(&row.region.geometry, viewport, width, height);
            (spans, cmap.color_for(row.value))
        })
        .collect();

    for (spans, color) in &filled {
        raster::fill_spans(img, spans, *color);
    }
    for row in rows {
        raster::stroke_outline(img, &row.region.geometry, viewport, EDGE);
    }
}

fn draw_colorbar(img: &mut RgbaImage, layout: &Layout, cmap: &ColorMap, ticks: &[(f64, String)]) {
    let bar = layout.colorbar;
    let top = bar.y.round() as u32;
    let rows = bar.height.round().max(1.0) as u32;

    // Bottom of the bar is the low end.
    for i in 0..rows {
        let t = 1.0 - i as f64 / (rows.saturating_sub(1).max(1)) as f64;
        let strip = PixelRect {
            x: bar.x,
            y: (top + i) as f64,
            width: bar.width,
            height: 1.0,
        };
        raster::fill_rect(img, strip, cmap.color_at(t));
    }
    raster::stroke_rect(
        img,
        PixelRect { height: rows as f64, y: top as f64, ..bar },
        INK,
    );

    let line = (GLYPH_SIZE * TEXT_SCALE) as f64;
    for (t, label) in ticks {
        let y = top as f64 + (1.0 - t) * (rows as f64 - 1.0);
        let tick_left = bar.x + bar.width;
        raster::draw_line(img, (tick_left, y), (tick_left + line / 4.0, y), INK);
        glyphs::draw_text(
            img,
            label,
            (tick_left + line / 2.0) as i64,
            (y - line / 2.0) as i64,
            TEXT_SCALE,
            INK,
        );
    }
}

fn draw_caption(img: &mut RgbaImage, layout: &Layout, unit: &str) {
    let unit_line = format!("Unit: {}", unit);
    let lines = [unit_line.as_str(), COLOR_DIRECTION];
    let line = (GLYPH_SIZE * TEXT_SCALE) as f64;
    let pad = line / 2.0;

    let text_width = lines
        .iter()
        .map(|l| glyphs::text_width(l, TEXT_SCALE))
        .max()
        .unwrap_or(0) as f64;
    let center_x = layout.map.x + layout.map.width / 2.0;

    let frame = PixelRect {
        x: center_x - text_width / 2.0 - pad,
        y: layout.caption_top,
        width: text_width + 2.0 * pad,
        height: 2.0 * line + pad + 2.0 * pad,
    };
    raster::blend_rect(img, frame, BACKGROUND, 0.7);
    raster::stroke_rect(img, frame, CAPTION_FRAME);

    for (i, text) in lines.iter().enumerate() {
        let y = frame.y + pad + i as f64 * (line + pad);
        glyphs::draw_text_centered(img, text, center_x as i64, y as i64, TEXT_SCALE, INK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::luminance;
    use crate::types::tests::two_squares;
    use crate::types::{ColorScale, ValueMap};
    use geo::{coord, Centroid};

    fn request(values: ValueMap, scale: ColorScale) -> RenderRequest {
        RenderRequest {
            title: "Test Map".to_string(),
            unit: "people".to_string(),
            color_scale: scale,
            values,
        }
    }

    fn pixel_at_centroid(
        img: &RgbaImage,
        regions: &RegionSet,
        request: &RenderRequest,
        name: &str,
    ) -> Rgba<u8> {
        let (w, h) = img.dimensions();
        let viewport = Scene::build(regions, request, w, h).viewport;
        let centroid = regions.get(name).unwrap().geometry.centroid().unwrap();
        let (x, y) = viewport.project(coord! { x: centroid.x(), y: centroid.y() });
        *img.get_pixel(x as u32, y as u32)
    }

    #[test]
    fn higher_value_region_is_darker() {
        let regions = two_squares();
        let mut values = ValueMap::seeded(&regions);
        values.set("Kerala", 10);
        values.set("Tamil Nadu", 90);

        for scale in [ColorScale::Blues, ColorScale::Reds] {
            let req = request(values.clone(), scale);
            let img = render_map(&regions, &req, 600, 500);
            let low = pixel_at_centroid(&img, &regions, &req, "Kerala");
            let high = pixel_at_centroid(&img, &regions, &req, "Tamil Nadu");
            assert_ne!(low, BACKGROUND);
            assert!(luminance(high) < luminance(low), "{scale}: {high:?} vs {low:?}");
        }
    }

    #[test]
    fn equal_values_share_the_light_end() {
        let regions = two_squares();
        let req = request(ValueMap::seeded(&regions), ColorScale::Greens);
        let img = render_map(&regions, &req, 600, 500);
        let a = pixel_at_centroid(&img, &regions, &req, "Kerala");
        let b = pixel_at_centroid(&img, &regions, &req, "Tamil Nadu");
        assert_eq!(a, b);
        assert_eq!(a, ColorMap::new(ColorScale::Greens, 0, 0).color_at(0.0));
    }

    #[test]
    fn canvas_has_requested_size_and_title_ink() {
        let regions = two_squares();
        let img = render_map(&regions, &request(ValueMap::seeded(&regions), ColorScale::Blues), 640, 480);
        assert_eq!(img.dimensions(), (640, 480));
        let title_band_ink = (0..40u32)
            .flat_map(|y| (0..640u32).map(move |x| (x, y)))
            .filter(|&(x, y)| *img.get_pixel(x, y) == INK)
            .count();
        assert!(title_band_ink > 0);
    }

    #[test]
    fn ticks_span_the_range() {
        let ticks = tick_labels(&ColorMap::new(ColorScale::Blues, 10, 90));
        let labels: Vec<&str> = ticks.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(labels, vec!["10", "30", "50", "70", "90"]);

        let ticks = tick_labels(&ColorMap::new(ColorScale::Blues, 0, 5));
        assert_eq!(ticks[1].1, "1.25");
        assert_eq!(ticks[2].1, "2.5");

        assert_eq!(tick_labels(&ColorMap::new(ColorScale::Blues, 3, 3)).len(), 1);
    }
}
