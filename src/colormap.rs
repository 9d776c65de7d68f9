use crate::types::ColorScale;
use colorgrad::Gradient;
use image::Rgba;

/// Continuous light-to-dark palette with a linear value normalization.
pub struct ColorMap {
    gradient: Box<dyn Gradient + Send + Sync>,
    min: f64,
    max: f64,
}

impl ColorMap {
    pub fn new(scale: ColorScale, min: u64, max: u64) -> Self {
        let gradient: Box<dyn Gradient + Send + Sync> = match scale {
            ColorScale::Blues => Box::new(colorgrad::preset::blues()),
            ColorScale::Greens => Box::new(colorgrad::preset::greens()),
            ColorScale::Oranges => Box::new(colorgrad::preset::oranges()),
            ColorScale::Purples => Box::new(colorgrad::preset::purples()),
            ColorScale::Reds => Box::new(colorgrad::preset::reds()),
        };
        Self {
            gradient,
            min: min as f64,
            max: max as f64,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Maps `value` into [0, 1]. A degenerate range maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }

    pub fn color_at(&self, t: f64) -> Rgba<u8> {
        let [r, g, b, _] = self.gradient.at(t.clamp(0.0, 1.0) as f32).to_rgba8();
        Rgba([r, g, b, 255])
    }

    pub fn color_for(&self, value: u64) -> Rgba<u8> {
        self.color_at(self.normalize(value as f64))
    }
}

/// Relative luminance (Rec. 709 weights), 0 = black, 1 = white.
#[cfg(test)]
pub fn luminance(color: Rgba<u8>) -> f64 {
    let [r, g, b, _] = color.0;
    (0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn higher_values_are_darker_on_every_scale() {
        for scale in ColorScale::iter() {
            let cmap = ColorMap::new(scale, 10, 90);
            let low = luminance(cmap.color_for(10));
            let high = luminance(cmap.color_for(90));
            assert!(high < low, "{scale}: {high} !< {low}");
        }
    }

    #[test]
    fn mapping_is_monotonic_across_the_range() {
        let cmap = ColorMap::new(ColorScale::Reds, 0, 100);
        let lum: Vec<f64> = (0..=10).map(|i| luminance(cmap.color_for(i * 10))).collect();
        assert!(lum.windows(2).all(|w| w[1] <= w[0]), "{lum:?}");
    }

    #[test]
    fn degenerate_range_maps_to_light_end() {
        let cmap = ColorMap::new(ColorScale::Blues, 5, 5);
        assert_eq!(cmap.normalize(5.0), 0.0);
        assert_eq!(cmap.color_for(5), cmap.color_at(0.0));
    }

    #[test]
    fn normalize_clamps_outside_values() {
        let cmap = ColorMap::new(ColorScale::Greens, 10, 20);
        assert_eq!(cmap.normalize(0.0), 0.0);
        assert_eq!(cmap.normalize(15.0), 0.5);
        assert_eq!(cmap.normalize(99.0), 1.0);
    }
}
