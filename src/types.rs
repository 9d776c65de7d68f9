use geo::{MultiPolygon, Rect};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// The fixed set of regions loaded from the boundary file, in file order.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    bounds: Rect<f64>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>, bounds: Rect<f64>) -> Self {
        Self { regions, bounds }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, serde::Serialize,
    Display, EnumIter, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ColorScale {
    #[default]
    Blues,
    Greens,
    Oranges,
    Purples,
    Reds,
}

/// Region name -> value, one entry per known region, kept in region order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueMap {
    entries: Vec<(String, u64)>,
}

impl ValueMap {
    /// Every region of `regions` at zero.
    pub fn seeded(regions: &RegionSet) -> Self {
        Self {
            entries: regions.names().map(|n| (n.to_string(), 0)).collect(),
        }
    }

    /// Sets the value of a known region. Unknown names are refused.
    pub fn set(&mut self, name: &str, value: u64) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RenderRequest {
    pub title: String,
    pub unit: String,
    pub color_scale: ColorScale,
    pub values: ValueMap,
}

/// A frozen copy of a past render request. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SavedEntry {
    position: usize,
    title: String,
    unit: String,
    color_scale: ColorScale,
    values: ValueMap,
}

impl SavedEntry {
    pub(crate) fn snapshot(position: usize, request: &RenderRequest) -> Self {
        Self {
            position,
            title: request.title.clone(),
            unit: request.unit.clone(),
            color_scale: request.color_scale,
            values: request.values.clone(),
        }
    }

    /// 1-based position in the session log.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn color_scale(&self) -> ColorScale {
        self.color_scale
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }
}
