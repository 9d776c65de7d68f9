use crate::types::{Region, RegionSet, ValueMap};
use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use geo::{BoundingRect, MultiPolygon, Rect};
use geojson::GeoJson;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

pub fn load_regions(path: &Path, region_key: &str) -> Result<RegionSet> {
    info!(?path, "Loading region boundaries");
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let regions = parse_regions(BufReader::new(file), region_key)
        .with_context(|| format!("Failed to load regions from {:?}", path))?;
    info!(count = regions.len(), "Loaded regions");
    Ok(regions)
}

/// Reads a FeatureCollection and keys each areal feature by its `region_key`
/// property. Features sharing a name are merged into one region.
pub fn parse_regions<R: Read>(reader: R, region_key: &str) -> Result<RegionSet> {
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut regions: Vec<Region> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for feature in collection.features {
        let name_val = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(region_key));

        let name = match name_val {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                debug!(region_key, "Skipping feature without a region name");
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of {}: {:?}", name, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        debug!(%name, "Skipping non-areal geometry");
                        continue;
                    }
                }
            }
            None => continue,
        };

        match index.get(&name) {
            Some(&i) => {
                debug!(%name, "Merging repeated region feature");
                regions[i].geometry.0.extend(geometry.0);
            }
            None => {
                index.insert(name.clone(), regions.len());
                regions.push(Region { name, geometry });
            }
        }
    }

    if regions.is_empty() {
        bail!("No regions with a '{}' property found", region_key);
    }

    let bounds = regions
        .iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        })
        .ok_or_else(|| anyhow!("Regions have no coordinates"))?;

    Ok(RegionSet::new(regions, bounds))
}

pub fn load_values_csv(path: &Path, regions: &RegionSet, region_key: &str) -> Result<ValueMap> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    read_values_csv(file, regions, region_key)
        .with_context(|| format!("Failed to read values from {:?}", path))
}

/// Reads a `<region_key>,value` table into a map seeded with zeros.
pub fn read_values_csv<R: Read>(reader: R, regions: &RegionSet, region_key: &str) -> Result<ValueMap> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = headers
        .iter()
        .position(|h| h == region_key)
        .ok_or_else(|| anyhow!("Column '{}' not found in CSV", region_key))?;
    let value_idx = headers
        .iter()
        .position(|h| h == "value")
        .ok_or_else(|| anyhow!("Column 'value' not found in CSV"))?;

    let mut values = ValueMap::seeded(regions);

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let name = record.get(name_idx).unwrap_or("");
        if name.is_empty() {
            continue;
        }

        let raw = record.get(value_idx).unwrap_or("");
        let value: u64 = if raw.is_empty() {
            0
        } else {
            raw.parse().with_context(|| {
                format!("Row {}: '{}' is not a non-negative integer for {}", row + 2, raw, name)
            })?
        };

        if !values.set(name, value) {
            warn!(region = name, "Skipping value for unknown region");
        }
    }

    Ok(values)
}

pub fn write_template<W: Write>(writer: W, regions: &RegionSet, region_key: &str) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record([region_key, "value"])?;
    for name in regions.names() {
        wtr.write_record([name, "0"])?;
    }
    wtr.flush()?;
    Ok(())
}
