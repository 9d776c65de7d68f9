use crate::types::{Region, RegionSet, ValueMap};
use std::collections::HashMap;
use tracing::debug;

/// One row of the (region, value) table after joining onto the geometries.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRegion<'a> {
    pub region: &'a Region,
    pub value: u64,
}

/// Joins the value table onto the region geometries by exact name.
///
/// Rows come out in region-set order. A value naming an unknown region has no
/// geometry to draw and is dropped, as is a region with no value.
pub fn join<'a>(regions: &'a RegionSet, values: &ValueMap) -> Vec<JoinedRegion<'a>> {
    let table: HashMap<&str, u64> = values.iter().collect();

    let joined: Vec<JoinedRegion<'a>> = regions
        .regions()
        .iter()
        .filter_map(|region| {
            table
                .get(region.name.as_str())
                .map(|&value| JoinedRegion { region, value })
        })
        .collect();

    if joined.len() != table.len() {
        debug!(
            values = table.len(),
            matched = joined.len(),
            "Some values had no matching region"
        );
    }

    joined
}

/// Observed (min, max) of the joined values.
pub fn value_range(rows: &[JoinedRegion<'_>]) -> Option<(u64, u64)> {
    let min = rows.iter().map(|r| r.value).min()?;
    let max = rows.iter().map(|r| r.value).max()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::{square_region, two_squares};
    use geo::{coord, Rect};

    #[test]
    fn one_row_per_known_region() {
        let regions = two_squares();
        let mut values = ValueMap::seeded(&regions);
        values.set("Tamil Nadu", 9);

        let rows = join(&regions, &values);
        assert_eq!(rows.len(), regions.len());
        assert_eq!(rows[0].region.name, "Kerala");
        assert_eq!(rows[0].value, 0);
        assert_eq!(rows[1].value, 9);
    }

    #[test]
    fn values_without_geometry_are_excluded() {
        let regions = two_squares();
        let values = ValueMap::seeded(&regions);
        let fewer = RegionSet::new(
            vec![square_region("Kerala", 0.0, 0.0, 1.0)],
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }),
        );

        let rows = join(&fewer, &values);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region.name, "Kerala");
    }

    #[test]
    fn regions_without_values_are_excluded() {
        let regions = two_squares();
        let rows = join(&regions, &ValueMap::default());
        assert!(rows.is_empty());
        assert_eq!(value_range(&rows), None);
    }

    #[test]
    fn range_spans_observed_values() {
        let regions = two_squares();
        let mut values = ValueMap::seeded(&regions);
        values.set("Kerala", 10);
        values.set("Tamil Nadu", 90);
        assert_eq!(value_range(&join(&regions, &values)), Some((10, 90)));
    }
}
