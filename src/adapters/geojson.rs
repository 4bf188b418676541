//! Reads a user-drawn ring from GeoJSON, the format drawing tools export.

use crate::domain::model::Coordinate;
use crate::utils::error::{DensityError, Result};
use geojson::{GeoJson, Geometry, Value};

/// 取出第一個 Polygon 的外環（經度, 緯度）
pub fn ring_from_geojson(input: &str) -> Result<Vec<Coordinate>> {
    let geojson: GeoJson = input.parse()?;

    let geometry = match &geojson {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry.as_ref(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .find(|g| matches!(g.value, Value::Polygon(_))),
    };

    match geometry {
        Some(geometry) => outer_ring(geometry),
        None => Err(DensityError::invalid_input("GeoJSON contains no polygon")),
    }
}

fn outer_ring(geometry: &Geometry) -> Result<Vec<Coordinate>> {
    let Value::Polygon(rings) = &geometry.value else {
        return Err(DensityError::invalid_input(format!(
            "expected a Polygon geometry, got {}",
            geometry.value.type_name()
        )));
    };

    let exterior = rings
        .first()
        .ok_or_else(|| DensityError::invalid_input("polygon has no exterior ring"))?;

    exterior
        .iter()
        .map(|position| match position.as_slice() {
            [lon, lat, ..] => Coordinate::new(*lon, *lat),
            _ => Err(DensityError::invalid_input(
                "position needs longitude and latitude",
            )),
        })
        .collect()
}

/// CLI 用的簡易格式：`lon,lat;lon,lat;...`
pub fn ring_from_pairs(input: &str) -> Result<Vec<Coordinate>> {
    input
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (lon, lat) = pair.split_once(',').ok_or_else(|| {
                DensityError::invalid_input(format!("expected 'lon,lat', got '{}'", pair))
            })?;
            let parse = |value: &str| {
                value.trim().parse::<f64>().map_err(|e| {
                    DensityError::invalid_input(format!("invalid number '{}': {}", value, e))
                })
            };
            Coordinate::new(parse(lon)?, parse(lat)?)
        })
        .collect()
}
