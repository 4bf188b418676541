// Adapters layer: conversions from external formats into domain values.

pub mod geojson;
