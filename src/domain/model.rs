use crate::utils::error::{DensityError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WGS84 座標，(經度, 緯度) 順序
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lon: f64,
    lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(DensityError::invalid_input(format!(
                "longitude {} is outside [-180, 180]",
                lon
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DensityError::invalid_input(format!(
                "latitude {} is outside [-90, 90]",
                lat
            )));
        }
        Ok(Self { lon, lat })
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.lon, y: c.lat }
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.lon, c.lat)
    }
}

/// 區域的建構方式。也是幾何來源（地圖或繪圖工具）交給核心的輸入，
/// 查詢語法依此分派
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryMode {
    Circle { center: Coordinate, radius_meters: f64 },
    Freeform { ring: Vec<Coordinate> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Closed query polygon plus its cached area and bounds.
///
/// Only `core::geometry` constructs these; a changed center, radius or ring
/// produces a new value instead of mutating an existing one.
#[derive(Debug, Clone)]
pub struct AreaGeometry {
    pub(crate) mode: GeometryMode,
    pub(crate) polygon: geo::Polygon<f64>,
    pub(crate) area_km2: f64,
    pub(crate) bounding_box: BoundingBox,
}

impl AreaGeometry {
    pub fn mode(&self) -> &GeometryMode {
        &self.mode
    }

    pub fn polygon(&self) -> &geo::Polygon<f64> {
        &self.polygon
    }

    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// 環上的頂點，包含重複的收尾點
    pub fn vertices(&self) -> impl Iterator<Item = geo::Coord<f64>> + '_ {
        self.polygon.exterior().coords().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.polygon.exterior().0.len()
    }
}

/// Overpass 回傳的單一元素，只保留計數需要的代表點
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoiElement {
    Point { coordinate: Coordinate },
    WayOrRelation { centroid: Option<Coordinate> },
}

impl PoiElement {
    pub fn representative(&self) -> Option<Coordinate> {
        match self {
            Self::Point { coordinate } => Some(*coordinate),
            Self::WayOrRelation { centroid } => *centroid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Amenity,
    Shop,
    Office,
    PublicTransport,
}

impl TagCategory {
    pub const ALL: [TagCategory; 4] = [
        TagCategory::Amenity,
        TagCategory::Shop,
        TagCategory::Office,
        TagCategory::PublicTransport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amenity => "amenity",
            Self::Shop => "shop",
            Self::Office => "office",
            Self::PublicTransport => "public_transport",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagCategory {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amenity" => Ok(Self::Amenity),
            "shop" => Ok(Self::Shop),
            "office" => Ok(Self::Office),
            "public_transport" => Ok(Self::PublicTransport),
            other => Err(DensityError::InvalidConfigValueError {
                field: "query.categories".to_string(),
                value: other.to_string(),
                reason: "Expected one of amenity, shop, office, public_transport".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrbanLevel {
    Rural,
    Suburban,
    Urban,
}

impl UrbanLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rural => "Rural",
            Self::Suburban => "Suburban",
            Self::Urban => "Urban",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Rural => "Sparse points of interest; mostly residential or open land",
            Self::Suburban => "Moderate mix of shops, services and transit",
            Self::Urban => "Dense commercial and transit activity",
        }
    }
}

impl fmt::Display for UrbanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 密度分級門檻（POI/km²），下界閉區間
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityThresholds {
    pub suburban_min: f64,
    pub urban_min: f64,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self {
            suburban_min: 5.0,
            urban_min: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityResult {
    pub area_km2: f64,
    pub poi_count: usize,
    pub poi_density: f64,
    pub level: UrbanLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(139.7671, 35.6812).is_ok());
        assert!(Coordinate::new(180.0, -90.0).is_ok());
        assert!(Coordinate::new(180.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -90.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_representative_point() {
        let c = Coordinate::new(1.0, 2.0).unwrap();
        assert_eq!(PoiElement::Point { coordinate: c }.representative(), Some(c));
        assert_eq!(
            PoiElement::WayOrRelation { centroid: Some(c) }.representative(),
            Some(c)
        );
        assert_eq!(
            PoiElement::WayOrRelation { centroid: None }.representative(),
            None
        );
    }

    #[test]
    fn test_tag_category_parse() {
        assert_eq!("Public_Transport".parse::<TagCategory>().unwrap(), TagCategory::PublicTransport);
        assert!("leisure".parse::<TagCategory>().is_err());
        assert_eq!(TagCategory::ALL.map(|c| c.as_str()), ["amenity", "shop", "office", "public_transport"]);
    }

    #[test]
    fn test_urban_level_ordering() {
        assert!(UrbanLevel::Rural < UrbanLevel::Suburban);
        assert!(UrbanLevel::Suburban < UrbanLevel::Urban);
        assert_eq!(serde_json::to_value(UrbanLevel::Suburban).unwrap(), "suburban");
    }
}
