//! Query area construction.
//!
//! Circles are approximated by a fixed-resolution regular polygon whose
//! vertices sit at great-circle distance `radius_meters` from the center.
//! Areas are measured on the WGS84 ellipsoid. Rings are normalised to a
//! counter-clockwise exterior before measuring, and areas crossing the
//! antimeridian are rejected.

use crate::domain::model::{AreaGeometry, BoundingBox, Coordinate, GeometryMode};
use crate::utils::error::{DensityError, Result};
use geo::orient::{Direction, Orient};
use geo::{BoundingRect, Coord, Destination, GeodesicArea, Haversine, LineString, Point, Polygon};
use std::collections::HashSet;

pub const DEFAULT_CIRCLE_STEPS: usize = 128;

pub fn build(mode: &GeometryMode, circle_steps: usize) -> Result<AreaGeometry> {
    match mode {
        GeometryMode::Circle {
            center,
            radius_meters,
        } => build_circle(*center, *radius_meters, circle_steps),
        GeometryMode::Freeform { ring } => from_ring(ring.clone()),
    }
}

pub fn build_circle(center: Coordinate, radius_meters: f64, steps: usize) -> Result<AreaGeometry> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(DensityError::invalid_input(format!(
            "radius must be a positive number of meters, got {}",
            radius_meters
        )));
    }
    if steps < 3 {
        return Err(DensityError::invalid_input(format!(
            "a circle needs at least 3 steps, got {}",
            steps
        )));
    }

    let origin: Point<f64> = center.into();
    let mut coords: Vec<Coord<f64>> = (0..steps)
        .map(|i| {
            let bearing = 360.0 * i as f64 / steps as f64;
            Haversine.destination(origin, bearing, radius_meters).0
        })
        .collect();
    coords.push(coords[0]);
    reject_antimeridian_crossing(&coords)?;

    let polygon = Polygon::new(LineString::new(coords), vec![]);
    tracing::debug!(
        "Built {}-step circle around ({}, {}) with radius {}m",
        steps,
        center.lon(),
        center.lat(),
        radius_meters
    );

    Ok(finish(
        GeometryMode::Circle {
            center,
            radius_meters,
        },
        polygon,
    ))
}

pub fn from_ring(ring: Vec<Coordinate>) -> Result<AreaGeometry> {
    if ring.len() < 4 {
        return Err(DensityError::invalid_input(format!(
            "a closed ring needs at least 4 points, got {}",
            ring.len()
        )));
    }
    if ring.first() != ring.last() {
        return Err(DensityError::invalid_input(
            "ring is not closed: first and last points differ",
        ));
    }

    let distinct: HashSet<(u64, u64)> = ring[..ring.len() - 1]
        .iter()
        .map(|c| (c.lon().to_bits(), c.lat().to_bits()))
        .collect();
    if distinct.len() < 3 {
        return Err(DensityError::invalid_input(format!(
            "ring needs at least 3 distinct vertices, got {}",
            distinct.len()
        )));
    }

    let coords: Vec<Coord<f64>> = ring.iter().map(|c| Coord::from(*c)).collect();
    reject_antimeridian_crossing(&coords)?;

    let polygon = Polygon::new(LineString::new(coords), vec![]);

    Ok(finish(GeometryMode::Freeform { ring }, polygon))
}

/// Geodesic area of the geometry's ring in km².
pub fn area(geometry: &AreaGeometry) -> f64 {
    polygon_area_km2(geometry.polygon())
}

pub fn bounding_box(geometry: &AreaGeometry) -> BoundingBox {
    geometry.bounding_box()
}

/// 相鄰頂點經度差超過 180° 代表邊跨越 ±180° 經線
fn reject_antimeridian_crossing(coords: &[Coord<f64>]) -> Result<()> {
    let crosses = coords.windows(2).any(|pair| (pair[1].x - pair[0].x).abs() > 180.0);
    if crosses {
        return Err(DensityError::invalid_input(
            "area crosses the antimeridian (±180° longitude), which is not supported",
        ));
    }
    Ok(())
}

fn polygon_area_km2(polygon: &Polygon<f64>) -> f64 {
    polygon.geodesic_area_unsigned() / 1_000_000.0
}

fn polygon_bounds(polygon: &Polygon<f64>) -> BoundingBox {
    match polygon.bounding_rect() {
        Some(rect) => BoundingBox {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        },
        // 建構時已保證至少三個頂點
        None => BoundingBox {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 0.0,
            max_lat: 0.0,
        },
    }
}

fn finish(mode: GeometryMode, polygon: Polygon<f64>) -> AreaGeometry {
    // 順時針的外環會被 geodesic area 當成地球其餘部分
    let polygon = polygon.orient(Direction::Default);
    let area_km2 = polygon_area_km2(&polygon);
    let bounding_box = polygon_bounds(&polygon);
    AreaGeometry {
        mode,
        polygon,
        area_km2,
        bounding_box,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::PI;

    pub(crate) fn tokyo_station() -> Coordinate {
        Coordinate::new(139.7671, 35.6812).unwrap()
    }

    /// Axis-aligned square of roughly `side_m` meters centred on `center`.
    pub(crate) fn square_ring(center: Coordinate, side_m: f64) -> Vec<Coordinate> {
        let lat_rad = center.lat().to_radians();
        let m_per_deg_lat = 111_132.954 - 559.822 * (2.0 * lat_rad).cos();
        let m_per_deg_lon = 111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos();
        let half_lat = side_m / 2.0 / m_per_deg_lat;
        let half_lon = side_m / 2.0 / m_per_deg_lon;
        let (lon, lat) = (center.lon(), center.lat());
        vec![
            Coordinate::new(lon - half_lon, lat - half_lat).unwrap(),
            Coordinate::new(lon + half_lon, lat - half_lat).unwrap(),
            Coordinate::new(lon + half_lon, lat + half_lat).unwrap(),
            Coordinate::new(lon - half_lon, lat + half_lat).unwrap(),
            Coordinate::new(lon - half_lon, lat - half_lat).unwrap(),
        ]
    }

    #[test]
    fn test_circle_area_matches_flat_approximation() {
        for radius in [500.0, 1000.0, 3000.0] {
            let geometry = build_circle(tokyo_station(), radius, DEFAULT_CIRCLE_STEPS).unwrap();
            let expected = PI * radius * radius / 1_000_000.0;
            let relative_error = (geometry.area_km2() - expected).abs() / expected;
            assert!(
                relative_error < 0.01,
                "radius {}: area {} vs expected {}",
                radius,
                geometry.area_km2(),
                expected
            );
            assert_eq!(area(&geometry), geometry.area_km2());
        }
    }

    #[test]
    fn test_circle_is_closed_with_fixed_resolution() {
        let geometry = build_circle(tokyo_station(), 1000.0, DEFAULT_CIRCLE_STEPS).unwrap();
        assert_eq!(geometry.vertex_count(), DEFAULT_CIRCLE_STEPS + 1);

        let vertices: Vec<_> = geometry.vertices().collect();
        assert_eq!(vertices.first(), vertices.last());

        // 同樣輸入必須得到同樣的多邊形
        let again = build_circle(tokyo_station(), 1000.0, DEFAULT_CIRCLE_STEPS).unwrap();
        assert_eq!(geometry.polygon(), again.polygon());
    }

    #[test]
    fn test_circle_rejects_invalid_radius_and_steps() {
        assert!(matches!(
            build_circle(tokyo_station(), 0.0, DEFAULT_CIRCLE_STEPS),
            Err(DensityError::InvalidInput { .. })
        ));
        assert!(build_circle(tokyo_station(), -10.0, DEFAULT_CIRCLE_STEPS).is_err());
        assert!(build_circle(tokyo_station(), f64::NAN, DEFAULT_CIRCLE_STEPS).is_err());
        assert!(build_circle(tokyo_station(), 500.0, 2).is_err());
    }

    #[test]
    fn test_circle_bounding_box_contains_center() {
        let geometry = build_circle(tokyo_station(), 3000.0, DEFAULT_CIRCLE_STEPS).unwrap();
        let bbox = bounding_box(&geometry);
        assert!(bbox.min_lon < 139.7671 && 139.7671 < bbox.max_lon);
        assert!(bbox.min_lat < 35.6812 && 35.6812 < bbox.max_lat);
        // 3 km 約 0.027 度緯度
        assert!((bbox.max_lat - bbox.min_lat - 0.054).abs() < 0.002);
    }

    #[test]
    fn test_from_ring_square_area() {
        let geometry = from_ring(square_ring(tokyo_station(), 1000.0)).unwrap();
        assert!((geometry.area_km2() - 1.0).abs() < 0.01);
        assert!(matches!(geometry.mode(), GeometryMode::Freeform { ring } if ring.len() == 5));
    }

    #[test]
    fn test_ring_winding_does_not_change_area() {
        let ring = square_ring(tokyo_station(), 1000.0);
        let mut reversed = ring.clone();
        reversed.reverse();

        let ccw = from_ring(ring).unwrap();
        let cw = from_ring(reversed).unwrap();

        assert!((ccw.area_km2() - 1.0).abs() < 0.01);
        assert!((cw.area_km2() - ccw.area_km2()).abs() < 1e-9);
        assert_eq!(cw.bounding_box(), ccw.bounding_box());
    }

    #[test]
    fn test_antimeridian_crossing_rejected() {
        let fiji = Coordinate::new(179.999, -16.5).unwrap();
        assert!(matches!(
            build_circle(fiji, 1000.0, DEFAULT_CIRCLE_STEPS),
            Err(DensityError::InvalidInput { message }) if message.contains("antimeridian")
        ));

        let ring = vec![
            Coordinate::new(179.995, -16.505).unwrap(),
            Coordinate::new(-179.995, -16.505).unwrap(),
            Coordinate::new(-179.995, -16.495).unwrap(),
            Coordinate::new(179.995, -16.495).unwrap(),
            Coordinate::new(179.995, -16.505).unwrap(),
        ];
        assert!(from_ring(ring).is_err());

        // 靠近但不跨越
        let near = Coordinate::new(179.98, -16.5).unwrap();
        let geometry = build_circle(near, 1000.0, DEFAULT_CIRCLE_STEPS).unwrap();
        assert!((geometry.area_km2() - 3.1416).abs() < 0.03);
        assert!(geometry.bounding_box().max_lon < 180.0);
    }

    #[test]
    fn test_from_ring_validation() {
        let mut ring = square_ring(tokyo_station(), 1000.0);

        assert!(from_ring(ring[..3].to_vec()).is_err());

        let open = ring[..4].to_vec();
        assert!(matches!(
            from_ring(open),
            Err(DensityError::InvalidInput { message }) if message.contains("not closed")
        ));

        // 只有兩個不同頂點
        ring[2] = ring[1];
        ring[3] = ring[1];
        assert!(from_ring(ring).is_err());
    }

    #[test]
    fn test_build_dispatches_on_mode() {
        let circle = build(
            &GeometryMode::Circle {
                center: tokyo_station(),
                radius_meters: 500.0,
            },
            64,
        )
        .unwrap();
        assert_eq!(circle.vertex_count(), 65);

        let freeform = build(
            &GeometryMode::Freeform {
                ring: square_ring(tokyo_station(), 200.0),
            },
            64,
        )
        .unwrap();
        assert_eq!(freeform.vertex_count(), 5);
    }
}
