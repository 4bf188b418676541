use crate::domain::model::{AreaGeometry, GeometryMode, TagCategory};
use crate::utils::error::{DensityError, Result};
use std::fmt::Write;

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 25;

/// 產生 Overpass QL 查詢字串
///
/// 圓形區域使用 `around` 語法，只查 node；任意多邊形使用 `poly` 語法，
/// 同時查 node/way/relation 並要求回傳 way/relation 的中心點。
pub fn build_query(
    geometry: &AreaGeometry,
    categories: &[TagCategory],
    timeout_secs: u64,
) -> Result<String> {
    if categories.is_empty() {
        return Err(DensityError::invalid_input(
            "at least one tag category is required",
        ));
    }
    if geometry.vertex_count() == 0 {
        return Err(DensityError::invalid_input("geometry has no vertices"));
    }

    let mut query = format!("[out:json][timeout:{}];\n(\n", timeout_secs);

    let output = match geometry.mode() {
        GeometryMode::Circle {
            center,
            radius_meters,
        } => {
            let filter = format!("(around:{},{},{})", radius_meters, center.lat(), center.lon());
            for category in categories {
                let _ = writeln!(query, "  node[{}]{};", category, filter);
            }
            "out skel qt;"
        }
        GeometryMode::Freeform { .. } => {
            let filter = format!("(poly:\"{}\")", poly_ring(geometry));
            for category in categories {
                for element_type in ["node", "way", "relation"] {
                    let _ = writeln!(query, "  {}[{}]{};", element_type, category, filter);
                }
            }
            "out skel center qt;"
        }
    };

    query.push_str(");\n");
    query.push_str(output);

    tracing::debug!("Built Overpass query ({} bytes)", query.len());
    Ok(query)
}

/// `poly` 需要「緯度 經度」交錯排列，收尾重複點省略
fn poly_ring(geometry: &AreaGeometry) -> String {
    let count = geometry.vertex_count();
    let take = if count > 1 { count - 1 } else { count };
    geometry
        .vertices()
        .take(take)
        .map(|c| format!("{} {}", c.y, c.x))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::tests::{square_ring, tokyo_station};
    use crate::core::geometry::{build_circle, from_ring, DEFAULT_CIRCLE_STEPS};
    use crate::domain::model::Coordinate;

    #[test]
    fn test_circle_query_uses_around_on_nodes_only() {
        let geometry = build_circle(tokyo_station(), 1000.0, DEFAULT_CIRCLE_STEPS).unwrap();
        let query = build_query(&geometry, &TagCategory::ALL, DEFAULT_QUERY_TIMEOUT_SECS).unwrap();

        assert_eq!(
            query,
            "[out:json][timeout:25];\n(\n\
             \x20 node[amenity](around:1000,35.6812,139.7671);\n\
             \x20 node[shop](around:1000,35.6812,139.7671);\n\
             \x20 node[office](around:1000,35.6812,139.7671);\n\
             \x20 node[public_transport](around:1000,35.6812,139.7671);\n\
             );\nout skel qt;"
        );
        assert!(!query.contains("way["));
        assert!(!query.contains("poly:"));
    }

    #[test]
    fn test_freeform_query_uses_poly_with_lat_first() {
        let ring = vec![
            Coordinate::new(10.0, 50.0).unwrap(),
            Coordinate::new(10.5, 50.0).unwrap(),
            Coordinate::new(10.5, 50.5).unwrap(),
            Coordinate::new(10.0, 50.0).unwrap(),
        ];
        let geometry = from_ring(ring).unwrap();
        let query = build_query(&geometry, &[TagCategory::Shop], 25).unwrap();

        let poly = "(poly:\"50 10 50 10.5 50.5 10.5\")";
        assert!(query.contains(&format!("node[shop]{};", poly)));
        assert!(query.contains(&format!("way[shop]{};", poly)));
        assert!(query.contains(&format!("relation[shop]{};", poly)));
        assert!(query.ends_with("out skel center qt;"));
        assert!(!query.contains("around:"));
    }

    #[test]
    fn test_freeform_query_has_three_clauses_per_category() {
        let geometry = from_ring(square_ring(tokyo_station(), 1000.0)).unwrap();
        let query = build_query(&geometry, &TagCategory::ALL, 60).unwrap();

        assert!(query.starts_with("[out:json][timeout:60];"));
        assert_eq!(query.matches("(poly:").count(), 12);
        for category in TagCategory::ALL {
            assert!(query.contains(&format!("relation[{}](poly:", category)));
        }
    }

    #[test]
    fn test_empty_categories_rejected() {
        let geometry = build_circle(tokyo_station(), 500.0, DEFAULT_CIRCLE_STEPS).unwrap();
        assert!(matches!(
            build_query(&geometry, &[], 25),
            Err(DensityError::InvalidInput { .. })
        ));
    }
}
