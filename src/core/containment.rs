//! Point-in-polygon counting.
//!
//! Boundary policy: inclusive. A representative point lying exactly on the
//! ring counts as inside, which matches how the `poly` filter selects
//! elements server-side.

use crate::domain::model::{AreaGeometry, PoiElement};
use geo::coordinate_position::{CoordPos, CoordinatePosition};

pub fn count<I>(elements: I, geometry: &AreaGeometry) -> usize
where
    I: IntoIterator<Item = PoiElement>,
{
    let polygon = geometry.polygon();
    let mut skipped = 0usize;

    let inside = elements
        .into_iter()
        .filter_map(|element| {
            let point = element.representative();
            if point.is_none() {
                skipped += 1;
            }
            point
        })
        .filter(|coordinate| {
            polygon.coordinate_position(&geo::Coord::from(*coordinate)) != CoordPos::Outside
        })
        .count();

    if skipped > 0 {
        tracing::debug!("Skipped {} ways/relations without a centroid", skipped);
    }
    inside
}
