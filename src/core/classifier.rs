use crate::domain::model::{DensityResult, DensityThresholds, UrbanLevel};

/// 退化區域（面積趨近 0）的下限，km²
pub const MIN_AREA_KM2: f64 = 1e-6;

pub fn density(poi_count: usize, area_km2: f64) -> f64 {
    poi_count as f64 / area_km2.max(MIN_AREA_KM2)
}

pub fn classify(poi_count: usize, area_km2: f64) -> UrbanLevel {
    DensityThresholds::default().level_for(density(poi_count, area_km2))
}

impl DensityThresholds {
    pub fn level_for(&self, density: f64) -> UrbanLevel {
        if density >= self.urban_min {
            UrbanLevel::Urban
        } else if density >= self.suburban_min {
            UrbanLevel::Suburban
        } else {
            UrbanLevel::Rural
        }
    }

    pub fn classify(&self, poi_count: usize, area_km2: f64) -> UrbanLevel {
        self.level_for(density(poi_count, area_km2))
    }

    pub fn result(&self, poi_count: usize, area_km2: f64) -> DensityResult {
        let poi_density = density(poi_count, area_km2);
        DensityResult {
            area_km2,
            poi_count,
            poi_density,
            level: self.level_for(poi_density),
        }
    }
}
