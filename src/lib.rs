pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{AreaCommand, CliConfig};
pub use config::{toml_config::TomlConfig, EstimatorSettings};

pub use core::estimator::{DensityEstimator, Outcome, Report};
pub use core::fetcher::ResilientFetcher;
pub use domain::model::{
    AreaGeometry, Coordinate, DensityResult, DensityThresholds, GeometryMode, PoiElement,
    TagCategory, UrbanLevel,
};
pub use utils::error::{DensityError, ErrorKind, ErrorReport, Result};
