use crate::adapters::geojson::{ring_from_geojson, ring_from_pairs};
use crate::config::{default_endpoints, EstimatorSettings};
use crate::core::fetcher::{BackoffPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BACKOFF_BASE};
use crate::core::geometry::DEFAULT_CIRCLE_STEPS;
use crate::core::query::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::core::ConfigProvider;
use crate::domain::model::{Coordinate, DensityThresholds, GeometryMode, TagCategory};
use crate::utils::error::{DensityError, Result};
use crate::utils::validation::Validate;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "urban-density")]
#[command(about = "Estimate urban density from OpenStreetMap points of interest")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: AreaCommand,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Overpass endpoint, repeat to build a fallback list
    #[arg(long = "endpoint", global = true)]
    pub endpoints: Vec<String>,

    /// Per-endpoint attempt timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Backoff base in milliseconds
    #[arg(long, global = true)]
    pub backoff_ms: Option<u64>,

    /// Number of vertices used to approximate a circle
    #[arg(long, global = true)]
    pub steps: Option<usize>,

    /// Tag categories to count (amenity,shop,office,public_transport)
    #[arg(long, global = true, value_delimiter = ',')]
    pub categories: Vec<TagCategory>,

    /// Show the geometry and query without contacting Overpass
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the result as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Log CPU and memory usage after each stage
    #[arg(long, global = true)]
    pub monitor: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AreaCommand {
    /// Circle around a center point
    Circle {
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Radius in meters
        #[arg(long, default_value = "1000")]
        radius: f64,
    },
    /// Closed polygon drawn by the user
    #[command(group(ArgGroup::new("source").required(true).args(["ring", "geojson"])))]
    Polygon {
        /// Ring as "lon,lat;lon,lat;..." with the first point repeated at the end
        #[arg(long, allow_hyphen_values = true)]
        ring: Option<String>,
        /// GeoJSON file holding a Polygon
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
}

impl AreaCommand {
    pub fn to_mode(&self) -> Result<GeometryMode> {
        match self {
            Self::Circle { lon, lat, radius } => Ok(GeometryMode::Circle {
                center: Coordinate::new(*lon, *lat)?,
                radius_meters: *radius,
            }),
            Self::Polygon { ring: Some(ring), .. } => Ok(GeometryMode::Freeform {
                ring: ring_from_pairs(ring)?,
            }),
            Self::Polygon {
                geojson: Some(path),
                ..
            } => {
                let content = std::fs::read_to_string(path)?;
                Ok(GeometryMode::Freeform {
                    ring: ring_from_geojson(&content)?,
                })
            }
            Self::Polygon { .. } => Err(DensityError::invalid_input(
                "polygon needs either --ring or --geojson",
            )),
        }
    }
}

impl CliConfig {
    /// 命令列有指定的值覆蓋 TOML 設定
    pub fn apply_overrides(&self, settings: &mut EstimatorSettings) {
        if !self.endpoints.is_empty() {
            tracing::info!("🔧 Endpoints overridden from command line");
            settings.endpoints = self.endpoints.clone();
        }
        if let Some(ms) = self.timeout_ms {
            settings.attempt_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.backoff_ms {
            settings.backoff = BackoffPolicy::new(Duration::from_millis(ms));
        }
        if let Some(steps) = self.steps {
            settings.circle_steps = steps;
        }
        if !self.categories.is_empty() {
            settings.categories = self.categories.clone();
        }
    }
}

impl ConfigProvider for CliConfig {
    fn endpoints(&self) -> Vec<String> {
        if self.endpoints.is_empty() {
            default_endpoints()
        } else {
            self.endpoints.clone()
        }
    }

    fn attempt_timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT)
    }

    fn backoff_base(&self) -> Duration {
        self.backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BACKOFF_BASE)
    }

    fn circle_steps(&self) -> usize {
        self.steps.unwrap_or(DEFAULT_CIRCLE_STEPS)
    }

    fn thresholds(&self) -> DensityThresholds {
        DensityThresholds::default()
    }

    fn categories(&self) -> Vec<TagCategory> {
        if self.categories.is_empty() {
            TagCategory::ALL.to_vec()
        } else {
            self.categories.clone()
        }
    }

    fn query_timeout_secs(&self) -> u64 {
        DEFAULT_QUERY_TIMEOUT_SECS
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        EstimatorSettings::from_provider(self).validate()
    }
}
