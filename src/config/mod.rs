#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::fetcher::{
    BackoffPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BACKOFF_BASE, DEFAULT_ENDPOINTS,
};
use crate::core::geometry::DEFAULT_CIRCLE_STEPS;
use crate::core::query::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::core::ConfigProvider;
use crate::domain::model::{DensityThresholds, TagCategory};
use crate::utils::error::{DensityError, Result};
use crate::utils::validation::{
    validate_endpoints, validate_non_empty, validate_positive_number, validate_range, Validate,
};
use std::time::Duration;

const MAX_CIRCLE_STEPS: usize = 4096;

pub fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
}

/// 估算器執行期間使用的設定快照
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorSettings {
    pub endpoints: Vec<String>,
    pub attempt_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub circle_steps: usize,
    pub thresholds: DensityThresholds,
    pub categories: Vec<TagCategory>,
    pub query_timeout_secs: u64,
}

impl EstimatorSettings {
    pub fn from_provider<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        Self {
            endpoints: config.endpoints(),
            attempt_timeout: config.attempt_timeout(),
            backoff: BackoffPolicy::new(config.backoff_base()),
            circle_steps: config.circle_steps(),
            thresholds: config.thresholds(),
            categories: config.categories(),
            query_timeout_secs: config.query_timeout_secs(),
        }
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            backoff: BackoffPolicy::new(DEFAULT_BACKOFF_BASE),
            circle_steps: DEFAULT_CIRCLE_STEPS,
            thresholds: DensityThresholds::default(),
            categories: TagCategory::ALL.to_vec(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl ConfigProvider for EstimatorSettings {
    fn endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }

    fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    fn backoff_base(&self) -> Duration {
        self.backoff.base()
    }

    fn circle_steps(&self) -> usize {
        self.circle_steps
    }

    fn thresholds(&self) -> DensityThresholds {
        self.thresholds
    }

    fn categories(&self) -> Vec<TagCategory> {
        self.categories.clone()
    }

    fn query_timeout_secs(&self) -> u64 {
        self.query_timeout_secs
    }
}

impl Validate for EstimatorSettings {
    fn validate(&self) -> Result<()> {
        validate_endpoints("fetcher.endpoints", &self.endpoints)?;
        validate_positive_number(
            "fetcher.attempt_timeout_ms",
            u64::try_from(self.attempt_timeout.as_millis()).unwrap_or(u64::MAX),
            1,
        )?;
        validate_range("geometry.circle_steps", self.circle_steps, 3, MAX_CIRCLE_STEPS)?;
        validate_positive_number("query.timeout_secs", self.query_timeout_secs, 1)?;
        validate_non_empty("query.categories", &self.categories)?;

        let DensityThresholds {
            suburban_min,
            urban_min,
        } = self.thresholds;
        if !(suburban_min > 0.0 && suburban_min < urban_min && urban_min.is_finite()) {
            return Err(DensityError::InvalidConfigValueError {
                field: "classifier".to_string(),
                value: format!("suburban_min={}, urban_min={}", suburban_min, urban_min),
                reason: "Thresholds must satisfy 0 < suburban_min < urban_min".to_string(),
            });
        }
        Ok(())
    }
}
