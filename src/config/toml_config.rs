use crate::config::{default_endpoints, EstimatorSettings};
use crate::core::fetcher::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BACKOFF_BASE};
use crate::core::geometry::DEFAULT_CIRCLE_STEPS;
use crate::core::query::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::core::ConfigProvider;
use crate::domain::model::{DensityThresholds, TagCategory};
use crate::utils::error::{DensityError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub fetcher: FetcherConfig,
    pub query: Option<QueryConfig>,
    pub geometry: Option<GeometryConfig>,
    pub classifier: Option<ClassifierConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    pub attempt_timeout_ms: Option<u64>,
    pub backoff_base_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub categories: Option<Vec<TagCategory>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub circle_steps: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub suburban_min: Option<f64>,
    pub urban_min: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DensityError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OVERPASS_URL})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DensityError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn settings(&self) -> EstimatorSettings {
        EstimatorSettings::from_provider(self)
    }

    pub fn verbose_logging(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn endpoints(&self) -> Vec<String> {
        self.fetcher.endpoints.clone()
    }

    fn attempt_timeout(&self) -> Duration {
        self.fetcher
            .attempt_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT)
    }

    fn backoff_base(&self) -> Duration {
        self.fetcher
            .backoff_base_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BACKOFF_BASE)
    }

    fn circle_steps(&self) -> usize {
        self.geometry
            .as_ref()
            .and_then(|g| g.circle_steps)
            .unwrap_or(DEFAULT_CIRCLE_STEPS)
    }

    fn thresholds(&self) -> DensityThresholds {
        let defaults = DensityThresholds::default();
        match &self.classifier {
            Some(c) => DensityThresholds {
                suburban_min: c.suburban_min.unwrap_or(defaults.suburban_min),
                urban_min: c.urban_min.unwrap_or(defaults.urban_min),
            },
            None => defaults,
        }
    }

    fn categories(&self) -> Vec<TagCategory> {
        self.query
            .as_ref()
            .and_then(|q| q.categories.clone())
            .unwrap_or_else(|| TagCategory::ALL.to_vec())
    }

    fn query_timeout_secs(&self) -> u64 {
        self.query
            .as_ref()
            .and_then(|q| q.timeout_secs)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.settings().validate()
    }
}
