use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DensityError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Network failure at {endpoint}: {source}")]
    NetworkFailure {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream error from {endpoint}: {message}")]
    UpstreamError {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("GeoJSON error: {0}")]
    GeoJsonError(#[from] geojson::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 對外回報的錯誤類別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NetworkFailure,
    UpstreamError,
    Config,
}

/// 交給呈現層的錯誤摘要 `{ error_kind, message }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error_kind: ErrorKind,
    pub message: String,
}

impl DensityError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } | Self::GeoJsonError(_) => ErrorKind::InvalidInput,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::UpstreamError { .. } | Self::SerializationError(_) => ErrorKind::UpstreamError,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::IoError(_) => ErrorKind::Config,
        }
    }

    /// 網路層錯誤可以換下一個端點重試，其餘立即回報
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkFailure | ErrorKind::UpstreamError
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NetworkFailure { source, .. } if source.is_timeout())
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error_kind: self.kind(),
            message: self.to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidInput { message } => format!("The requested area is not usable: {}", message),
            Self::GeoJsonError(e) => format!("Could not read the polygon: {}", e),
            Self::NetworkFailure { endpoint, source } if source.is_timeout() => {
                format!("The geodata service at {} timed out", endpoint)
            }
            Self::NetworkFailure { endpoint, .. } => {
                format!("Could not reach the geodata service at {}", endpoint)
            }
            Self::UpstreamError {
                endpoint,
                status: Some(status),
                ..
            } => format!("The geodata service at {} answered with HTTP {}", endpoint, status),
            Self::UpstreamError { endpoint, message, .. } => {
                format!("Unexpected response from {}: {}", endpoint, message)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => {
                "Check that the center lies within WGS84 bounds, the radius is positive and the ring is closed"
            }
            ErrorKind::NetworkFailure => {
                "All endpoints failed; check connectivity or add another Overpass endpoint"
            }
            ErrorKind::UpstreamError => {
                "The Overpass servers may be overloaded; retry later or try a smaller area"
            }
            ErrorKind::Config => "Review the configuration file and command-line flags",
        }
    }

    /// 給終端使用者的兩行訊息：錯誤與建議各一次
    pub fn console_report(&self) -> String {
        format!(
            "❌ {}\n💡 Suggestion: {}",
            self.user_friendly_message(),
            self.recovery_suggestion()
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::Config => 1,
            ErrorKind::NetworkFailure | ErrorKind::UpstreamError => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, DensityError>;
