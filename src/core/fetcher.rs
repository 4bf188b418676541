//! Multi-endpoint Overpass fetcher.
//!
//! Endpoints are tried strictly in order, one attempt each, with a
//! per-attempt timeout. After a failed attempt on endpoint `i` the fetcher
//! sleeps `base * (i + 1)^2` before moving on. The first success wins; if
//! every endpoint fails, the last failure is returned unchanged.

use crate::domain::model::{Coordinate, PoiElement};
use crate::domain::ports::ElementSource;
use crate::utils::error::{DensityError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.private.coffee/api/interpreter",
];
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(25_000);
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// 端點 `endpoint_index` 失敗後的等待時間：`base * (i + 1)^2`
    pub fn delay_after(&self, endpoint_index: usize) -> Duration {
        let step = endpoint_index.saturating_add(1);
        let factor = u32::try_from(step.saturating_mul(step)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// 所有端點依序失敗時會經歷的等待序列（最後一個端點之後不等待）
    pub fn schedule(&self, endpoint_count: usize) -> Vec<Duration> {
        (0..endpoint_count.saturating_sub(1))
            .map(|i| self.delay_after(i))
            .collect()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE)
    }
}

/// 抓取流程的狀態機，`usize` 為端點索引
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Attempting(usize),
    Backoff(usize),
    Succeeded,
    Exhausted,
}

impl FetchState {
    pub fn start() -> Self {
        Self::Attempting(0)
    }

    pub fn on_success(self) -> Self {
        match self {
            Self::Attempting(_) => Self::Succeeded,
            other => other,
        }
    }

    pub fn on_failure(self, endpoint_count: usize) -> Self {
        match self {
            Self::Attempting(i) if i + 1 < endpoint_count => Self::Backoff(i),
            Self::Attempting(_) => Self::Exhausted,
            other => other,
        }
    }

    pub fn on_backoff_elapsed(self) -> Self {
        match self {
            Self::Backoff(i) => Self::Attempting(i + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<RawElement>,
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<RawCenter>,
}

#[derive(Debug, Deserialize)]
struct RawCenter {
    lat: f64,
    lon: f64,
}

/// 解析 `out:json` 回應；格式錯誤或伺服器端 runtime error 視為上游錯誤
pub fn parse_elements(endpoint: &str, body: &str) -> Result<Vec<PoiElement>> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| DensityError::UpstreamError {
            endpoint: endpoint.to_string(),
            status: None,
            message: format!("malformed JSON response: {}", e),
        })?;

    if let Some(remark) = response.remark.as_deref() {
        if remark.contains("runtime error") {
            return Err(DensityError::UpstreamError {
                endpoint: endpoint.to_string(),
                status: None,
                message: remark.to_string(),
            });
        }
        tracing::debug!("Overpass remark from {}: {}", endpoint, remark);
    }

    let mut elements = Vec::with_capacity(response.elements.len());
    let mut ignored = 0usize;
    for raw in response.elements {
        let element = match raw.kind.as_str() {
            "node" => match (raw.lon, raw.lat) {
                (Some(lon), Some(lat)) => Coordinate::new(lon, lat)
                    .ok()
                    .map(|coordinate| PoiElement::Point { coordinate }),
                _ => None,
            },
            "way" | "relation" => Some(PoiElement::WayOrRelation {
                centroid: raw
                    .center
                    .and_then(|c| Coordinate::new(c.lon, c.lat).ok()),
            }),
            _ => None,
        };

        match element {
            Some(element) => elements.push(element),
            None => ignored += 1,
        }
    }

    if ignored > 0 {
        tracing::debug!("Ignored {} elements without usable geometry", ignored);
    }
    Ok(elements)
}

pub struct ResilientFetcher {
    client: Client,
    endpoints: Vec<String>,
    attempt_timeout: Duration,
    backoff: BackoffPolicy,
}

impl ResilientFetcher {
    pub fn new(
        endpoints: Vec<String>,
        attempt_timeout: Duration,
        backoff: BackoffPolicy,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(DensityError::MissingConfigError {
                field: "fetcher.endpoints".to_string(),
            });
        }
        Ok(Self {
            client: Client::new(),
            endpoints,
            attempt_timeout,
            backoff,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub async fn fetch(&self, query: &str) -> Result<Vec<PoiElement>> {
        let endpoint_count = self.endpoints.len();
        let mut state = FetchState::start();
        let mut last_error: Option<DensityError> = None;

        // 成功時直接回傳；迴圈結束代表狀態為 Exhausted
        while !state.is_terminal() {
            state = match state {
                FetchState::Attempting(i) => {
                    let endpoint = &self.endpoints[i];
                    tracing::debug!("Attempt {}/{} against {}", i + 1, endpoint_count, endpoint);

                    match self.attempt(endpoint, query).await {
                        Ok(found) => {
                            tracing::info!(
                                "📡 {} returned {} elements",
                                endpoint,
                                found.len()
                            );
                            return Ok(found);
                        }
                        Err(e) => {
                            tracing::warn!(
                                "⚠️ Endpoint {}/{} failed ({}): {}",
                                i + 1,
                                endpoint_count,
                                endpoint,
                                e
                            );
                            last_error = Some(e);
                            state.on_failure(endpoint_count)
                        }
                    }
                }
                FetchState::Backoff(i) => {
                    let delay = self.backoff.delay_after(i);
                    tracing::debug!("Backing off {:?} before endpoint {}", delay, i + 2);
                    tokio::time::sleep(delay).await;
                    state.on_backoff_elapsed()
                }
                terminal => terminal,
            };
        }

        let error = last_error.unwrap_or_else(|| DensityError::MissingConfigError {
            field: "fetcher.endpoints".to_string(),
        });
        tracing::error!("❌ All {} endpoints failed, last error: {}", endpoint_count, error);
        Err(error)
    }

    async fn attempt(&self, endpoint: &str, query: &str) -> Result<Vec<PoiElement>> {
        let network_failure = |source: reqwest::Error| DensityError::NetworkFailure {
            endpoint: endpoint.to_string(),
            source,
        };

        // timeout 會在截止時取消整個請求（含讀取 body）
        let response = self
            .client
            .get(endpoint)
            .query(&[("data", query)])
            .timeout(self.attempt_timeout)
            .send()
            .await
            .map_err(network_failure)?;

        let status = response.status();
        tracing::debug!("Response status from {}: {}", endpoint, status);
        if !status.is_success() {
            return Err(DensityError::UpstreamError {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(network_failure)?;
        parse_elements(endpoint, &body)
    }
}

#[async_trait]
impl ElementSource for ResilientFetcher {
    async fn fetch(&self, query: &str) -> Result<Vec<PoiElement>> {
        ResilientFetcher::fetch(self, query).await
    }
}
