use crate::domain::model::{DensityThresholds, PoiElement, TagCategory};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 地理資料來源：執行查詢並回傳元素
#[async_trait]
pub trait ElementSource: Send + Sync {
    async fn fetch(&self, query: &str) -> Result<Vec<PoiElement>>;
}

pub trait ConfigProvider: Send + Sync {
    fn endpoints(&self) -> Vec<String>;
    fn attempt_timeout(&self) -> Duration;
    fn backoff_base(&self) -> Duration;
    fn circle_steps(&self) -> usize;
    fn thresholds(&self) -> DensityThresholds;
    fn categories(&self) -> Vec<TagCategory>;
    fn query_timeout_secs(&self) -> u64;
}
