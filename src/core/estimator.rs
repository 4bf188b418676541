use crate::config::EstimatorSettings;
use crate::core::fetcher::ResilientFetcher;
use crate::core::{containment, geometry, query, ElementSource};
use crate::domain::model::{AreaGeometry, DensityResult, GeometryMode};
use crate::utils::error::{ErrorReport, Result};
use crate::utils::monitor::StageMonitor;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// 已發布的估算結果，帶著觸發它的請求世代
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub generation: u64,
    pub outcome: std::result::Result<DensityResult, ErrorReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Published(Report),
    /// 較新的請求已經送出，這次結果被丟棄
    Superseded { generation: u64 },
}

/// 幾何 → 查詢 → 抓取 → 計數 → 分級
///
/// `submit` 可以被並行呼叫；每次呼叫取得一個遞增的世代編號，
/// 只有仍是最新世代的結果才會發布給訂閱者。
pub struct DensityEstimator<S: ElementSource> {
    source: S,
    settings: EstimatorSettings,
    monitor: StageMonitor,
    generation: AtomicU64,
    latest: watch::Sender<Option<Report>>,
}

impl DensityEstimator<ResilientFetcher> {
    pub fn from_settings(settings: &EstimatorSettings) -> Result<Self> {
        let fetcher = ResilientFetcher::new(
            settings.endpoints.clone(),
            settings.attempt_timeout,
            settings.backoff,
        )?;
        Ok(Self::new(fetcher, settings))
    }
}

impl<S: ElementSource> DensityEstimator<S> {
    pub fn new(source: S, settings: &EstimatorSettings) -> Self {
        Self::new_with_monitoring(source, settings, false)
    }

    pub fn new_with_monitoring(source: S, settings: &EstimatorSettings, monitor: bool) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            source,
            settings: settings.clone(),
            monitor: StageMonitor::new(monitor),
            generation: AtomicU64::new(0),
            latest,
        }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    pub fn geometry(&self, mode: &GeometryMode) -> Result<AreaGeometry> {
        let area = geometry::build(mode, self.settings.circle_steps)?;
        tracing::info!(
            "📐 Built area: {} vertices, {:.3} km²",
            area.vertex_count(),
            area.area_km2()
        );
        self.monitor.log_stage("geometry");
        Ok(area)
    }

    pub fn query(&self, area: &AreaGeometry) -> Result<String> {
        query::build_query(
            area,
            &self.settings.categories,
            self.settings.query_timeout_secs,
        )
    }

    pub async fn estimate(&self, area: &AreaGeometry) -> Result<DensityResult> {
        let query = self.query(area)?;

        tracing::info!("📡 Fetching POIs...");
        let elements = self.source.fetch(&query).await?;
        tracing::info!("Received {} elements", elements.len());
        self.monitor.log_stage("fetch");

        let poi_count = containment::count(elements, area);
        let result = self.settings.thresholds.result(poi_count, area.area_km2());
        self.monitor.log_stage("count");

        tracing::info!(
            "✅ {} POIs over {:.3} km² = {:.2}/km² ({})",
            result.poi_count,
            result.area_km2,
            result.poi_density,
            result.level
        );
        Ok(result)
    }

    pub async fn estimate_mode(&self, mode: &GeometryMode) -> Result<DensityResult> {
        let area = self.geometry(mode)?;
        self.estimate(&area).await
    }

    /// 送出新的區域；完成時若已有更新的請求，結果不發布
    pub async fn submit(&self, mode: &GeometryMode) -> Outcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Request generation {} started", generation);

        let outcome = self
            .estimate_mode(mode)
            .await
            .map_err(|e| {
                tracing::error!("❌ Estimation failed: {}", e);
                e.to_report()
            });

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding stale result for generation {}", generation);
            return Outcome::Superseded { generation };
        }

        let report = Report {
            generation,
            outcome,
        };
        let published = self.latest.send_if_modified(|current| {
            let newer = current
                .as_ref()
                .map_or(true, |existing| existing.generation < generation);
            if newer {
                *current = Some(report.clone());
            }
            newer
        });

        if published {
            Outcome::Published(report)
        } else {
            Outcome::Superseded { generation }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Report>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<Report> {
        self.latest.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::tests::{square_ring, tokyo_station};
    use crate::domain::model::{Coordinate, PoiElement, UrbanLevel};
    use crate::utils::error::{DensityError, ErrorKind};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    struct StaticSource {
        elements: Vec<PoiElement>,
        queries: Mutex<Vec<String>>,
    }

    impl StaticSource {
        fn new(elements: Vec<PoiElement>) -> Self {
            Self {
                elements,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ElementSource for StaticSource {
        async fn fetch(&self, query: &str) -> Result<Vec<PoiElement>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.elements.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ElementSource for FailingSource {
        async fn fetch(&self, _query: &str) -> Result<Vec<PoiElement>> {
            Err(DensityError::UpstreamError {
                endpoint: "http://mock".to_string(),
                status: Some(504),
                message: "HTTP 504".to_string(),
            })
        }
    }

    /// 半徑 1000 的查詢會卡住，直到測試放行
    struct GatedSource {
        started: Arc<Notify>,
        release: Arc<Notify>,
        elements: Vec<PoiElement>,
    }

    #[async_trait]
    impl ElementSource for GatedSource {
        async fn fetch(&self, query: &str) -> Result<Vec<PoiElement>> {
            if query.contains("around:1000,") {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(self.elements.clone())
        }
    }

    fn node(lon: f64, lat: f64) -> PoiElement {
        PoiElement::Point {
            coordinate: Coordinate::new(lon, lat).unwrap(),
        }
    }

    fn nodes_near_center(count: usize) -> Vec<PoiElement> {
        let center = tokyo_station();
        (0..count)
            .map(|i| node(center.lon() + i as f64 * 0.0001, center.lat()))
            .collect()
    }

    fn circle(radius_meters: f64) -> GeometryMode {
        GeometryMode::Circle {
            center: tokyo_station(),
            radius_meters,
        }
    }

    #[tokio::test]
    async fn test_estimate_circle_counts_only_inside_points() {
        let mut elements = nodes_near_center(31);
        elements.push(node(139.80, 35.70));
        elements.push(PoiElement::WayOrRelation { centroid: None });
        let estimator = DensityEstimator::new(StaticSource::new(elements), &EstimatorSettings::default());

        let result = estimator.estimate_mode(&circle(1000.0)).await.unwrap();

        assert_eq!(result.poi_count, 31);
        assert!((result.area_km2 - 3.1416).abs() < 0.03);
        assert_eq!(result.level, UrbanLevel::Suburban);

        let queries = estimator.source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("node[amenity](around:1000,35.6812,139.7671);"));
    }

    #[tokio::test]
    async fn test_estimate_freeform_square_is_urban() {
        let estimator =
            DensityEstimator::new(StaticSource::new(nodes_near_center(25)), &EstimatorSettings::default());
        let mode = GeometryMode::Freeform {
            ring: square_ring(tokyo_station(), 1000.0),
        };

        let result = estimator.estimate_mode(&mode).await.unwrap();

        assert_eq!(result.poi_count, 25);
        assert_eq!(result.level, UrbanLevel::Urban);
        assert!(estimator.source.queries.lock().unwrap()[0].contains("out skel center qt;"));
    }

    #[tokio::test]
    async fn test_invalid_geometry_never_reaches_source() {
        let estimator = DensityEstimator::new(StaticSource::new(vec![]), &EstimatorSettings::default());

        let err = estimator.estimate_mode(&circle(0.0)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(estimator.source.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_publishes_error_report() {
        let estimator = DensityEstimator::new(FailingSource, &EstimatorSettings::default());
        let mut receiver = estimator.subscribe();

        let outcome = estimator.submit(&circle(500.0)).await;

        let Outcome::Published(report) = outcome else {
            panic!("expected a published report");
        };
        assert_eq!(report.generation, 1);
        assert_eq!(report.outcome.unwrap_err().error_kind, ErrorKind::UpstreamError);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().as_ref().unwrap().generation, 1);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = GatedSource {
            started: started.clone(),
            release: release.clone(),
            elements: nodes_near_center(3),
        };
        let estimator = Arc::new(DensityEstimator::new(source, &EstimatorSettings::default()));

        let slow = tokio::spawn({
            let estimator = estimator.clone();
            async move { estimator.submit(&circle(1000.0)).await }
        });
        started.notified().await;

        let fast = estimator.submit(&circle(500.0)).await;
        release.notify_one();
        let slow = slow.await.unwrap();

        assert!(matches!(fast, Outcome::Published(Report { generation: 2, .. })));
        assert_eq!(slow, Outcome::Superseded { generation: 1 });

        let latest = estimator.latest().unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.outcome.unwrap().poi_count, 3);
    }

    #[tokio::test]
    async fn test_from_settings_rejects_empty_endpoints() {
        let settings = EstimatorSettings {
            endpoints: vec![],
            ..EstimatorSettings::default()
        };
        assert!(DensityEstimator::from_settings(&settings).is_err());
    }
}
