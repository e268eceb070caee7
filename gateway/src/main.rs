use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use hazard_overlay::{AlertFeed, AlertFeedConfig, AlertOverlay, NwsAlertFeed};
use resilience_query::ReferenceStore;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod alert_routes;
mod routes;

pub type SharedOverlay = AlertOverlay<Box<dyn AlertFeed>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReferenceStore>,
    pub alerts: Arc<SharedOverlay>,
}

/// Gateway settings read from the environment
#[derive(Debug, Clone)]
struct GatewayConfig {
    table_path: PathBuf,
    boundaries_path: Option<PathBuf>,
    alerts: AlertFeedConfig,
    port: String,
}

impl GatewayConfig {
    fn from_env() -> Self {
        let mut alerts = AlertFeedConfig::default();
        if let Ok(area) = std::env::var("CRI_ALERT_AREA") {
            alerts.area = area;
        }
        if let Ok(prefix) = std::env::var("CRI_ALERT_STATE_FIPS") {
            alerts.state_prefix = prefix;
        }

        Self {
            table_path: std::env::var("CRI_TABLE_PATH")
                .unwrap_or_else(|_| "data/community_resilience_index.csv".to_string())
                .into(),
            boundaries_path: std::env::var("CRI_BOUNDARIES_PATH").ok().map(PathBuf::from),
            alerts,
            port: std::env::var("CRI_GATEWAY_PORT")
                .or_else(|_| std::env::var("PORT"))
                .unwrap_or_else(|_| "18640".to_string()),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/regions", get(routes::list_regions))
        .route("/regions/:fips", get(routes::get_region))
        .route("/regions/:fips/nearby", get(routes::nearby_regions))
        .route("/query", get(routes::run_query))
        .route("/clusters", get(routes::get_clusters))
        .route("/alerts", get(alert_routes::get_alerts))
        .route("/alerts/regions", get(alert_routes::flagged_regions));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "resilience_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    let store = ReferenceStore::load(&config.table_path, config.boundaries_path.as_deref())
        .with_context(|| format!("loading reference data from {:?}", config.table_path))?;
    tracing::info!("   Loaded {} regions", store.len());
    if config.boundaries_path.is_none() {
        tracing::warn!("   CRI_BOUNDARIES_PATH not set - radius queries will report unknown regions");
    }

    let feed: Box<dyn AlertFeed> = Box::new(NwsAlertFeed::new(config.alerts.clone())?);
    let alerts = AlertOverlay::with_config(feed, &config.alerts);
    tracing::info!(
        "   Alert feed: {} (state {}, cache {}s)",
        config.alerts.alerts_url(),
        config.alerts.state_prefix,
        config.alerts.cache_ttl_sec
    );

    let state = AppState {
        store: Arc::new(store),
        alerts: Arc::new(alerts),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Resilience Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "resilience-gateway",
        "regions": state.store.len(),
        "centroids": state.store.centroids().len(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use hazard_overlay::{ActiveAlert, AlertError};
    use resilience_pipeline::CriRecord;
    use resilience_query::{Centroid, CentroidIndex};
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticFeed(Option<Vec<&'static str>>);

    #[async_trait]
    impl AlertFeed for StaticFeed {
        async fn fetch_active(&self) -> hazard_overlay::Result<Vec<ActiveAlert>> {
            match &self.0 {
                Some(codes) => Ok(vec![ActiveAlert {
                    event: Some("Flood Warning".to_string()),
                    severity: None,
                    headline: None,
                    location_codes: codes.iter().map(|c| c.to_string()).collect(),
                }]),
                None => Err(AlertError::FeedUnavailable("connection refused".to_string())),
            }
        }
    }

    fn record(county: &str, name: &str, cri: f64) -> CriRecord {
        CriRecord {
            state_id: "13".to_string(),
            state_name: "Georgia".to_string(),
            region_id: county.to_string(),
            region_name: name.to_string(),
            socioeconomic_resilience: Some(cri),
            food_resilience: Some(cri),
            healthcare_resilience: Some(cri),
            cri: Some(cri),
        }
    }

    fn state(feed: StaticFeed) -> AppState {
        let records = vec![
            record("001", "A", 0.7),
            record("003", "B", 0.5),
            record("005", "C", 1.0 / 3.0),
        ];
        let centroids = CentroidIndex::new(HashMap::from([
            ("13001".to_string(), Centroid { lat: 33.7, lon: -84.4 }),
            ("13003".to_string(), Centroid { lat: 33.9, lon: -84.4 }),
        ]));
        let feed: Box<dyn AlertFeed> = Box::new(feed);
        AppState {
            store: Arc::new(ReferenceStore::new(records, centroids)),
            alerts: Arc::new(AlertOverlay::new(feed, "13", Duration::from_secs(300))),
        }
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(state(StaticFeed(Some(vec![]))), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["regions"], 3);
    }

    #[tokio::test]
    async fn test_range_filter_rounds_for_display() {
        let (status, body) =
            get_json(state(StaticFeed(Some(vec![]))), "/api/v1/regions?lo=0.3&hi=0.6").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["regions"][0]["region_name"], "B");
        assert_eq!(body["regions"][1]["cri"], 0.3333);
    }

    #[tokio::test]
    async fn test_phrase_query() {
        let (status, body) =
            get_json(state(StaticFeed(Some(vec![]))), "/api/v1/query?q=between%200.4%20and%201").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lo"], 0.4);
        assert_eq!(body["count"], 2);

        let (status, body) =
            get_json(state(StaticFeed(Some(vec![]))), "/api/v1/query?q=most%20resilient").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("most resilient"));
    }

    #[tokio::test]
    async fn test_region_detail_and_unknown() {
        let (status, body) = get_json(state(StaticFeed(Some(vec![]))), "/api/v1/regions/13003").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fips"], "13003");

        let (status, _) = get_json(state(StaticFeed(Some(vec![]))), "/api/v1/regions/13999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_nearby() {
        let (status, body) = get_json(
            state(StaticFeed(Some(vec![]))),
            "/api/v1/regions/13001/nearby?radius_miles=20",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["regions"].as_array().unwrap().len(), 2);

        // C has no centroid
        let (status, _) =
            get_json(state(StaticFeed(Some(vec![]))), "/api/v1/regions/13005/nearby").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clusters_insufficient() {
        let (status, body) = get_json(state(StaticFeed(Some(vec![]))), "/api/v1/clusters?k=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["centers"].as_array().unwrap().len(), 2);

        let (status, _) = get_json(state(StaticFeed(Some(vec![]))), "/api/v1/clusters?k=4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_alerts_flagged() {
        let (status, body) =
            get_json(state(StaticFeed(Some(vec!["13003", "013003"]))), "/api/v1/alerts/regions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let flags: Vec<bool> = body["regions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["alerted"].as_bool().unwrap())
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_feed_unavailable_is_unknown_not_empty() {
        let (status, body) = get_json(state(StaticFeed(None)), "/api/v1/alerts").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unknown");
        assert!(body.get("regions").is_none());
    }
}
