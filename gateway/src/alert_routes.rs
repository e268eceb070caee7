//! Hazard alert routes
//!
//! A feed failure answers 503 with `"status": "unknown"`; an empty alert
//! set answers 200 with no regions.

use axum::{
    extract::{Query, State},
    Json,
};
use hazard_overlay::flag_regions;
use serde::Serialize;

use crate::routes::{ApiError, RangeQuery, RegionView};
use crate::AppState;

#[derive(Serialize)]
pub struct AlertsResponse {
    pub status: &'static str,
    pub alert_count: usize,
    pub fetched_at: String,
    pub regions: Vec<String>,
}

/// Region identifiers currently under an alert
pub async fn get_alerts(State(state): State<AppState>) -> Result<Json<AlertsResponse>, ApiError> {
    let snapshot = state.alerts.active_regions().await?;

    Ok(Json(AlertsResponse {
        status: "ok",
        alert_count: snapshot.alert_count,
        fetched_at: snapshot.fetched_at.to_rfc3339(),
        regions: snapshot.regions.iter().cloned().collect(),
    }))
}

#[derive(Serialize)]
pub struct FlaggedView {
    #[serde(flatten)]
    pub region: RegionView,
    pub alerted: bool,
}

#[derive(Serialize)]
pub struct FlaggedResponse {
    pub status: &'static str,
    pub fetched_at: String,
    pub alerted_count: usize,
    pub regions: Vec<FlaggedView>,
}

/// Range-filtered regions, each flagged with its alert status
pub async fn flagged_regions(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<FlaggedResponse>, ApiError> {
    let (lo, hi) = range.bounds();
    let hits = state.store.filter(lo, hi)?;
    let snapshot = state.alerts.active_regions().await?;

    let regions: Vec<FlaggedView> = flag_regions(&snapshot, &hits)
        .into_iter()
        .map(|f| FlaggedView {
            region: RegionView::from(f.record),
            alerted: f.alerted,
        })
        .collect();

    Ok(Json(FlaggedResponse {
        status: "ok",
        fetched_at: snapshot.fetched_at.to_rfc3339(),
        alerted_count: regions.iter().filter(|r| r.alerted).count(),
        regions,
    }))
}
