//! Region query routes
//!
//! Every response carries display-rounded scores; the store keeps full
//! precision.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hazard_overlay::AlertError;
use resilience_pipeline::{round_for_display, CriRecord};
use resilience_query::cluster::{ClusterAssignment, ClusterCenter, DEFAULT_CLUSTERS};
use resilience_query::phrase::{CRI_MAX, CRI_MIN};
use resilience_query::QueryError;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Radius used when the caller gives none
pub const DEFAULT_RADIUS_MILES: f64 = 25.0;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
}

/// Error returned by a route, rendered as JSON
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, label: &'static str, error: impl ToString) -> Self {
        Self {
            status,
            body: ErrorResponse {
                status: label,
                error: error.to_string(),
            },
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match e {
            QueryError::UnparsableQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::UnknownRegion(_) => StatusCode::NOT_FOUND,
            QueryError::InsufficientData { .. } | QueryError::InvalidRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, "error", e)
    }
}

impl From<AlertError> for ApiError {
    fn from(e: AlertError) -> Self {
        match e {
            // Never reported as "no alerts"
            AlertError::FeedUnavailable(_) => Self::new(StatusCode::SERVICE_UNAVAILABLE, "unknown", e),
            AlertError::Client(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "error", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// One region as shown to a client
#[derive(Serialize)]
pub struct RegionView {
    pub fips: String,
    pub state_id: String,
    pub state_name: String,
    pub region_id: String,
    pub region_name: String,
    pub socioeconomic_resilience: Option<f64>,
    pub food_resilience: Option<f64>,
    pub healthcare_resilience: Option<f64>,
    pub cri: Option<f64>,
}

impl From<&CriRecord> for RegionView {
    fn from(r: &CriRecord) -> Self {
        Self {
            fips: r.fips(),
            state_id: r.state_id.clone(),
            state_name: r.state_name.clone(),
            region_id: r.region_id.clone(),
            region_name: r.region_name.clone(),
            socioeconomic_resilience: r.socioeconomic_resilience.map(round_for_display),
            food_resilience: r.food_resilience.map(round_for_display),
            healthcare_resilience: r.healthcare_resilience.map(round_for_display),
            cri: r.cri.map(round_for_display),
        }
    }
}

#[derive(Deserialize)]
pub struct RangeQuery {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl RangeQuery {
    pub fn bounds(&self) -> (f64, f64) {
        (self.lo.unwrap_or(CRI_MIN), self.hi.unwrap_or(CRI_MAX))
    }
}

#[derive(Serialize)]
pub struct RegionsResponse {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub regions: Vec<RegionView>,
}

impl RegionsResponse {
    fn new(lo: f64, hi: f64, hits: &[&CriRecord]) -> Self {
        Self {
            lo,
            hi,
            count: hits.len(),
            regions: hits.iter().map(|&r| RegionView::from(r)).collect(),
        }
    }
}

/// Regions with CRI inside `[lo, hi]`, highest first
pub async fn list_regions(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<RegionsResponse>, ApiError> {
    let (lo, hi) = range.bounds();
    let hits = state.store.filter(lo, hi)?;
    Ok(Json(RegionsResponse::new(lo, hi, &hits)))
}

pub async fn get_region(
    State(state): State<AppState>,
    Path(fips): Path<String>,
) -> Result<Json<RegionView>, ApiError> {
    let record = state.store.region(&fips)?;
    Ok(Json(RegionView::from(record)))
}

#[derive(Deserialize)]
pub struct PhraseQuery {
    pub q: String,
}

#[derive(Serialize)]
pub struct PhraseResponse {
    pub query: String,
    #[serde(flatten)]
    pub result: RegionsResponse,
}

/// Free-text range query, e.g. `?q=between 0.4 and 0.6`
pub async fn run_query(
    State(state): State<AppState>,
    Query(params): Query<PhraseQuery>,
) -> Result<Json<PhraseResponse>, ApiError> {
    let ((lo, hi), hits) = state.store.query(&params.q)?;
    Ok(Json(PhraseResponse {
        query: params.q,
        result: RegionsResponse::new(lo, hi, &hits),
    }))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub radius_miles: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyRegion {
    #[serde(flatten)]
    pub region: RegionView,
    pub distance_miles: f64,
}

#[derive(Serialize)]
pub struct NearbyResponse {
    pub center: String,
    pub radius_miles: f64,
    pub regions: Vec<NearbyRegion>,
}

pub async fn nearby_regions(
    State(state): State<AppState>,
    Path(fips): Path<String>,
    Query(params): Query<NearbyQuery>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let radius_miles = params.radius_miles.unwrap_or(DEFAULT_RADIUS_MILES);
    let hits = state.store.nearby(&fips, radius_miles)?;

    Ok(Json(NearbyResponse {
        center: fips,
        radius_miles,
        regions: hits
            .iter()
            .map(|n| NearbyRegion {
                region: RegionView::from(n.record),
                distance_miles: round_for_display(n.distance_miles),
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct ClusterQuery {
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct ClusterResponse {
    pub k: usize,
    pub iterations: usize,
    pub unlabeled: usize,
    pub centers: Vec<ClusterCenter>,
    pub assignments: Vec<ClusterAssignment>,
}

pub async fn get_clusters(
    State(state): State<AppState>,
    Query(params): Query<ClusterQuery>,
) -> Result<Json<ClusterResponse>, ApiError> {
    let k = params.k.unwrap_or(DEFAULT_CLUSTERS);
    let result = state.store.cluster(k)?;

    Ok(Json(ClusterResponse {
        k,
        iterations: result.iterations,
        unlabeled: result.unlabeled,
        centers: result.centers,
        assignments: result.assignments,
    }))
}
