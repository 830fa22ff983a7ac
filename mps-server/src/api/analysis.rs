//! Matrix profile analysis endpoints
//!
//! Handlers only translate HTTP into [`QueryRouter`](crate::router::QueryRouter)
//! calls; validation and error mapping happen there.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::router::{AnnotationResponse, DiscordsResponse, MotifsResponse, Segmentation};
use crate::session::SessionId;
use crate::AppState;

/// POST /api/v1/calculate body
#[derive(Debug, Deserialize, Serialize)]
pub struct CalculateRequest {
    /// Window length
    pub m: i64,
}

/// GET /api/v1/topkmotifs query
#[derive(Debug, Deserialize)]
pub struct MotifQuery {
    pub k: Option<i64>,
    pub r: Option<f64>,
}

/// GET /api/v1/topkdiscords query
#[derive(Debug, Deserialize)]
pub struct DiscordQuery {
    pub k: Option<i64>,
}

/// POST /api/v1/mp body; a missing name selects the default vector
#[derive(Debug, Deserialize, Serialize)]
pub struct AnnotationRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

fn required<T>(value: Option<T>, name: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::InvalidParameter(format!("missing query parameter `{name}`")))
}

/// GET /api/v1/data
pub async fn get_data(State(state): State<AppState>) -> ApiResult<Json<Vec<f64>>> {
    Ok(Json(state.router.data().await?))
}

/// POST /api/v1/calculate
pub async fn calculate(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> ApiResult<Json<Segmentation>> {
    let Json(request) = body?;
    Ok(Json(state.router.compute(&session, request.m).await?))
}

/// GET /api/v1/topkmotifs?k=&r=
pub async fn top_k_motifs(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    query: Result<Query<MotifQuery>, QueryRejection>,
) -> ApiResult<Json<MotifsResponse>> {
    let Query(query) = query?;
    let k = required(query.k, "k")?;
    let r = required(query.r, "r")?;
    Ok(Json(state.router.top_k_motifs(&session, k, r).await?))
}

/// GET /api/v1/topkdiscords?k=
pub async fn top_k_discords(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    query: Result<Query<DiscordQuery>, QueryRejection>,
) -> ApiResult<Json<DiscordsResponse>> {
    let Query(query) = query?;
    let k = required(query.k, "k")?;
    Ok(Json(state.router.top_k_discords(&session, k).await?))
}

/// POST /api/v1/mp
pub async fn set_annotation_vector(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    body: Result<Json<AnnotationRequest>, JsonRejection>,
) -> ApiResult<Json<AnnotationResponse>> {
    let Json(request) = body?;
    Ok(Json(state.router.set_annotation_vector(&session, &request.name).await?))
}

/// DELETE /api/v1/session
pub async fn discard_session(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> ApiResult<Json<StatusResponse>> {
    state.router.discard(&session).await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// Build analysis routes (mounted under /api/v1)
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/data", get(get_data))
        .route("/calculate", post(calculate))
        .route("/topkmotifs", get(top_k_motifs))
        .route("/topkdiscords", get(top_k_discords))
        .route("/mp", post(set_annotation_vector))
        .route("/session", delete(discard_session))
}
