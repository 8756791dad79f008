//! Route handlers.

use crate::errors::QuotagateError;
use crate::policy::Authorization;
use crate::protocol::models::{
    Envelope, GeneratePayload, GenerateQuery, GenerateRequest, LicenseUpsert, UpsertResponse,
};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use tracing::info;

/// GET /health - liveness probe, not gated.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /v1/generate
pub async fn generate_get(
    State(state): State<AppState>,
    Extension(authorization): Extension<Authorization>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<Envelope>, QuotagateError> {
    forward(&state, &authorization, query.into_request()).await
}

/// POST /v1/generate
pub async fn generate_post(
    State(state): State<AppState>,
    Extension(authorization): Extension<Authorization>,
    payload: Result<Json<GeneratePayload>, JsonRejection>,
) -> Result<Json<Envelope>, QuotagateError> {
    let Json(payload) = payload.map_err(|e| QuotagateError::InvalidRequest(e.body_text()))?;
    forward(&state, &authorization, payload.into_request()?).await
}

/// POST /v1/licenses - create or replace a license record.
pub async fn upsert_license(
    State(state): State<AppState>,
    body: Result<Json<LicenseUpsert>, JsonRejection>,
) -> Result<Json<UpsertResponse>, QuotagateError> {
    let Json(body) = body.map_err(|e| QuotagateError::InvalidRequest(e.body_text()))?;
    let (key, license) = body.into_record(state.config.default_daily_limit)?;

    state.gate.registry().upsert(&key, license).await?;
    Ok(Json(UpsertResponse::updated()))
}

/// Call the upstream and wrap its body in the envelope.
///
/// Quota was already spent by the gate; an upstream failure does not refund it.
async fn forward(
    state: &AppState,
    authorization: &Authorization,
    request: GenerateRequest,
) -> Result<Json<Envelope>, QuotagateError> {
    info!(
        license_type = %authorization.license_type,
        stream = request.stream,
        without_context = request.without_context,
        "forwarding generation request"
    );

    let response = state.upstream.generate(&request).await?;

    Ok(Json(Envelope {
        developer: state.config.developer.clone(),
        developer_id: state.config.developer_id.clone(),
        response,
    }))
}
