//! Internal change ingest for the external data layer.
//!
//! The data service posts every committed mutation here after its transaction
//! commits; this endpoint wraps the row into a scoped envelope and queues it
//! for fan-out. Ingest always acknowledges: emission is best-effort and an
//! unroutable row is dropped with a log line, never an error.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use corkboard_domain::ChangeOp;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChangeIngestRequest {
    pub table: String,
    pub op: ChangeOp,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

pub async fn ingest_change_handler(
    State(state): State<AppState>,
    Json(request): Json<ChangeIngestRequest>,
) -> ApiResult<StatusCode> {
    state
        .change_emitter
        .emit(request.table.as_str(), request.op, request.new, request.old)
        .await;

    Ok(StatusCode::ACCEPTED)
}
