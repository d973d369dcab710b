use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use corkboard_application::AuditQuery;
use corkboard_core::{BoardId, Principal};
use serde::Deserialize;

use crate::dto::AuditEntryResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_audit_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
    Query(query): Query<AuditListQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let defaults = AuditQuery::default();
    let entries = state
        .audit_service
        .list_board_entries(
            principal,
            board_id,
            AuditQuery {
                limit: query.limit.unwrap_or(defaults.limit),
                offset: query.offset.unwrap_or(defaults.offset),
            },
        )
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
