use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use corkboard_core::{BoardId, CustomRoleId, Principal, UserId};
use corkboard_domain::CustomRoleAssignment;

use crate::dto::{AssignRoleRequest, CreateRoleRequest, CustomRoleResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<CustomRoleResponse>)> {
    let capabilities = request.parsed_capabilities()?;
    let role = state
        .membership_service
        .create_custom_role(principal, request.name.as_str(), capabilities)
        .await?;

    Ok((StatusCode::CREATED, Json(CustomRoleResponse::from(role))))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((board_id, custom_role_id)): Path<(BoardId, CustomRoleId)>,
    Json(request): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .membership_service
        .assign_custom_role(
            principal,
            CustomRoleAssignment {
                board_id,
                user_id: request.user_id,
                custom_role_id,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((board_id, custom_role_id, user_id)): Path<(BoardId, CustomRoleId, UserId)>,
) -> ApiResult<StatusCode> {
    state
        .membership_service
        .unassign_custom_role(
            principal,
            CustomRoleAssignment {
                board_id,
                user_id,
                custom_role_id,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
