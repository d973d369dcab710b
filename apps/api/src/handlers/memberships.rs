use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use corkboard_core::{BoardId, Principal, UserId};

use crate::dto::{AddMemberRequest, ChangeRoleRequest, MemberResponse, PermissionsResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_members_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let members = state
        .membership_service
        .list_members(principal, board_id)
        .await?
        .into_iter()
        .map(MemberResponse::from)
        .collect();

    Ok(Json(members))
}

pub async fn add_member_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let membership = state
        .membership_service
        .add_member(principal, board_id, request.user_id, request.role)
        .await?;

    Ok((StatusCode::CREATED, Json(MemberResponse::from(membership))))
}

pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((board_id, user_id)): Path<(BoardId, UserId)>,
) -> ApiResult<StatusCode> {
    state
        .membership_service
        .remove_member(principal, board_id, user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((board_id, user_id)): Path<(BoardId, UserId)>,
    Json(request): Json<ChangeRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .membership_service
        .change_role(principal, board_id, user_id, request.role)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the caller's effective capabilities on one board, for UI gating.
pub async fn my_permissions_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
) -> ApiResult<Json<PermissionsResponse>> {
    let capabilities = state
        .permission_service
        .resolve_all(principal, Some(board_id))
        .await?;

    Ok(Json(PermissionsResponse::from_set(&capabilities)))
}
