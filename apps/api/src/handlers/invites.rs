use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use corkboard_core::{BoardId, Principal};

use crate::dto::{
    CreateInviteRequest, InviteResponse, RedeemInviteRequest, RedeemInviteResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_invite_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
    Json(request): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    let invite = state
        .invite_service
        .create_invite(principal, board_id, request.link_type, request.expires_at)
        .await?;

    Ok((StatusCode::CREATED, Json(InviteResponse::from(invite))))
}

/// Redeems an invite token for the caller.
///
/// All redemption outcomes are 200 responses with a status discriminator;
/// invalid and expired tokens are expected user flows, not errors.
pub async fn redeem_invite_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<RedeemInviteRequest>,
) -> ApiResult<Json<RedeemInviteResponse>> {
    let outcome = state
        .invite_service
        .redeem(principal.user_id(), request.token.as_str())
        .await?;

    Ok(Json(RedeemInviteResponse::from(outcome)))
}
