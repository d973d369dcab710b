//! Live change event streams over SSE.
//!
//! Authorization happens at subscribe time: the check here establishes the
//! cached access fact the registry holds for the life of the connection.
//! There is no replay; a reconnect sees only changes committed after it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Extension, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use corkboard_core::{AppError, BoardId, Principal, WorkspaceId};
use corkboard_domain::{Capability, ChangeEnvelope, SubscriptionScope};
use corkboard_infrastructure::{SubscriptionHandle, SubscriptionRegistry};
use tokio_stream::{Stream, StreamExt};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn board_events_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(board_id): Path<BoardId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    state
        .permission_service
        .require(principal, Capability::BoardView, Some(board_id))
        .await?;

    let handle = state
        .registry
        .subscribe(principal, SubscriptionScope::Board(board_id))
        .await;

    Ok(event_stream(state.registry.clone(), handle))
}

/// Workspace-wide stream for home views.
///
/// Workspace membership lives in the external data layer, so this channel is
/// limited to global admins here.
pub async fn workspace_events_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(workspace_id): Path<WorkspaceId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    if !principal.is_global_admin() {
        return Err(
            AppError::Forbidden("workspace streams require global admin".to_owned()).into(),
        );
    }

    let handle = state
        .registry
        .subscribe(principal, SubscriptionScope::Workspace(workspace_id))
        .await;

    Ok(event_stream(state.registry.clone(), handle))
}

/// Self-scoped stream; the caller can only ever subscribe to their own id.
pub async fn self_events_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let handle = state
        .registry
        .subscribe(principal, SubscriptionScope::User(principal.user_id()))
        .await;

    Ok(event_stream(state.registry.clone(), handle))
}

/// Stream over a live subscription that removes the registration when the
/// client goes away.
///
/// Without this, a disconnect would leave a dead registration behind until
/// some later delivery touched the same scope.
struct SubscriptionStream {
    handle: SubscriptionHandle,
    registry: Arc<SubscriptionRegistry>,
}

impl Stream for SubscriptionStream {
    type Item = ChangeEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.handle.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let scope = self.handle.scope();
        let subscription_id = self.handle.subscription_id();

        tokio::spawn(async move {
            registry.unsubscribe(scope, subscription_id).await;
        });
    }
}

fn event_stream(
    registry: Arc<SubscriptionRegistry>,
    handle: SubscriptionHandle,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = SubscriptionStream { handle, registry }
        .map(|envelope| Event::default().event("change").json_data(&envelope));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
