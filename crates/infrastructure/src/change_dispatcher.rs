use std::sync::Arc;

use corkboard_application::ChangePublisher;
use corkboard_domain::ChangeEnvelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::SubscriptionRegistry;

/// Single-queue bridge between synchronous publishers and the registry.
///
/// All envelopes funnel through one unbounded channel drained by one task,
/// so subscribers sharing a scope observe changes in the order they were
/// published. `publish` never blocks and never reports failure to the
/// caller; a closed queue is logged and the envelope dropped.
#[derive(Clone)]
pub struct ChangeDispatcher {
    sender: mpsc::UnboundedSender<ChangeEnvelope>,
}

impl ChangeDispatcher {
    /// Spawns the drain task and returns the dispatcher plus its task handle.
    ///
    /// The task runs until every dispatcher clone is dropped.
    #[must_use]
    pub fn spawn(registry: Arc<SubscriptionRegistry>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ChangeEnvelope>();

        let task = tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                registry.deliver(envelope).await;
            }
        });

        (Self { sender }, task)
    }
}

impl ChangePublisher for ChangeDispatcher {
    fn publish(&self, envelope: ChangeEnvelope) {
        if self.sender.send(envelope).is_err() {
            warn!("change dispatcher queue closed, dropping envelope");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use corkboard_application::ChangePublisher;
    use corkboard_core::{BoardId, Principal, UserId};
    use corkboard_domain::{ChangeEnvelope, ChangeOp, SubscriptionScope};
    use serde_json::json;

    use super::ChangeDispatcher;
    use crate::SubscriptionRegistry;

    fn card_envelope(board_id: BoardId, title: &str) -> ChangeEnvelope {
        ChangeEnvelope {
            table: "cards".to_owned(),
            op: ChangeOp::Insert,
            board_id: Some(board_id),
            workspace_id: None,
            new: Some(json!({"title": title})),
            old: None,
        }
    }

    #[tokio::test]
    async fn published_envelopes_arrive_in_publish_order() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (dispatcher, task) = ChangeDispatcher::spawn(registry.clone());

        let board_id = BoardId::new();
        let mut subscription = registry
            .subscribe(
                Principal::new(UserId::new(), false),
                SubscriptionScope::Board(board_id),
            )
            .await;

        dispatcher.publish(card_envelope(board_id, "first"));
        dispatcher.publish(card_envelope(board_id, "second"));

        let first = subscription.recv().await;
        let second = subscription.recv().await;
        let titles: Vec<String> = [first, second]
            .into_iter()
            .flatten()
            .filter_map(|envelope| envelope.new)
            .filter_map(|row| row.get("title").and_then(|value| value.as_str().map(String::from)))
            .collect();
        assert_eq!(titles, vec!["first".to_owned(), "second".to_owned()]);

        drop(dispatcher);
        assert!(task.await.is_ok());
    }

    #[tokio::test]
    async fn drain_task_stops_when_all_publishers_drop() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (dispatcher, task) = ChangeDispatcher::spawn(registry);

        let clone = dispatcher.clone();
        drop(dispatcher);
        drop(clone);

        assert!(task.await.is_ok());
    }
}
