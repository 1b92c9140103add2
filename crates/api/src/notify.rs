//! Post-transition notifications (e-mail to the story owner, etc.).
//!
//! Invoked by the HTTP layer after a transition commits, never by the
//! workflow service.

use async_trait::async_trait;
use engine::TransitionOutcome;
use tracing::info;

/// Something that wants to hear about completed transitions.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn transition_committed(&self, outcome: &TransitionOutcome) -> Result<(), String>;
}

/// Default notifier: emits a structured log line.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn transition_committed(&self, outcome: &TransitionOutcome) -> Result<(), String> {
        info!(
            item_id = %outcome.item.id,
            owner = outcome.item.owner_actor_id,
            status = %outcome.item.status,
            reason = outcome.record.reason.as_deref().unwrap_or(""),
            "notify owner of status change"
        );
        Ok(())
    }
}
