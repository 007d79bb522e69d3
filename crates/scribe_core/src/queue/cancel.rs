//! Cancelling queued work: a full clear (`/start`, "restart bot") and the
//! per-item cancel button on a position notice.

use tracing::{debug, info};

use super::QueueController;
use crate::id::{MessageId, UserId};
use crate::item::Submission;
use crate::messenger::{apply_position_updates, delete_notices};

impl<S: Submission> QueueController<S> {
    /// Tear down everything queued for `user`.
    ///
    /// Cancels the worker and any open collection window, discards queued and
    /// buffered submissions without processing them, resets all counters and
    /// removes the user's state. Returns whether anything was cleared so the
    /// caller can say "nothing to cancel".
    pub async fn clear_queue(&self, user: UserId) -> bool {
        let Some((state_ref, mut state)) = self.registry.lock_existing(user).await else {
            return false;
        };

        let discarded = state.reset();
        state.retired = true;
        self.registry.remove(user, &state_ref);
        drop(state);

        let cleared = !discarded.is_empty();
        let removed = discarded.queued.len() + discarded.buffered;
        if removed > 0 {
            self.shared.metrics.record_removed(removed);
        }
        if cleared {
            self.shared.metrics.record_clear();
        }

        info!(
            "Cleared queue for user {}: {} queued, {} buffered, worker cancelled: {}",
            user,
            discarded.queued.len(),
            discarded.buffered,
            discarded.worker_was_live
        );

        delete_notices(
            self.shared.messenger.as_ref(),
            discarded.queued.iter().filter_map(|item| item.notice),
        )
        .await;

        cleared
    }

    /// Cancel one not-yet-started submission by its transport message id.
    ///
    /// The remaining items keep their relative order. The cancelled item's
    /// notice is deleted and the others are renumbered.
    pub async fn remove_one(&self, user: UserId, message_id: MessageId) -> bool {
        let Some((_, mut state)) = self.registry.lock_existing(user).await else {
            debug!("No queue found for user {}", user);
            return false;
        };

        if let Some(item) = state.take_queued(message_id) {
            let updates = state.position_updates();
            drop(state);

            self.shared.metrics.record_removed(1);
            info!("Removed {} from queue for user {}", message_id, user);

            delete_notices(self.shared.messenger.as_ref(), item.notice).await;
            apply_position_updates(self.shared.messenger.as_ref(), updates).await;
            return true;
        }

        if state.take_buffered(message_id).is_some() {
            self.shared.metrics.record_removed(1);
            info!(
                "Removed {} from collection window for user {}",
                message_id, user
            );
            return true;
        }

        debug!("{} not queued for user {}", message_id, user);
        false
    }
}
