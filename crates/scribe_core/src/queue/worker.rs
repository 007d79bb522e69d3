//! Per-user drain task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::state::{SharedState, UserQueueState};
use super::Shared;
use crate::error::{ProcessError, panic_message};
use crate::item::Submission;
use crate::messenger::{apply_position_updates, guarded};

/// Spawn a drain task for this user unless one is already running.
///
/// Runs under the user's lock, which is what makes the check-then-spawn
/// idempotent. Returns whether a new worker was started.
pub(super) fn ensure<S: Submission>(
    shared: &Arc<Shared<S>>,
    state_ref: &SharedState<S>,
    state: &mut UserQueueState<S>,
) -> bool {
    if state.worker_live() {
        return false;
    }

    debug!("Starting queue worker for user {}", state.user);
    state.worker = Some(tokio::spawn(drain(
        Arc::clone(shared),
        Arc::clone(state_ref),
    )));
    true
}

/// Process queued items one at a time until the queue is empty.
async fn drain<S: Submission>(shared: Arc<Shared<S>>, state_ref: SharedState<S>) {
    let mut state = state_ref.lock().await;
    let user = state.user;
    debug!("Queue worker started for user {}", user);

    loop {
        if state.retired {
            return;
        }

        // Popping the next item and claiming the processing flag happen in
        // the same critical section as releasing it for the previous item,
        // so no direct submission can slip in between two queued ones.
        let Some(item) = state.queue.pop_front() else {
            state.worker = None;
            debug!("Queue worker finished for user {}", user);
            return;
        };
        state.processing = true;
        let updates = state.position_updates();
        drop(state);

        if !updates.is_empty() {
            apply_position_updates(shared.messenger.as_ref(), updates).await;
        }

        let message_id = item.message_id();
        let origin = item.origin.clone();
        shared.metrics.record_dequeued(item.arrived_at.elapsed());

        let outcome = match AssertUnwindSafe(shared.processor.process(item))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(ProcessError::Panicked {
                message_id,
                reason: panic_message(panic.as_ref()),
            }),
        };

        match outcome {
            Ok(()) => {
                shared.metrics.record_processed();
                info!("Processed queued {} for user {}", message_id, user);
            }
            Err(e) => {
                shared.metrics.record_failed();
                error!(
                    "Error processing queued {} for user {}: {}",
                    message_id, user, e
                );
                if let Err(e) = guarded(shared.messenger.notify_failure(&origin)).await {
                    warn!(
                        "Failed to report processing failure to user {}: {}",
                        user, e
                    );
                }
            }
        }

        state = state_ref.lock().await;
        state.processing = false;
    }
}
