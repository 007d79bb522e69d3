//! Collection window
//!
//! When a user picks several files at once, the transport delivers them
//! within milliseconds of each other and not necessarily in send order. A
//! window buffers such a burst, then sorts it by transport message id and
//! feeds it into the live queue as one batch.
//!
//! The window closes on the first quiet period of `settle` after the latest
//! arrival, or at `max_wait` after opening, whichever comes first.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::state::{OpenWindow, SharedState, UserQueueState};
use super::{Shared, admit, worker};
use crate::error::panic_message;
use crate::item::{Pending, Submission};

/// Why a window stopped buffering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushReason {
    /// No new arrival for a full settle period
    Settled,
    /// The hard cap elapsed while submissions kept arriving
    HardCap,
    /// The timer itself failed; flushing anyway so nothing is dropped
    TimerFailed,
}

/// Open a window seeded with `pending`. Runs under the user's lock.
pub(super) fn open<S: Submission>(
    shared: &Arc<Shared<S>>,
    state_ref: &SharedState<S>,
    state: &mut UserQueueState<S>,
    pending: Pending<S>,
) {
    let id = state.next_window_id();
    let user = state.user;
    let opened_at = Instant::now();
    let activity = Arc::new(Notify::new());
    let seed = pending.origin.message_id;

    state.window = Some(OpenWindow {
        id,
        opened_at,
        buffer: vec![pending],
        activity: Arc::clone(&activity),
        task: None,
    });

    let task = tokio::spawn(run(
        Arc::clone(shared),
        Arc::clone(state_ref),
        id,
        opened_at,
        activity,
    ));
    if let Some(window) = state.window.as_mut() {
        window.task = Some(task);
    }

    shared.metrics.record_window_opened();
    info!("Started collection window for user {} with {}", user, seed);
}

async fn run<S: Submission>(
    shared: Arc<Shared<S>>,
    state_ref: SharedState<S>,
    window_id: u64,
    opened_at: Instant,
    activity: Arc<Notify>,
) {
    let timing = &shared.config.collection;
    let wait = wait_for_quiet(&activity, opened_at, timing.settle(), timing.max_wait());
    close_after(&shared, &state_ref, window_id, wait).await;
}

/// Flush window `window_id` once `wait` resolves. A panicking wait still
/// flushes, so buffered submissions are never stranded.
pub(crate) async fn close_after<S, W>(
    shared: &Arc<Shared<S>>,
    state_ref: &SharedState<S>,
    window_id: u64,
    wait: W,
) where
    S: Submission,
    W: Future<Output = FlushReason>,
{
    let reason = match AssertUnwindSafe(wait).catch_unwind().await {
        Ok(reason) => reason,
        Err(panic) => {
            error!(
                "Collection window {} timer failed: {}",
                window_id,
                panic_message(panic.as_ref())
            );
            FlushReason::TimerFailed
        }
    };

    flush(shared, state_ref, window_id, reason).await;
}

/// Wait until `settle` passes with no activity, bounded by `max_wait` from
/// `opened_at`.
pub(crate) async fn wait_for_quiet(
    activity: &Notify,
    opened_at: Instant,
    settle: Duration,
    max_wait: Duration,
) -> FlushReason {
    let cap = tokio::time::sleep_until(opened_at + max_wait);
    tokio::pin!(cap);

    loop {
        tokio::select! {
            biased;
            () = &mut cap => return FlushReason::HardCap,
            () = activity.notified() => continue,
            () = tokio::time::sleep(settle) => return FlushReason::Settled,
        }
    }
}

/// Move the window's buffer into the live queue in transport order.
async fn flush<S: Submission>(
    shared: &Arc<Shared<S>>,
    state_ref: &SharedState<S>,
    window_id: u64,
    reason: FlushReason,
) {
    let mut state = state_ref.lock().await;
    if state.retired {
        return;
    }

    let Some(window) = state.window.take_if(|window| window.id == window_id) else {
        debug!("Collection window {} already closed", window_id);
        return;
    };

    let mut buffer = window.buffer;
    // Stable sort: duplicate ids keep arrival order
    buffer.sort_by_key(|pending| pending.origin.message_id);
    let batch_size = buffer.len();

    info!(
        "Processing {} collected messages for user {} ({:?})",
        batch_size, state.user, reason
    );

    for pending in buffer {
        admit(shared, &mut state, pending).await;
    }
    shared.metrics.record_window_flushed(batch_size);

    // The running job may have finished while the window was buffering
    if !state.processing && !state.queue.is_empty() {
        worker::ensure(shared, state_ref, &mut state);
    }
}
