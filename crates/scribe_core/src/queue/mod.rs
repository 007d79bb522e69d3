//! Per-user admission and ordering.
//!
//! Every user gets an isolated queue guarded by its own lock. A submission
//! either runs immediately (nothing else is happening for that user), joins a
//! short collection window (a job is running and more files are arriving), or
//! joins the live queue. A lazily spawned worker drains the queue one item at
//! a time.

mod cancel;
mod state;
mod window;
mod worker;


use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::Result;
use crate::config::QueueConfig;
use crate::id::{NoticeHandle, UserId};
use crate::item::{Pending, QueueEntry, Submission};
use crate::messenger::{StatusMessenger, apply_position_updates, guarded};
use crate::metrics::{MetricsSnapshot, QueueMetrics};
use crate::processor::Processor;

use state::{QueueRegistry, UserQueueState};

/// Outcome of [`QueueController::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Nothing else is running for this user. The caller must process the
    /// submission itself and then call
    /// [`QueueController::finish_processing`].
    Direct,
    /// The queue owns the submission now. `notice` is set when a position
    /// notice was posted right away; submissions that joined a collection
    /// window get theirs when the window flushes.
    Queued { notice: Option<NoticeHandle> },
}

impl Admission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    pub fn notice(&self) -> Option<NoticeHandle> {
        match self {
            Self::Direct => None,
            Self::Queued { notice } => *notice,
        }
    }
}

/// Collaborators and settings shared by the controller and its tasks
pub(crate) struct Shared<S: Submission> {
    pub config: QueueConfig,
    pub processor: Arc<dyn Processor<S>>,
    pub messenger: Arc<dyn StatusMessenger>,
    pub metrics: QueueMetrics,
}

/// Entry point for transport handlers.
///
/// Cheap to clone; every clone drives the same registry. All methods are safe
/// to call concurrently from independent handler invocations.
pub struct QueueController<S: Submission> {
    shared: Arc<Shared<S>>,
    registry: Arc<QueueRegistry<S>>,
}

impl<S: Submission> Clone for QueueController<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: Submission> std::fmt::Debug for QueueController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueController")
            .field("config", &self.shared.config)
            .field("users", &self.registry.users().len())
            .finish()
    }
}

impl<S: Submission> QueueController<S> {
    /// Create a controller.
    pub fn new(
        config: QueueConfig,
        processor: Arc<dyn Processor<S>>,
        messenger: Arc<dyn StatusMessenger>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                processor,
                messenger,
                metrics: QueueMetrics::new(),
            }),
            registry: Arc::new(QueueRegistry::new()),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Admit one submission for `user`. Must be called from within a tokio
    /// runtime, since it may spawn a window or worker task.
    pub async fn enqueue(&self, user: UserId, submission: S) -> Admission {
        self.shared.metrics.record_submitted();
        let pending = Pending::new(submission);
        let message_id = pending.origin.message_id;

        let (state_ref, mut state) = self.registry.lock_or_create(user).await;

        if !state.processing && state.queue.is_empty() && !state.is_collecting() {
            state.processing = true;
            self.shared.metrics.record_direct();
            debug!("User {} started processing {} directly", user, message_id);
            return Admission::Direct;
        }

        if let Some(window) = state.window.as_mut() {
            window.buffer.push(pending);
            window.activity.notify_one();
            debug!(
                "Added {} to collection window for user {} ({} buffered)",
                message_id,
                user,
                window.buffer.len()
            );
            return Admission::Queued { notice: None };
        }

        if state.processing && self.shared.config.collection.enabled {
            window::open(&self.shared, &state_ref, &mut state, pending);
            return Admission::Queued { notice: None };
        }

        let notice = admit(&self.shared, &mut state, pending).await;
        if !state.processing {
            worker::ensure(&self.shared, &state_ref, &mut state);
        }
        Admission::Queued { notice }
    }

    /// Mark the direct job for `user` as done and hand any queued work to a
    /// worker. Must be called from within a tokio runtime.
    pub async fn finish_processing(&self, user: UserId) {
        let Some((state_ref, mut state)) = self.registry.lock_existing(user).await else {
            debug!("finish_processing for unknown user {}", user);
            return;
        };

        if state.worker_live() {
            // The drain owns the processing flag while it runs
            debug!("Worker already draining queue for user {}", user);
            return;
        }

        state.processing = false;
        info!("Finished processing for user {}", user);

        if !state.queue.is_empty() {
            worker::ensure(&self.shared, &state_ref, &mut state);
        }
    }

    /// Number of items waiting in the live queue (not counting a running job
    /// or an open window's buffer).
    pub async fn queue_depth(&self, user: UserId) -> usize {
        match self.registry.lock_existing(user).await {
            Some((_, state)) => state.queue.len(),
            None => 0,
        }
    }

    pub async fn is_processing(&self, user: UserId) -> bool {
        match self.registry.lock_existing(user).await {
            Some((_, state)) => state.processing,
            None => false,
        }
    }

    /// Whether a collection window is currently buffering for `user`.
    pub async fn is_collecting(&self, user: UserId) -> bool {
        match self.registry.lock_existing(user).await {
            Some((_, state)) => state.is_collecting(),
            None => false,
        }
    }

    /// Snapshot of the queued items for `user`, in processing order.
    pub async fn queued_items(&self, user: UserId) -> Vec<QueueEntry> {
        match self.registry.lock_existing(user).await {
            Some((_, state)) => state.entries(),
            None => Vec::new(),
        }
    }

    /// Re-render every position notice for `user`.
    pub async fn refresh_positions(&self, user: UserId) {
        let updates = match self.registry.lock_existing(user).await {
            Some((_, state)) => state.position_updates(),
            None => return,
        };
        apply_position_updates(self.shared.messenger.as_ref(), updates).await;
    }

    /// Users that currently have queue state.
    pub fn active_users(&self) -> Vec<UserId> {
        self.registry.users()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

/// Append a submission to the live queue and post its position notice.
///
/// Runs under the user's lock. The item is queued before the notice is sent,
/// so a dropped caller can never lose a submission.
pub(crate) async fn admit<S: Submission>(
    shared: &Shared<S>,
    state: &mut UserQueueState<S>,
    pending: Pending<S>,
) -> Option<NoticeHandle> {
    let sequence = state.next_sequence();
    let item = pending.into_item(sequence);
    let origin = item.origin.clone();
    state.queue.push_back(item);
    shared.metrics.record_queued();

    let position = state.position_at(state.queue.len() - 1);
    let notice = match guarded(shared.messenger.send_position_notice(&origin, position)).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(
                "Failed to send queue notice for {} (user {}): {}",
                origin.message_id, state.user, e
            );
            None
        }
    };

    if let Some(item) = state
        .queue
        .iter_mut()
        .rev()
        .find(|item| item.sequence == sequence)
    {
        item.notice = notice;
    }

    info!(
        "Added {} to queue for user {}, position: {}, order: {}",
        origin.message_id, state.user, position, sequence
    );
    notice
}
