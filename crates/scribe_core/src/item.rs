//! Submissions and the queue entries built from them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::id::{ChatId, MessageId, NoticeHandle};

/// One inbound request to process a media item.
///
/// The payload itself (transport message, processing context, media
/// reference) is opaque to the queue. The queue only needs to know where the
/// submission came from.
pub trait Submission: Send + Sync + 'static {
    /// Transport message id of the submission. Used as the ordering key for
    /// batched submissions and to cancel a single queued item.
    fn message_id(&self) -> MessageId;

    /// Chat the submission was sent in.
    fn chat_id(&self) -> ChatId;

    /// Locale for user-facing notices.
    fn locale(&self) -> Option<&str> {
        None
    }

    fn origin(&self) -> Origin {
        Origin {
            chat_id: self.chat_id(),
            message_id: self.message_id(),
            locale: self.locale().map(str::to_string),
        }
    }
}

/// Where a submission came from: everything the status messenger needs to
/// reply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub locale: Option<String>,
}

/// A submission waiting in a user's queue.
#[derive(Debug)]
pub struct QueuedItem<S> {
    pub submission: Arc<S>,
    pub origin: Origin,
    /// Per-user arrival order
    pub sequence: u64,
    pub arrived_at: Instant,
    pub submitted_at: DateTime<Utc>,
    /// Live position notice, if one was sent
    pub notice: Option<NoticeHandle>,
}

impl<S> Clone for QueuedItem<S> {
    fn clone(&self) -> Self {
        Self {
            submission: Arc::clone(&self.submission),
            origin: self.origin.clone(),
            sequence: self.sequence,
            arrived_at: self.arrived_at,
            submitted_at: self.submitted_at,
            notice: self.notice,
        }
    }
}

impl<S> QueuedItem<S> {
    pub fn message_id(&self) -> MessageId {
        self.origin.message_id
    }
}

/// A submission held in an open collection window, not yet sequenced.
#[derive(Debug)]
pub(crate) struct Pending<S> {
    pub submission: Arc<S>,
    pub origin: Origin,
    pub arrived_at: Instant,
    pub submitted_at: DateTime<Utc>,
}

impl<S: Submission> Pending<S> {
    pub fn new(submission: S) -> Self {
        let origin = submission.origin();
        Self {
            submission: Arc::new(submission),
            origin,
            arrived_at: Instant::now(),
            submitted_at: Utc::now(),
        }
    }
}

impl<S> Pending<S> {
    pub fn into_item(self, sequence: u64) -> QueuedItem<S> {
        QueuedItem {
            submission: self.submission,
            origin: self.origin,
            sequence,
            arrived_at: self.arrived_at,
            submitted_at: self.submitted_at,
            notice: None,
        }
    }
}

/// Read-only view of a queued item, returned by
/// [`QueueController::queued_items`](crate::QueueController::queued_items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub message_id: MessageId,
    pub sequence: u64,
    /// 1-based rank among pending work, counting a running job
    pub position: usize,
    pub submitted_at: DateTime<Utc>,
    pub notice: Option<NoticeHandle>,
}
