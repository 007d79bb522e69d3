//! Status messenger seam.
//!
//! The queue never talks to a transport directly. It asks a
//! [`StatusMessenger`] to post, edit and delete the "you are #N in queue"
//! notices, and to tell a user that their job failed.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::{MessengerError, panic_message};
use crate::id::NoticeHandle;
use crate::item::Origin;

#[async_trait]
pub trait StatusMessenger: Send + Sync {
    /// Reply to `origin` with a position notice. Position 1 means the item is
    /// next; 2 means one job is ahead of it, and so on.
    async fn send_position_notice(
        &self,
        origin: &Origin,
        position: usize,
    ) -> Result<NoticeHandle, MessengerError>;

    /// Edit an existing notice to show a new position.
    ///
    /// Implementations should return [`MessengerError::NotModified`] when the
    /// transport rejects the edit because the text is unchanged.
    async fn update_position_notice(
        &self,
        handle: &NoticeHandle,
        origin: &Origin,
        position: usize,
    ) -> Result<(), MessengerError>;

    async fn delete_notice(&self, handle: &NoticeHandle) -> Result<(), MessengerError>;

    /// Send the generic "something went wrong" reply for a failed job.
    async fn notify_failure(&self, origin: &Origin) -> Result<(), MessengerError>;
}

/// A notice whose displayed position should be brought up to date.
#[derive(Debug, Clone)]
pub(crate) struct PositionUpdate {
    pub handle: NoticeHandle,
    pub origin: Origin,
    pub position: usize,
}

/// Edit every notice in `updates`, swallowing "not modified" rejections.
pub(crate) async fn apply_position_updates(
    messenger: &dyn StatusMessenger,
    updates: Vec<PositionUpdate>,
) {
    for update in updates {
        match guarded(messenger.update_position_notice(
            &update.handle,
            &update.origin,
            update.position,
        ))
        .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_modified() => {
                debug!(notice = %update.handle, "Position notice already current");
            }
            Err(e) => {
                warn!(notice = %update.handle, position = update.position, "Failed to edit queue notice: {}", e);
            }
        }
    }
}

/// Delete notices that no longer correspond to a queued item.
pub(crate) async fn delete_notices(
    messenger: &dyn StatusMessenger,
    handles: impl IntoIterator<Item = NoticeHandle>,
) {
    for handle in handles {
        if let Err(e) = guarded(messenger.delete_notice(&handle)).await {
            warn!(notice = %handle, "Failed to delete queue notice: {}", e);
        }
    }
}

/// Await one messenger call. A panic inside the implementation comes back as
/// a transport error.
pub(crate) async fn guarded<T, F>(call: F) -> Result<T, MessengerError>
where
    F: Future<Output = Result<T, MessengerError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(MessengerError::Transport(format!(
            "messenger panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}
