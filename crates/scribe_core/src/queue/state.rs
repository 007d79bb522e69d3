//! Per-user queue state and the registry that owns it.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::id::{MessageId, UserId};
use crate::item::{Pending, QueueEntry, QueuedItem};
use crate::messenger::PositionUpdate;

pub(crate) type SharedState<S> = Arc<Mutex<UserQueueState<S>>>;

/// Everything the queue knows about one user. Only ever touched while
/// holding the surrounding mutex.
pub(crate) struct UserQueueState<S> {
    pub user: UserId,
    pub queue: VecDeque<QueuedItem<S>>,
    pub worker: Option<JoinHandle<()>>,
    /// A job (direct or drained) is running for this user
    pub processing: bool,
    pub sequence: u64,
    pub window: Option<OpenWindow<S>>,
    windows_opened: u64,
    /// Set when `clear_queue` tears the state down. A retired state is no
    /// longer in the registry; late lock holders must look it up again.
    pub retired: bool,
}

/// A collection window that is still buffering.
pub(crate) struct OpenWindow<S> {
    pub id: u64,
    pub opened_at: Instant,
    pub buffer: Vec<Pending<S>>,
    /// Signalled on every arrival so the debounce timer restarts
    pub activity: Arc<Notify>,
    pub task: Option<JoinHandle<()>>,
}

impl<S> UserQueueState<S> {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            queue: VecDeque::new(),
            worker: None,
            processing: false,
            sequence: 0,
            window: None,
            windows_opened: 0,
            retired: false,
        }
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn next_window_id(&mut self) -> u64 {
        self.windows_opened += 1;
        self.windows_opened
    }

    pub fn worker_live(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_collecting(&self) -> bool {
        self.window.is_some()
    }

    /// Position shown for the item at `index`: 1-based, plus one slot for a
    /// running job.
    pub fn position_at(&self, index: usize) -> usize {
        index + 1 + usize::from(self.processing)
    }

    /// Notices that should display the current positions.
    pub fn position_updates(&self) -> Vec<PositionUpdate> {
        self.queue
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                item.notice.map(|handle| PositionUpdate {
                    handle,
                    origin: item.origin.clone(),
                    position: self.position_at(index),
                })
            })
            .collect()
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.queue
            .iter()
            .enumerate()
            .map(|(index, item)| QueueEntry {
                message_id: item.message_id(),
                sequence: item.sequence,
                position: self.position_at(index),
                submitted_at: item.submitted_at,
                notice: item.notice,
            })
            .collect()
    }

    /// Remove the first queued item with `message_id`, keeping the relative
    /// order of everything else.
    pub fn take_queued(&mut self, message_id: MessageId) -> Option<QueuedItem<S>> {
        let mut removed = None;
        let survivors: VecDeque<_> = self
            .queue
            .drain(..)
            .filter_map(|item| {
                if removed.is_none() && item.message_id() == message_id {
                    removed = Some(item);
                    None
                } else {
                    Some(item)
                }
            })
            .collect();
        self.queue = survivors;
        removed
    }

    /// Remove a submission still sitting in the open window's buffer.
    pub fn take_buffered(&mut self, message_id: MessageId) -> Option<Pending<S>> {
        let window = self.window.as_mut()?;
        let index = window
            .buffer
            .iter()
            .position(|pending| pending.origin.message_id == message_id)?;
        Some(window.buffer.remove(index))
    }

    /// Cancel background tasks and reset every field. Returns what was
    /// discarded.
    pub fn reset(&mut self) -> Discarded<S> {
        let worker_was_live = self.worker_live();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }

        let mut buffered = 0;
        if let Some(window) = self.window.take() {
            if let Some(task) = window.task {
                task.abort();
            }
            buffered = window.buffer.len();
        }

        let queued: Vec<_> = self.queue.drain(..).collect();
        self.processing = false;
        self.sequence = 0;
        self.windows_opened = 0;

        Discarded {
            queued,
            buffered,
            worker_was_live,
        }
    }
}

/// What a reset threw away.
pub(crate) struct Discarded<S> {
    pub queued: Vec<QueuedItem<S>>,
    pub buffered: usize,
    pub worker_was_live: bool,
}

impl<S> Discarded<S> {
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.buffered == 0 && !self.worker_was_live
    }
}

/// Process-wide table of per-user state.
///
/// DashMap shards the table, so creating one user's state never blocks
/// another user's admission. The entry API makes creation atomic per key.
pub(crate) struct QueueRegistry<S> {
    users: DashMap<UserId, SharedState<S>>,
}

impl<S> QueueRegistry<S> {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn get(&self, user: UserId) -> Option<SharedState<S>> {
        // Clone immediately so no DashMap ref is held across an await
        self.users.get(&user).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_or_create(&self, user: UserId) -> SharedState<S> {
        let entry = self
            .users
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(UserQueueState::new(user))));
        Arc::clone(entry.value())
    }

    /// Remove `user` only if the registry still points at `state`.
    pub fn remove(&self, user: UserId, state: &SharedState<S>) {
        self.users
            .remove_if(&user, |_, current| Arc::ptr_eq(current, state));
    }

    pub fn users(&self) -> Vec<UserId> {
        self.users.iter().map(|entry| *entry.key()).collect()
    }

    /// Lock the live state for `user`, creating it if needed.
    pub async fn lock_or_create(
        &self,
        user: UserId,
    ) -> (SharedState<S>, OwnedMutexGuard<UserQueueState<S>>) {
        loop {
            let state = self.get_or_create(user);
            let guard = Arc::clone(&state).lock_owned().await;
            if !guard.retired {
                return (state, guard);
            }
        }
    }

    /// Lock the live state for `user` if the user has one.
    pub async fn lock_existing(
        &self,
        user: UserId,
    ) -> Option<(SharedState<S>, OwnedMutexGuard<UserQueueState<S>>)> {
        loop {
            let state = self.get(user)?;
            let guard = Arc::clone(&state).lock_owned().await;
            if !guard.retired {
                return Some((state, guard));
            }
        }
    }
}
