#![cfg(test)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::QueueConfig;
use crate::error::{MessengerError, ProcessError};
use crate::id::{ChatId, MessageId, NoticeHandle, UserId};
use crate::item::{Origin, QueuedItem, Submission};
use crate::messenger::StatusMessenger;
use crate::processor::Processor;
use crate::queue::{Admission, QueueController};

/// Minimal submission: a chat message id in a private chat with the user.
#[derive(Debug, Clone)]
pub struct TestSubmission {
    pub user: i64,
    pub id: i64,
}

impl Submission for TestSubmission {
    fn message_id(&self) -> MessageId {
        MessageId(self.id)
    }

    fn chat_id(&self) -> ChatId {
        ChatId(self.user)
    }

    fn locale(&self) -> Option<&str> {
        Some("en")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerEvent {
    Sent {
        message_id: MessageId,
        position: usize,
    },
    Updated {
        message_id: MessageId,
        position: usize,
    },
    Deleted {
        handle: NoticeHandle,
    },
    Failure {
        message_id: MessageId,
    },
}

/// Messenger that records every call and hands out sequential notice ids.
#[derive(Debug)]
pub struct RecordingMessenger {
    events: Mutex<Vec<MessengerEvent>>,
    next_notice: AtomicI64,
    update_error: Mutex<Option<MessengerError>>,
    panic_on_send: AtomicBool,
    panic_on_edit: AtomicBool,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_notice: AtomicI64::new(10_000),
            update_error: Mutex::new(None),
            panic_on_send: AtomicBool::new(false),
            panic_on_edit: AtomicBool::new(false),
        }
    }
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent edit fail with `error`.
    pub fn fail_updates_with(&self, error: MessengerError) {
        *self.update_error.lock() = Some(error);
    }

    /// Panic inside every subsequent `send_position_notice`.
    pub fn panic_on_send(&self) {
        self.panic_on_send.store(true, Ordering::SeqCst);
    }

    /// Panic inside every subsequent edit and failure notice.
    pub fn panic_on_edit(&self) {
        self.panic_on_edit.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<MessengerEvent> {
        self.events.lock().clone()
    }

    pub fn sent(&self) -> Vec<(MessageId, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MessengerEvent::Sent {
                    message_id,
                    position,
                } => Some((message_id, position)),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<MessageId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MessengerEvent::Failure { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl StatusMessenger for RecordingMessenger {
    async fn send_position_notice(
        &self,
        origin: &Origin,
        position: usize,
    ) -> Result<NoticeHandle, MessengerError> {
        if self.panic_on_send.load(Ordering::SeqCst) {
            panic!("bot client dropped while sending notice");
        }
        let id = self.next_notice.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(MessengerEvent::Sent {
            message_id: origin.message_id,
            position,
        });
        Ok(NoticeHandle::new(origin.chat_id, id))
    }

    async fn update_position_notice(
        &self,
        _handle: &NoticeHandle,
        origin: &Origin,
        position: usize,
    ) -> Result<(), MessengerError> {
        if self.panic_on_edit.load(Ordering::SeqCst) {
            panic!("bot client dropped while editing notice");
        }
        if let Some(error) = self.update_error.lock().clone() {
            return Err(error);
        }
        self.events.lock().push(MessengerEvent::Updated {
            message_id: origin.message_id,
            position,
        });
        Ok(())
    }

    async fn delete_notice(&self, handle: &NoticeHandle) -> Result<(), MessengerError> {
        self.events
            .lock()
            .push(MessengerEvent::Deleted { handle: *handle });
        Ok(())
    }

    async fn notify_failure(&self, origin: &Origin) -> Result<(), MessengerError> {
        if self.panic_on_edit.load(Ordering::SeqCst) {
            panic!("bot client dropped while reporting failure");
        }
        self.events.lock().push(MessengerEvent::Failure {
            message_id: origin.message_id,
        });
        Ok(())
    }
}

/// Processor that takes a fixed time per job and records the order and
/// overlap of the jobs it runs. Direct jobs go through [`Self::run`] too, so
/// overlap between direct and queued work is visible.
#[derive(Debug)]
pub struct RecordingProcessor {
    job_time: Duration,
    started: Mutex<Vec<MessageId>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail_on: Mutex<HashSet<MessageId>>,
    panic_on: Mutex<HashSet<MessageId>>,
}

impl RecordingProcessor {
    pub fn new(job_time: Duration) -> Self {
        Self {
            job_time,
            started: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fail_on: Mutex::new(HashSet::new()),
            panic_on: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, id: i64) {
        self.fail_on.lock().insert(MessageId(id));
    }

    pub fn panic_on(&self, id: i64) {
        self.panic_on.lock().insert(MessageId(id));
    }

    pub fn started(&self) -> Vec<i64> {
        self.started.lock().iter().map(|id| id.get()).collect()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub async fn run(&self, message_id: MessageId) -> Result<(), ProcessError> {
        self.started.lock().push(message_id);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.job_time).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.lock().contains(&message_id) {
            panic!("decoder exploded on {message_id}");
        }
        if self.fail_on.lock().contains(&message_id) {
            return Err(ProcessError::Failed {
                message_id,
                reason: "unsupported codec".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Processor<TestSubmission> for RecordingProcessor {
    async fn process(&self, item: QueuedItem<TestSubmission>) -> Result<(), ProcessError> {
        self.run(item.message_id()).await
    }
}

pub const JOB_TIME: Duration = Duration::from_secs(1);

/// A controller wired to recording collaborators, plus a handler-like
/// `submit` that runs direct jobs the way a transport handler would.
pub struct Harness {
    pub controller: QueueController<TestSubmission>,
    pub processor: Arc<RecordingProcessor>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        let processor = Arc::new(RecordingProcessor::new(JOB_TIME));
        let messenger = Arc::new(RecordingMessenger::new());
        let controller = QueueController::new(
            config,
            Arc::clone(&processor) as Arc<dyn Processor<TestSubmission>>,
            Arc::clone(&messenger) as Arc<dyn StatusMessenger>,
        )
        .expect("valid config");
        Self {
            controller,
            processor,
            messenger,
        }
    }

    pub async fn submit(&self, user: i64, id: i64) -> Admission {
        let admission = self
            .controller
            .enqueue(UserId(user), TestSubmission { user, id })
            .await;

        if admission == Admission::Direct {
            let controller = self.controller.clone();
            let processor = Arc::clone(&self.processor);
            tokio::spawn(async move {
                let _ = processor.run(MessageId(id)).await;
                controller.finish_processing(UserId(user)).await;
            });
        }

        admission
    }

    pub async fn queued_ids(&self, user: i64) -> Vec<i64> {
        self.controller
            .queued_items(UserId(user))
            .await
            .into_iter()
            .map(|entry| entry.message_id.get())
            .collect()
    }
}

/// Let every timer and job run to completion (paused-clock tests only).
pub async fn run_until_idle() {
    tokio::time::sleep(Duration::from_secs(120)).await;
}
