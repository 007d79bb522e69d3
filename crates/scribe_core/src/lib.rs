//! Scribe Core - per-user admission and ordering for the media pipeline
//!
//! Guarantees that at most one media job runs per user at a time, and turns
//! bursts of near-simultaneous uploads into a deterministic, user-visible
//! queue. Transcription itself happens behind the [`Processor`] seam; queue
//! notices go through the [`StatusMessenger`] seam.

pub mod config;
pub mod error;
pub mod id;
pub mod item;
pub mod messenger;
pub mod metrics;
pub mod processor;
pub mod queue;

#[cfg(test)]
pub mod test_helpers;

pub use config::{CollectionConfig, QueueConfig};
pub use error::{ConfigError, MessengerError, ProcessError, QueueError, Result};
pub use id::{ChatId, MessageId, NoticeHandle, UserId};
pub use item::{Origin, QueueEntry, QueuedItem, Submission};
pub use messenger::StatusMessenger;
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use processor::{FnProcessor, Processor};
pub use queue::{Admission, QueueController};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        Admission, ChatId, MessageId, MessengerError, NoticeHandle, Origin, ProcessError,
        Processor, QueueConfig, QueueController, QueuedItem, StatusMessenger, Submission,
        UserId,
    };
}
