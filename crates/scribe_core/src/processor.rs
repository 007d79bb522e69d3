//! Processor seam: the transcription/summarization pipeline the worker
//! hands each queued item to.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::item::QueuedItem;

#[async_trait]
pub trait Processor<S>: Send + Sync
where
    S: Send + Sync + 'static,
{
    /// Process one queued item to completion.
    ///
    /// Errors (and panics) are reported to the submitter by the worker and do
    /// not stop the drain of the remaining items.
    async fn process(&self, item: QueuedItem<S>) -> Result<(), ProcessError>;
}

/// Adapts an async closure into a [`Processor`].
pub struct FnProcessor<S, F> {
    f: F,
    _submission: PhantomData<fn(S)>,
}

impl<S, F> FnProcessor<S, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _submission: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut> Processor<S> for FnProcessor<S, F>
where
    S: Send + Sync + 'static,
    F: Fn(QueuedItem<S>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    async fn process(&self, item: QueuedItem<S>) -> Result<(), ProcessError> {
        (self.f)(item).await
    }
}
