//! Synthetic load for the queue: every simulated user sends an album of
//! files at once, the way a chat client delivers a multi-select upload.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use miette::{IntoDiagnostic, Result};
use parking_lot::Mutex;
use scribe_core::MetricsSnapshot;
use scribe_core::prelude::*;
use tracing::{debug, info};

use crate::output::Output;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of users uploading at the same time
    #[arg(long, default_value_t = 2)]
    pub users: i64,

    /// Files per user
    #[arg(long, default_value_t = 4)]
    pub burst: i64,

    /// Simulated processing time per file
    #[arg(long, default_value_t = 300)]
    pub job_ms: u64,

    /// Gap between deliveries inside a burst
    #[arg(long, default_value_t = 5)]
    pub stagger_ms: u64,

    /// Deliver each burst in reverse message order
    #[arg(long)]
    pub reverse: bool,

    /// Cancel this message id once the bursts are delivered
    #[arg(long)]
    pub cancel: Option<i64>,
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct DemoUpload {
    pub user: UserId,
    pub chat: ChatId,
    pub message_id: MessageId,
    pub file_name: String,
}

impl Submission for DemoUpload {
    fn message_id(&self) -> MessageId {
        self.message_id
    }

    fn chat_id(&self) -> ChatId {
        self.chat
    }

    fn locale(&self) -> Option<&str> {
        Some("en")
    }
}

/// Text of a queue notice for `position`.
pub fn render_position(position: usize) -> String {
    match position {
        0 | 1 => "Your file is next in line.".to_string(),
        2 => "Your file is first in line after the current one.".to_string(),
        n => format!("Your file is #{n} in the queue."),
    }
}

/// Prints notices instead of sending them.
pub struct ConsoleMessenger {
    output: Output,
    next_notice: Mutex<i64>,
}

impl ConsoleMessenger {
    pub fn new(output: Output) -> Self {
        Self {
            output,
            next_notice: Mutex::new(1),
        }
    }
}

#[async_trait]
impl StatusMessenger for ConsoleMessenger {
    async fn send_position_notice(
        &self,
        origin: &Origin,
        position: usize,
    ) -> Result<NoticeHandle, MessengerError> {
        let id = {
            let mut next = self.next_notice.lock();
            let id = *next;
            *next += 1;
            id
        };
        let handle = NoticeHandle::new(origin.chat_id, id);
        self.output.info(
            &format!("[{}] reply to {}:", handle, origin.message_id),
            &render_position(position),
        );
        Ok(handle)
    }

    async fn update_position_notice(
        &self,
        handle: &NoticeHandle,
        _origin: &Origin,
        position: usize,
    ) -> Result<(), MessengerError> {
        self.output
            .info(&format!("[{handle}] edited:"), &render_position(position));
        Ok(())
    }

    async fn delete_notice(&self, handle: &NoticeHandle) -> Result<(), MessengerError> {
        self.output.status(&format!("[{handle}] deleted"));
        Ok(())
    }

    async fn notify_failure(&self, origin: &Origin) -> Result<(), MessengerError> {
        self.output.warning(&format!(
            "{} failed, please try again later",
            origin.message_id
        ));
        Ok(())
    }
}

/// Sleeps for the configured job time and records completion order per user.
pub struct SleepingProcessor {
    job_time: Duration,
    completed: Mutex<BTreeMap<UserId, Vec<MessageId>>>,
}

impl SleepingProcessor {
    pub fn new(job_time: Duration) -> Self {
        Self {
            job_time,
            completed: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn run(&self, upload: &DemoUpload) {
        debug!("Transcribing {} for user {}", upload.file_name, upload.user);
        tokio::time::sleep(self.job_time).await;
        self.completed
            .lock()
            .entry(upload.user)
            .or_default()
            .push(upload.message_id);
    }

    pub fn completed(&self) -> BTreeMap<UserId, Vec<MessageId>> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl Processor<DemoUpload> for SleepingProcessor {
    async fn process(&self, item: QueuedItem<DemoUpload>) -> Result<(), ProcessError> {
        self.run(&item.submission).await;
        Ok(())
    }
}

/// Message ids of one user's album, in delivery order.
pub fn burst_ids(user: i64, burst: i64, reverse: bool) -> Vec<i64> {
    let base = user * 1_000;
    let mut ids: Vec<i64> = (1..=burst).map(|n| base + n).collect();
    if reverse {
        ids.reverse();
    }
    ids
}

/// What a simulation produced.
#[derive(Debug)]
pub struct SimulationReport {
    pub completed: BTreeMap<UserId, Vec<MessageId>>,
    pub metrics: MetricsSnapshot,
}

pub async fn run(config: QueueConfig, args: &SimulateArgs, output: &Output) -> Result<()> {
    output.section("Queue Simulation");
    output.info("Users:", &args.users.to_string());
    output.info("Files per user:", &args.burst.to_string());
    output.info(
        "Window:",
        &format!(
            "settle {}ms, cap {}ms, enabled: {}",
            config.collection.settle_ms, config.collection.max_wait_ms, config.collection.enabled
        ),
    );
    output.print("");

    let report = simulate(config, args, output).await?;

    output.print("");
    output.section("Processing order");
    for (user, order) in &report.completed {
        let order: Vec<String> = order.iter().map(ToString::to_string).collect();
        output.info(&format!("{user}:"), &order.join(" -> "));
    }

    output.print("");
    output.section("Metrics");
    let metrics = serde_json::to_string_pretty(&report.metrics).into_diagnostic()?;
    output.print(&metrics);

    info!("Simulation finished");
    Ok(())
}

/// Deliver every user's burst concurrently and wait for the queues to drain.
pub async fn simulate(
    config: QueueConfig,
    args: &SimulateArgs,
    output: &Output,
) -> Result<SimulationReport> {
    let processor = Arc::new(SleepingProcessor::new(Duration::from_millis(args.job_ms)));
    let controller = QueueController::new(
        config,
        Arc::clone(&processor) as Arc<dyn Processor<DemoUpload>>,
        Arc::new(ConsoleMessenger::new(output.clone())),
    )?;

    let mut senders = Vec::new();
    for user in 1..=args.users {
        let controller = controller.clone();
        let processor = Arc::clone(&processor);
        let ids = burst_ids(user, args.burst, args.reverse);
        let stagger = Duration::from_millis(args.stagger_ms);
        senders.push(tokio::spawn(async move {
            let mut direct = Vec::new();
            for id in ids {
                let upload = DemoUpload {
                    user: UserId(user),
                    chat: ChatId(user),
                    message_id: MessageId(id),
                    file_name: format!("voice-{id}.ogg"),
                };
                let admission = controller.enqueue(upload.user, upload.clone()).await;
                if admission == Admission::Direct {
                    // Handler path: run it here, then hand back to the queue
                    let controller = controller.clone();
                    let processor = Arc::clone(&processor);
                    direct.push(tokio::spawn(async move {
                        processor.run(&upload).await;
                        controller.finish_processing(upload.user).await;
                    }));
                }
                tokio::time::sleep(stagger).await;
            }
            direct
        }));
    }

    let mut direct_jobs = Vec::new();
    for sender in senders {
        direct_jobs.extend(sender.await.into_diagnostic()?);
    }

    if let Some(id) = args.cancel {
        let message_id = MessageId(id);
        let mut cancelled = false;
        for user in controller.active_users() {
            if controller.remove_one(user, message_id).await {
                output.success(&format!("Cancelled {message_id} for {user}"));
                cancelled = true;
                break;
            }
        }
        if !cancelled {
            output.warning(&format!("{message_id} was not waiting in any queue"));
        }
    }

    for job in direct_jobs {
        job.await.into_diagnostic()?;
    }
    wait_until_idle(&controller).await;

    Ok(SimulationReport {
        completed: processor.completed(),
        metrics: controller.metrics(),
    })
}

async fn wait_until_idle(controller: &QueueController<DemoUpload>) {
    loop {
        let mut busy = false;
        for user in controller.active_users() {
            if controller.is_processing(user).await
                || controller.is_collecting(user).await
                || controller.queue_depth(user).await > 0
            {
                busy = true;
                break;
            }
        }
        if !busy {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bursts_use_disjoint_ids_per_user() {
        assert_eq!(burst_ids(1, 3, false), vec![1001, 1002, 1003]);
        assert_eq!(burst_ids(2, 3, true), vec![2003, 2002, 2001]);
    }

    #[test]
    fn notice_text_follows_position() {
        assert_eq!(render_position(1), "Your file is next in line.");
        assert_eq!(
            render_position(2),
            "Your file is first in line after the current one."
        );
        assert_eq!(render_position(5), "Your file is #5 in the queue.");
    }

    #[tokio::test(start_paused = true)]
    async fn reversed_bursts_complete_in_message_order() {
        let args = SimulateArgs {
            users: 2,
            burst: 3,
            job_ms: 100,
            stagger_ms: 1,
            reverse: true,
            cancel: Some(1002),
        };

        let report = simulate(QueueConfig::default(), &args, &Output::new())
            .await
            .unwrap();

        // The first delivery runs directly; the rest are batched and sorted
        assert_eq!(
            report.completed[&UserId(1)],
            vec![MessageId(1003), MessageId(1001)]
        );
        assert_eq!(
            report.completed[&UserId(2)],
            vec![MessageId(2003), MessageId(2001), MessageId(2002)]
        );
        assert_eq!(report.metrics.direct, 2);
        assert_eq!(report.metrics.removed, 1);
        assert_eq!(report.metrics.processed, 3);
    }
}
