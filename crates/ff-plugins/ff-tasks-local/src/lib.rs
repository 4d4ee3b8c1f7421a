//! # ff-tasks-local
//! In-process implementation of `TaskQueue`.
//! Features: unbounded channel queue, retrying worker with exponential
//! backoff, and a mail transport that only logs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ff_core::error::{AppError, Result};
use ff_core::traits::{MailMessage, MailTransport, Task, TaskHandler, TaskQueue};
use tokio::sync::mpsc;

/// Producer half, shared by every service handle.
#[derive(Clone)]
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<Task>,
}

/// Consumer half, owned by exactly one [`Worker`].
pub struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl ChannelQueue {
    pub fn new() -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TaskReceiver { rx })
    }
}

impl TaskReceiver {
    /// Takes the next pending task without waiting.
    pub fn try_recv(&mut self) -> Option<Task> {
        self.rx.try_recv().ok()
    }
}

impl TaskQueue for ChannelQueue {
    fn enqueue(&self, task: Task) -> Result<()> {
        let name = task.name();
        self.tx
            .send(task)
            .map_err(|_| AppError::Internal("task queue is closed".into()))?;
        tracing::debug!(task = name, "task enqueued");
        Ok(())
    }
}

/// How often and how patiently a failed task is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff_ms: u64) -> Self {
        Self { max_attempts: max_attempts.max(1), base_backoff: Duration::from_millis(base_backoff_ms) }
    }

    /// Delay after the given failed attempt (1-based): base, 2×base, 4×base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 500)
    }
}

/// What became of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done { attempts: u32 },
    /// Rejected with a non-retryable error.
    Rejected(AppError),
    /// Still failing after the last allowed attempt.
    Exhausted(AppError),
}

/// Drains a [`TaskReceiver`], one task at a time.
pub struct Worker {
    handler: Arc<dyn TaskHandler>,
    policy: RetryPolicy,
}

impl Worker {
    pub fn new(handler: Arc<dyn TaskHandler>, policy: RetryPolicy) -> Self {
        Self { handler, policy }
    }

    /// Runs until `shutdown` resolves or every queue handle is dropped.
    pub async fn run(self, mut tasks: TaskReceiver, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!(max_attempts = self.policy.max_attempts, "task worker started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("task worker shutting down");
                    break;
                }
                next = tasks.rx.recv() => match next {
                    Some(task) => {
                        self.process(&task).await;
                    }
                    None => {
                        tracing::info!("task queue closed");
                        break;
                    }
                },
            }
        }
    }

    /// Executes one task with retries.
    pub async fn process(&self, task: &Task) -> Outcome {
        let mut attempt = 1;
        loop {
            match self.handler.handle(task).await {
                Ok(()) => {
                    tracing::info!(task = task.name(), attempt, "task done");
                    return Outcome::Done { attempts: attempt };
                }
                Err(err) if !err.is_retryable() => {
                    tracing::warn!(task = task.name(), error = %err, "task rejected");
                    return Outcome::Rejected(err);
                }
                Err(err) if attempt >= self.policy.max_attempts => {
                    tracing::error!(task = task.name(), attempt, error = %err, "task failed, giving up");
                    return Outcome::Exhausted(err);
                }
                Err(err) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(task = task.name(), attempt, ?delay, error = %err, "task failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Writes every message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            template = %message.template,
            "mail delivered to log"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_core::traits::MockTaskHandler;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a retryable error until the configured attempt.
    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl TaskHandler for Flaky {
        async fn handle(&self, _task: &Task) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(())
            } else {
                Err(AppError::internal("smtp down"))
            }
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy::new(3, 1)
    }

    fn delete(user_id: i64) -> Task {
        Task::DeleteAccount { user_id }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::new(5, 500);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(4), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let handler = Arc::new(Flaky { calls: AtomicU32::new(0), succeed_on: 3 });
        let worker = Worker::new(handler.clone(), quick());
        assert_eq!(worker.process(&delete(1)).await, Outcome::Done { attempts: 3 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let handler = Arc::new(Flaky { calls: AtomicU32::new(0), succeed_on: u32::MAX });
        let worker = Worker::new(handler.clone(), quick());
        assert!(matches!(worker.process(&delete(1)).await, Outcome::Exhausted(_)));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let mut handler = MockTaskHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_| Err(AppError::validation("bad payload")));
        let worker = Worker::new(Arc::new(handler), quick());
        assert_eq!(
            worker.process(&delete(9)).await,
            Outcome::Rejected(AppError::validation("bad payload"))
        );
    }

    #[tokio::test]
    async fn run_drains_queue_until_closed() {
        let mut handler = MockTaskHandler::new();
        handler.expect_handle().times(2).returning(|_| Ok(()));
        let (queue, rx) = ChannelQueue::new();
        queue.enqueue(delete(1)).unwrap();
        queue.enqueue(delete(2)).unwrap();
        drop(queue);

        Worker::new(Arc::new(handler), quick())
            .run(rx, std::future::pending())
            .await;
    }

    #[tokio::test]
    async fn enqueue_after_worker_gone_fails() {
        let (queue, rx) = ChannelQueue::new();
        drop(rx);
        assert!(matches!(queue.enqueue(delete(1)), Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_idle_worker() {
        let (_queue, rx) = ChannelQueue::new();
        let worker = Worker::new(Arc::new(MockTaskHandler::new()), quick());
        tokio::time::timeout(Duration::from_secs(5), worker.run(rx, async {}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn log_transport_accepts_mail() {
        let message = MailMessage {
            to: "ann@example.com".into(),
            sender: "noreply@firefly.local".into(),
            subject: "[Firefly] Confirm".into(),
            template: "auth/email/confirm".into(),
            params: serde_json::json!({ "token": "t" }),
        };
        LogTransport.deliver(&message).await.unwrap();
    }
}
