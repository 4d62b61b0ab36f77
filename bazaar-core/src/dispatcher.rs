use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::notification::{EmailMessage, Notifier};

// ============================================================================
// Background Notification Dispatcher
// ============================================================================
//
// Request handlers push messages onto a bounded queue and return immediately.
// A single worker task drains the queue and retries each message with
// exponential backoff. A full queue drops the new message; a message that
// keeps failing is dropped after the last attempt.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct DispatchPolicy {
    /// Messages buffered before new ones are dropped
    pub queue_capacity: usize,
    /// Delivery attempts per message, first attempt included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the delay between retries
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Totals reported by the worker when the queue closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Producer handle; cheap to clone into every service that sends mail.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<EmailMessage>,
}

impl NotificationQueue {
    /// Hands a message to the worker without waiting. Returns `false` when the
    /// message was dropped.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(subject = %message.subject, "Notification queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(subject = %message.subject, "Notification queue closed, dropping message");
                false
            }
        }
    }
}

pub struct NotificationDispatcher {
    rx: mpsc::Receiver<EmailMessage>,
    notifier: Arc<dyn Notifier>,
    policy: DispatchPolicy,
}

impl NotificationDispatcher {
    /// Starts the worker. It runs until every `NotificationQueue` clone is
    /// dropped and the remaining messages are drained.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        policy: DispatchPolicy,
    ) -> (NotificationQueue, JoinHandle<DispatchStats>) {
        let (tx, rx) = mpsc::channel(policy.queue_capacity.max(1));
        let dispatcher = Self { rx, notifier, policy };
        let handle = tokio::spawn(dispatcher.run());
        (NotificationQueue { tx }, handle)
    }

    async fn run(mut self) -> DispatchStats {
        info!("Notification dispatcher started");
        let mut stats = DispatchStats::default();

        while let Some(message) = self.rx.recv().await {
            if self.deliver(&message).await {
                stats.delivered += 1;
            } else {
                stats.dropped += 1;
            }
        }

        info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            "Notification dispatcher stopped"
        );
        stats
    }

    async fn deliver(&self, message: &EmailMessage) -> bool {
        let mut attempt = 0;
        let mut delay = self.policy.initial_backoff;

        loop {
            attempt += 1;
            debug!(attempt, subject = %message.subject, "Sending notification");

            match self.notifier.send(message).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(attempt, "Notification delivered after retry");
                    }
                    return true;
                }
                Err(e) if attempt >= self.policy.max_attempts => {
                    error!(
                        attempt,
                        error = %e,
                        subject = %message.subject,
                        "Notification failed after all retries, dropping"
                    );
                    return false;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Notification failed, retrying after delay"
                    );
                    sleep(delay).await;
                    delay = delay
                        .mul_f64(self.policy.multiplier)
                        .min(self.policy.max_backoff);
                }
            }
        }
    }
}
