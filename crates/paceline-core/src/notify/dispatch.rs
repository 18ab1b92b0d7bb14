//! Notification delivery fan-out.
//!
//! A fired batch is grouped by user. Users are serviced concurrently up to
//! a small global cap (third-party rate limits); within one user delivery
//! is strictly sequential, and a failure for one user never suppresses
//! another user's notifications.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DeliveryConfig;
use crate::error::CoreError;
use crate::notify::PlannedNotification;

/// Delivery collaborator: push, SMS, and phone calls live behind this seam.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &PlannedNotification) -> Result<(), CoreError>;
}

/// Counts for one dispatched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans a notification batch out to the sink.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    config: DeliveryConfig,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, config: DeliveryConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_users.max(1)));
        Self {
            sink,
            config,
            permits,
        }
    }

    /// Deliver a batch. Never fails as a whole; per-notification failures
    /// are retried a bounded number of times, then logged and counted.
    pub async fn dispatch(&self, batch: Vec<PlannedNotification>) -> DispatchOutcome {
        let mut by_user: BTreeMap<String, Vec<PlannedNotification>> = BTreeMap::new();
        for notification in batch {
            by_user
                .entry(notification.user_id.clone())
                .or_default()
                .push(notification);
        }

        let mut tasks: JoinSet<DispatchOutcome> = JoinSet::new();
        for (user_id, items) in by_user {
            let sink = Arc::clone(&self.sink);
            let permits = Arc::clone(&self.permits);
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return DispatchOutcome {
                            delivered: 0,
                            failed: items.len(),
                        }
                    }
                };
                let mut outcome = DispatchOutcome::default();
                for item in &items {
                    if deliver_with_retries(sink.as_ref(), item, &config).await {
                        outcome.delivered += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
                debug!(
                    user_id = %user_id,
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "user batch dispatched"
                );
                outcome
            });
        }

        let mut total = DispatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    total.delivered += outcome.delivered;
                    total.failed += outcome.failed;
                }
                Err(e) => warn!(error = %e, "delivery task panicked"),
            }
        }
        total
    }
}

async fn deliver_with_retries(
    sink: &dyn NotificationSink,
    notification: &PlannedNotification,
    config: &DeliveryConfig,
) -> bool {
    let attempts = config.max_attempts.max(1);
    for attempt in 1..=attempts {
        match sink.deliver(notification).await {
            Ok(()) => return true,
            Err(e) => {
                warn!(
                    user_id = %notification.user_id,
                    channel = %notification.channel,
                    attempt,
                    error = %e,
                    "notification delivery failed"
                );
                if attempt < attempts {
                    let backoff = config.retry_backoff_ms * attempt as u64;
                    tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                }
            }
        }
    }
    false
}
