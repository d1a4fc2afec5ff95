use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use super::invoice_service::InvoiceService;
use super::notification_service::NotificationService;
use super::run_blocking;
use crate::domain::errors::DomainError;
use crate::domain::notification::{EmailJob, InvoiceJob, OutboxKind, OutboxMessage};
use crate::domain::ports::OutboxRepository;

const BASE_BACKOFF_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 3600;

/// How long a claimed message stays invisible to other dispatchers.
const LEASE_SECS: i64 = 120;

/// Delay before the next attempt after `attempts` failures: 30 s doubling, capped at one hour.
pub fn backoff(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    Duration::seconds((BASE_BACKOFF_SECS << exponent).min(MAX_BACKOFF_SECS))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
}

enum Failure {
    /// Worth another attempt later.
    Transient(String),
    /// Malformed message; retrying cannot help.
    Permanent(String),
}

pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxRepository>,
    notifications: Arc<NotificationService>,
    invoices: Arc<InvoiceService>,
    batch_size: i64,
    max_attempts: i32,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        notifications: Arc<NotificationService>,
        invoices: Arc<InvoiceService>,
        batch_size: i64,
        max_attempts: i32,
    ) -> Self {
        Self {
            outbox,
            notifications,
            invoices,
            batch_size,
            max_attempts,
        }
    }

    /// Claims one batch of due messages and runs each side effect once.
    pub async fn dispatch_due(&self) -> Result<DispatchReport, DomainError> {
        let now = Utc::now();
        let outbox = self.outbox.clone();
        let limit = self.batch_size;
        let lease_until = now + Duration::seconds(LEASE_SECS);
        let messages = run_blocking(move || outbox.claim_due(now, limit, lease_until)).await?;

        let mut report = DispatchReport::default();
        for message in messages {
            let id = message.id;
            let attempts = message.attempts;
            let kind = message.kind.clone();
            let outcome = self.execute(message).await;

            let outbox = self.outbox.clone();
            let at = Utc::now();
            match outcome {
                Ok(()) => {
                    run_blocking(move || outbox.mark_processed(id, at)).await?;
                    report.processed += 1;
                }
                Err(Failure::Transient(error)) if attempts + 1 < self.max_attempts => {
                    let next = at + backoff(attempts);
                    log::warn!(
                        "Outbox {kind} message {id} failed (attempt {}), retrying at {next}: {error}",
                        attempts + 1
                    );
                    run_blocking(move || outbox.mark_retry(id, &error, next)).await?;
                    report.retried += 1;
                }
                Err(Failure::Transient(error)) | Err(Failure::Permanent(error)) => {
                    log::error!(
                        "Outbox {kind} message {id} dead-lettered after {} attempt(s): {error}",
                        attempts + 1
                    );
                    run_blocking(move || outbox.mark_failed(id, &error, at)).await?;
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn execute(&self, message: OutboxMessage) -> Result<(), Failure> {
        match OutboxKind::parse(&message.kind) {
            Some(OutboxKind::Email) => {
                let job: EmailJob = serde_json::from_value(message.payload)
                    .map_err(|e| Failure::Permanent(format!("Invalid email payload: {e}")))?;
                self.notifications.send(&job).await.map_err(classify)
            }
            Some(OutboxKind::Invoice) => {
                let job: InvoiceJob = serde_json::from_value(message.payload)
                    .map_err(|e| Failure::Permanent(format!("Invalid invoice payload: {e}")))?;
                self.invoices
                    .generate(job.order_id)
                    .await
                    .map(|_| ())
                    .map_err(classify)
            }
            None => Err(Failure::Permanent(format!(
                "Unknown outbox kind {}",
                message.kind
            ))),
        }
    }

    /// Polls until the process exits. Errors are logged and the loop carries on.
    pub async fn run(self, poll_interval: StdDuration) {
        log::info!(
            "Outbox dispatcher started (every {:?}, batch {})",
            poll_interval,
            self.batch_size
        );
        loop {
            match self.dispatch_due().await {
                Ok(report) if report != DispatchReport::default() => log::info!(
                    "Outbox batch: {} processed, {} retried, {} failed",
                    report.processed,
                    report.retried,
                    report.failed
                ),
                Ok(_) => {}
                Err(e) => log::error!("Outbox dispatch failed: {e}"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn classify(error: DomainError) -> Failure {
    match error {
        DomainError::Validation(msg) | DomainError::NotFound(msg) => Failure::Permanent(msg),
        other => Failure::Transient(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::domain::notification::NewOutboxMessage;
    use crate::testing::{MemoryStorage, MemoryStore, RecordingMailer};

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        dispatcher: OutboxDispatcher,
    }

    fn fixture(max_attempts: i32) -> Fixture {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::new();
        let notifications = Arc::new(NotificationService::new(mailer.clone()));
        let invoices = Arc::new(InvoiceService::new(
            store.clone(),
            store.clone(),
            MemoryStorage::new(),
            "invoices",
        ));
        let dispatcher =
            OutboxDispatcher::new(store.clone(), notifications, invoices, 10, max_attempts);
        Fixture {
            store,
            mailer,
            dispatcher,
        }
    }

    fn email() -> NewOutboxMessage {
        NewOutboxMessage::email(&EmailJob {
            to: "buyer@example.com".to_string(),
            subject: "Order confirmed: ORD-1-A".to_string(),
            template: "order_confirmation".to_string(),
            data: json!({ "orderNumber": "ORD-1-A" }),
        })
        .unwrap()
    }

    fn enqueue(store: &MemoryStore, message: NewOutboxMessage) {
        OutboxRepository::enqueue(store, vec![message]).unwrap();
    }

    #[test]
    fn backoff_doubles_and_caps_at_an_hour() {
        assert_eq!(backoff(0), Duration::seconds(30));
        assert_eq!(backoff(1), Duration::seconds(60));
        assert_eq!(backoff(3), Duration::seconds(240));
        assert_eq!(backoff(7), Duration::seconds(3600));
        assert_eq!(backoff(40), Duration::seconds(3600));
    }

    #[tokio::test]
    async fn delivers_email_and_marks_processed() {
        let f = fixture(5);
        enqueue(&f.store, email());

        let report = f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(f.mailer.sent().len(), 1);
        let t = f.store.tables();
        assert!(t.outbox[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn transient_failure_is_rescheduled_with_backoff() {
        let f = fixture(5);
        f.mailer.fail.store(true, Ordering::SeqCst);
        enqueue(&f.store, email());

        let report = f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(report.retried, 1);
        let t = f.store.tables();
        let entry = &t.outbox[0];
        assert_eq!(entry.message.attempts, 1);
        assert!(entry.message.last_error.is_some());
        assert!(entry.message.next_attempt_at > Utc::now() + Duration::seconds(20));
        assert!(entry.processed_at.is_none() && entry.failed_at.is_none());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let f = fixture(1);
        f.mailer.fail.store(true, Ordering::SeqCst);
        enqueue(&f.store, email());

        let report = f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(f.store.tables().outbox[0].failed_at.is_some());
    }

    #[tokio::test]
    async fn invoice_for_missing_order_is_dead_lettered() {
        let f = fixture(5);
        enqueue(&f.store, NewOutboxMessage::invoice(Uuid::new_v4()));

        let report = f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(report.failed, 1);
        let t = f.store.tables();
        assert_eq!(t.outbox[0].message.last_error.as_deref(), Some("Order not found"));
    }

    #[tokio::test]
    async fn claimed_messages_are_not_dispatched_twice() {
        let f = fixture(5);
        enqueue(&f.store, email());

        f.dispatcher.dispatch_due().await.unwrap();
        let second = f.dispatcher.dispatch_due().await.unwrap();

        assert_eq!(second, DispatchReport::default());
        assert_eq!(f.mailer.sent().len(), 1);
    }
}
