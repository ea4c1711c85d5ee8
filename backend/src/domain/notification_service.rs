//! Outbound notifications.
//!
//! The engine never renders or delivers mail itself. It hands a kind plus a
//! small payload to a [`Notifier`] and only cares whether that call worked.
//! Every call is bounded by a timeout so one unreachable recipient cannot
//! stall a sweep.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::errors::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReminderDue,
    ExpenseAdded,
    PaymentRequest,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ReminderDue => write!(f, "reminder-due"),
            NotificationKind::ExpenseAdded => write!(f, "expense-added"),
            NotificationKind::PaymentRequest => write!(f, "payment-request"),
        }
    }
}

/// Fields the mail templates fill in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub amount: Decimal,
    pub reason: String,
    /// Display name of the person the money is owed to
    pub counterparty: String,
    pub due_date: Option<chrono::NaiveDate>,
}

/// Delivery collaborator. Implementations should not retry internally;
/// the scheduler owns retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        to_address: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()>;
}

/// Notifier that only writes a log line. Used by the daemon when no real
/// transport is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        to_address: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()> {
        info!(
            "📧 {} to {}: {} owed to {} for {}",
            kind, to_address, payload.amount, payload.counterparty, payload.reason
        );
        Ok(())
    }
}

/// Wraps a [`Notifier`] with a timeout and the engine's error mapping
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Deliver one notification; failures and timeouts become `NotificationFailed`
    pub async fn send(
        &self,
        to_address: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> LedgerResult<()> {
        match tokio::time::timeout(self.timeout, self.notifier.notify(to_address, kind, payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LedgerError::NotificationFailed(format!(
                "{} to {}: {}",
                kind, to_address, e
            ))),
            Err(_) => Err(LedgerError::NotificationFailed(format!(
                "{} to {} timed out after {:?}",
                kind, to_address, self.timeout
            ))),
        }
    }

    /// Deliver without letting a failure escape. Returns whether it worked.
    pub async fn send_best_effort(
        &self,
        to_address: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> bool {
        match self.send(to_address, kind, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Best-effort notification dropped: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingNotifier;
    use rust_decimal_macros::dec;

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify(&self, _: &str, _: NotificationKind, _: &NotificationPayload) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            amount: dec!(20),
            reason: "Concert tickets".to_string(),
            counterparty: "Alice".to_string(),
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let service = NotificationService::new(Arc::new(SlowNotifier), Duration::from_millis(20));
        let result = service.send("bob@example.com", NotificationKind::ReminderDue, &payload()).await;
        assert!(matches!(result, Err(LedgerError::NotificationFailed(msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_for("bob@example.com");
        let service = NotificationService::new(notifier.clone(), Duration::from_secs(1));

        assert!(!service.send_best_effort("bob@example.com", NotificationKind::ExpenseAdded, &payload()).await);
        assert!(service.send_best_effort("carol@example.com", NotificationKind::ExpenseAdded, &payload()).await);
        assert_eq!(notifier.delivered_to("carol@example.com"), 1);
        assert_eq!(notifier.delivered_to("bob@example.com"), 0);
    }
}
