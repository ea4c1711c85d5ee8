//! # Reminder Scheduler
//!
//! Periodically re-nags people who still owe money.
//!
//! ## Key Responsibilities
//!
//! - Select open share reminders that were never sent or whose last send is
//!   at least one cooldown old
//! - Select pending payment requests whose reminder timing has come due
//! - Notify each selected item and record the delivery only on success
//!
//! Delivery is at least once. A failed notification leaves the item exactly
//! as it was, so the next sweep picks it up again. One failing item never
//! stops the rest of the sweep.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use shared::{Reminder, SweepReport};

use super::clock::Clock;
use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use super::notification_service::{NotificationKind, NotificationPayload, NotificationService};
use super::payment_request_service::PaymentRequestService;
use crate::storage::{Connection, ReminderStorage};

pub const DEFAULT_REMINDER_COOLDOWN_DAYS: i64 = 3;
pub const MAX_REMINDER_COOLDOWN_DAYS: i64 = 3650;

#[derive(Clone)]
pub struct ReminderScheduler<C: Connection> {
    reminder_repository: C::ReminderRepository,
    payment_request_service: PaymentRequestService<C>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    sweep_lock: Arc<Mutex<()>>,
}

impl<C: Connection> ReminderScheduler<C> {
    pub fn new(
        connection: Arc<C>,
        payment_request_service: PaymentRequestService<C>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
    ) -> Self {
        Self {
            reminder_repository: connection.create_reminder_repository(),
            payment_request_service,
            notifications,
            clock,
            cooldown,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run one sweep over everything that is due
    pub async fn sweep(&self) -> LedgerResult<SweepReport> {
        let _guard = self.sweep_lock.lock().await;
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let reminders: Vec<Reminder> = self
            .reminder_repository
            .list_open_reminders()
            .await?
            .into_iter()
            .filter(|r| is_due(r, now, self.cooldown))
            .collect();
        let requests = self
            .payment_request_service
            .due_for_reminder(now, self.cooldown)
            .await?;
        report.selected = reminders.len() + requests.len();

        for reminder in &reminders {
            match self.deliver(reminder, now).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    error!("Reminder {} not delivered: {}", reminder.id, e);
                    report.failed += 1;
                    report.failed_ids.push(reminder.id.clone());
                }
            }
        }

        for request in &requests {
            match self.payment_request_service.deliver_reminder(request).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    error!("Payment request reminder {} not delivered: {}", request.id, e);
                    report.failed += 1;
                    report.failed_ids.push(request.id.clone());
                }
            }
        }

        info!(
            "Reminder sweep done: {} selected, {} sent, {} failed",
            report.selected, report.sent, report.failed
        );
        Ok(report)
    }

    /// Sweep everything due, or force one reminder past its cooldown.
    ///
    /// A forced send surfaces `NotificationFailed` to the caller; a sweep
    /// only reports failures in the returned summary.
    pub async fn send_reminder_emails(&self, reminder_id: Option<&str>) -> LedgerResult<SweepReport> {
        let Some(reminder_id) = reminder_id else {
            return self.sweep().await;
        };

        let _guard = self.sweep_lock.lock().await;
        let reminder = self
            .reminder_repository
            .get_reminder(reminder_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("reminder {}", reminder_id)))?;
        if reminder.payment_received {
            return Err(LedgerError::AlreadySettled(format!("reminder {}", reminder_id)));
        }
        if !reminder.active {
            return Err(LedgerError::invalid_transition(
                format!("reminder {}", reminder_id),
                "inactive",
                "send",
            ));
        }

        self.deliver(&reminder, self.clock.now()).await?;
        info!("Forced reminder {} sent to {}", reminder.id, reminder.to_address);
        Ok(SweepReport {
            selected: 1,
            sent: 1,
            failed: 0,
            failed_ids: Vec::new(),
        })
    }

    /// Sweep on every tick of `interval` until `shutdown` resolves.
    ///
    /// The first tick fires immediately when `run_on_startup` is set.
    pub async fn run<F>(&self, interval: std::time::Duration, run_on_startup: bool, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        if !run_on_startup {
            ticker.tick().await;
        }
        tokio::pin!(shutdown);

        info!("Reminder scheduler started (every {:?})", interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reminder scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!("Reminder sweep failed: {}", e);
                    }
                }
            }
        }
    }

    /// Notify first, record after. Nothing is written when the notifier fails.
    async fn deliver(&self, reminder: &Reminder, now: DateTime<Utc>) -> LedgerResult<()> {
        let payload = NotificationPayload {
            amount: reminder.amount,
            reason: reminder.message.clone(),
            counterparty: reminder.from_user.clone(),
            due_date: None,
        };
        self.notifications
            .send(&reminder.to_address, NotificationKind::ReminderDue, &payload)
            .await?;

        let mut current = reminder.clone();
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            current.sent = true;
            current.last_sent_at = Some(now);
            if self.reminder_repository.update_reminder(&current).await? {
                debug!("Reminder {} recorded as sent at {}", current.id, now);
                return Ok(());
            }

            current = match self.reminder_repository.get_reminder(&reminder.id).await? {
                Some(r) if r.active && !r.payment_received => r,
                // retired while the notification was in flight
                _ => return Ok(()),
            };
        }
        Err(LedgerError::Conflict(format!("reminder {}", reminder.id)))
    }
}

/// Selection rule for the sweep: open, and never sent or sent at least one cooldown ago
pub fn is_due(reminder: &Reminder, now: DateTime<Utc>, cooldown: Duration) -> bool {
    if !reminder.active || reminder.payment_received {
        return false;
    }
    if !reminder.sent {
        return true;
    }
    match (reminder.last_sent_at, now.checked_sub_signed(cooldown)) {
        (None, _) => true,
        (Some(sent_at), Some(threshold)) => sent_at <= threshold,
        // a cooldown reaching past the calendar never elapses
        (Some(_), None) => false,
    }
}
