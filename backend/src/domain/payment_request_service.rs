//! # Payment Requests
//!
//! Invoice-like requests for money a counterparty owes the owner.
//!
//! ## Business Rules
//!
//! - `pending -> paid` and `pending -> cancelled` are the only transitions
//! - Issuing a request appends an expense; settling it appends an income
//! - `day_before` and `day_of` timings need a due date
//! - An explicit reminder records `reminder_sent` only after the notifier
//!   accepted it; a failed send changes nothing and surfaces the error

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use shared::{
    CreatePaymentRequestRequest, EntryKind, EntryOrigin, PaymentRequest, PaymentRequestStatus,
    ReminderTiming,
};

use super::clock::Clock;
use super::commands::{categories, AppendEntryCommand};
use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use super::identity::{resolve_recipient, IdentityResolver};
use super::ledger_service::LedgerService;
use super::notification_service::{NotificationKind, NotificationPayload, NotificationService};
use super::validation::{validate_amount, validate_due_date, validate_owner, validate_text};
use crate::storage::{Connection, PaymentRequestStorage};

#[derive(Clone)]
pub struct PaymentRequestService<C: Connection> {
    request_repository: C::PaymentRequestRepository,
    ledger_service: LedgerService<C>,
    resolver: Arc<dyn IdentityResolver>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> PaymentRequestService<C> {
    pub fn new(
        connection: Arc<C>,
        ledger_service: LedgerService<C>,
        resolver: Arc<dyn IdentityResolver>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            request_repository: connection.create_payment_request_repository(),
            ledger_service,
            resolver,
            notifications,
            clock,
        }
    }

    pub async fn create(
        &self,
        owner: &str,
        request: CreatePaymentRequestRequest,
    ) -> LedgerResult<PaymentRequest> {
        validate_owner(owner)?;
        validate_amount("Requested amount", request.amount)?;
        let reason = validate_text("Reason", &request.reason)?;
        if matches!(request.reminder_timing, ReminderTiming::DayBefore | ReminderTiming::DayOf)
            && request.due_date.is_none()
        {
            return Err(LedgerError::validation(
                "A due date is required for day-before and day-of reminders",
            ));
        }
        validate_due_date(request.due_date)?;
        let counterparty = resolve_recipient(&self.resolver, &request.counterparty_ref).await?;

        let mut payment_request = PaymentRequest {
            id: PaymentRequest::generate_id(),
            owner: owner.to_string(),
            counterparty,
            amount: request.amount,
            reason,
            due_date: request.due_date,
            reminder_timing: request.reminder_timing,
            status: PaymentRequestStatus::Pending,
            reminder_sent: false,
            last_reminder_sent_at: None,
            created_at: self.clock.now(),
            paid_at: None,
            cancelled_at: None,
            version: 0,
        };

        // The request only becomes visible once its expense is in the ledger
        let issued = self
            .ledger_service
            .append(AppendEntryCommand::derived(
                owner,
                format!(
                    "Payment request to {}: {}",
                    payment_request.counterparty.name(),
                    payment_request.reason
                ),
                payment_request.amount,
                EntryKind::Expense,
                categories::PAYMENT_REQUEST,
                EntryOrigin::PaymentRequestIssued {
                    request_id: payment_request.id.clone(),
                },
            ))
            .await?;
        if let Err(e) = self.request_repository.store_request(&payment_request).await {
            if let Err(undo) = self.ledger_service.remove(owner, &issued.id).await {
                error!(
                    "Failed to undo issue entry {} of payment request {} after {}: {}",
                    issued.id, payment_request.id, e, undo
                );
            }
            return Err(e.into());
        }

        info!(
            "Created payment request {} for {}: {} from {}",
            payment_request.id,
            owner,
            payment_request.amount,
            payment_request.counterparty.name()
        );

        if payment_request.reminder_timing == ReminderTiming::Immediate {
            let delivered = self
                .notifications
                .send_best_effort(
                    payment_request.counterparty.email(),
                    NotificationKind::PaymentRequest,
                    &self.payload(&payment_request),
                )
                .await;
            if delivered {
                match self.record_reminder_sent(&payment_request.id).await {
                    Ok(Some(updated)) => payment_request = updated,
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Notified {} but could not record it: {}",
                        payment_request.id, e
                    ),
                }
            }
        }

        Ok(payment_request)
    }

    pub async fn get(&self, owner: &str, request_id: &str) -> LedgerResult<PaymentRequest> {
        let request = self
            .request_repository
            .get_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("payment request {}", request_id)))?;
        if request.owner != owner {
            return Err(LedgerError::Unauthorized(format!(
                "payment request {} does not belong to {}",
                request_id, owner
            )));
        }
        Ok(request)
    }

    /// Requests of one owner, newest first
    pub async fn list(&self, owner: &str) -> LedgerResult<Vec<PaymentRequest>> {
        let mut requests = self.request_repository.list_requests(owner).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Settle a pending request and credit the owner
    pub async fn mark_paid(&self, owner: &str, request_id: &str) -> LedgerResult<PaymentRequest> {
        let now = self.clock.now();
        let request = self
            .transition(owner, request_id, "mark paid", |r| {
                r.status = PaymentRequestStatus::Paid;
                r.paid_at = Some(now);
            })
            .await?;

        let settled = AppendEntryCommand::derived(
            owner,
            format!("{} paid: {}", request.counterparty.name(), request.reason),
            request.amount,
            EntryKind::Income,
            categories::PAYMENT_REQUEST,
            EntryOrigin::PaymentRequestSettled {
                request_id: request.id.clone(),
            },
        );
        if let Err(e) = self.ledger_service.append(settled).await {
            self.reopen(request_id).await;
            return Err(e);
        }

        info!("Payment request {} paid: {} credited to {}", request.id, request.amount, owner);
        Ok(request)
    }

    /// Cancel a pending request. The expense written at issue time stays.
    pub async fn cancel(&self, owner: &str, request_id: &str) -> LedgerResult<PaymentRequest> {
        let now = self.clock.now();
        let request = self
            .transition(owner, request_id, "cancel", |r| {
                r.status = PaymentRequestStatus::Cancelled;
                r.cancelled_at = Some(now);
            })
            .await?;
        info!("Payment request {} cancelled", request.id);
        Ok(request)
    }

    /// Remind the counterparty now, whatever the timing and cooldown say
    pub async fn send_reminder(&self, owner: &str, request_id: &str) -> LedgerResult<PaymentRequest> {
        let request = self.get(owner, request_id).await?;
        if request.status != PaymentRequestStatus::Pending {
            return Err(LedgerError::invalid_transition(
                format!("payment request {}", request_id),
                request.status,
                "send a reminder for",
            ));
        }
        self.deliver_reminder(&request).await
    }

    /// Pending requests across all owners whose reminder has come due
    pub(crate) async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> LedgerResult<Vec<PaymentRequest>> {
        Ok(self
            .request_repository
            .list_pending_requests()
            .await?
            .into_iter()
            .filter(|r| request_reminder_due(r, now, cooldown))
            .collect())
    }

    /// Notify the counterparty, then record the delivery
    pub(crate) async fn deliver_reminder(&self, request: &PaymentRequest) -> LedgerResult<PaymentRequest> {
        self.notifications
            .send(
                request.counterparty.email(),
                NotificationKind::PaymentRequest,
                &self.payload(request),
            )
            .await?;

        let updated = self
            .record_reminder_sent(&request.id)
            .await?
            .unwrap_or_else(|| request.clone());
        info!(
            "Reminded {} about payment request {}",
            request.counterparty.email(),
            request.id
        );
        Ok(updated)
    }

    /// Returns None when the request is gone or no longer pending
    async fn record_reminder_sent(&self, request_id: &str) -> LedgerResult<Option<PaymentRequest>> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut request = match self.request_repository.get_request(request_id).await? {
                Some(r) if r.status == PaymentRequestStatus::Pending => r,
                _ => return Ok(None),
            };
            request.reminder_sent = true;
            request.last_reminder_sent_at = Some(self.clock.now());
            if self.request_repository.update_request(&request).await? {
                request.version += 1;
                return Ok(Some(request));
            }
        }
        Err(LedgerError::Conflict(format!("payment request {}", request_id)))
    }

    fn payload(&self, request: &PaymentRequest) -> NotificationPayload {
        NotificationPayload {
            amount: request.amount,
            reason: request.reason.clone(),
            counterparty: request.owner.clone(),
            due_date: request.due_date,
        }
    }

    async fn transition<F>(
        &self,
        owner: &str,
        request_id: &str,
        action: &'static str,
        apply: F,
    ) -> LedgerResult<PaymentRequest>
    where
        F: Fn(&mut PaymentRequest),
    {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut request = self.get(owner, request_id).await?;
            if request.status != PaymentRequestStatus::Pending {
                return Err(LedgerError::invalid_transition(
                    format!("payment request {}", request_id),
                    request.status,
                    action,
                ));
            }

            apply(&mut request);
            if self.request_repository.update_request(&request).await? {
                request.version += 1;
                return Ok(request);
            }
        }
        Err(LedgerError::Conflict(format!("payment request {}", request_id)))
    }

    async fn reopen(&self, request_id: &str) {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut request = match self.request_repository.get_request(request_id).await {
                Ok(Some(r)) => r,
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to reopen payment request {}: {}", request_id, e);
                    return;
                }
            };
            request.status = PaymentRequestStatus::Pending;
            request.paid_at = None;
            match self.request_repository.update_request(&request).await {
                Ok(true) => {
                    warn!("Payment request {} reopened after its income entry failed", request_id);
                    return;
                }
                Ok(false) => continue,
                Err(e) => {
                    error!("Failed to reopen payment request {}: {}", request_id, e);
                    return;
                }
            }
        }
        error!("Gave up reopening payment request {} after repeated conflicts", request_id);
    }
}

/// Whether the periodic sweep should remind the counterparty of `request`
pub fn request_reminder_due(request: &PaymentRequest, now: DateTime<Utc>, cooldown: Duration) -> bool {
    if request.status != PaymentRequestStatus::Pending
        || request.reminder_timing == ReminderTiming::Manual
    {
        return false;
    }
    if request.reminder_sent {
        return match (request.last_reminder_sent_at, now.checked_sub_signed(cooldown)) {
            (None, _) => true,
            (Some(sent_at), Some(threshold)) => sent_at <= threshold,
            (Some(_), None) => false,
        };
    }

    let today = now.date_naive();
    match (request.reminder_timing, request.due_date) {
        (ReminderTiming::Immediate, _) => true,
        // the earliest representable date has no day before it
        (ReminderTiming::DayBefore, Some(due)) => due.pred_opt().map_or(true, |eve| today >= eve),
        (ReminderTiming::DayOf, Some(due)) => today >= due,
        _ => false,
    }
}
