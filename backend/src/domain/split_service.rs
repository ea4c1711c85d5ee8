//! # Split Settlement
//!
//! Group expenses carry one share per friend who owes part of the bill.
//! This service creates them, turns paid shares into income, and keeps the
//! in-app reminders in step with the shares.
//!
//! ## Key Responsibilities
//!
//! - Resolve every share's counterparty once, at creation
//! - Create one reminder per pending share owed by a registered user
//! - Notify every share recipient when the expense is added (best effort)
//! - Settle a share exactly once and record the settlement as income
//!
//! ## Business Rules
//!
//! - Settling a paid share fails with `AlreadySettled` and writes nothing
//! - A notification failure never undoes the expense or its shares
//! - Settling retires the matching reminder with `payment_received`

use std::sync::Arc;

use tracing::{error, info, warn};

use shared::{
    CreateGroupExpenseRequest, EntryKind, EntryOrigin, LedgerEntry, OutstandingShare, Recipient,
    Reminder, Share, ShareStatus,
};

use super::clock::Clock;
use super::commands::{categories, AppendEntryCommand};
use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use super::identity::{resolve_recipient, IdentityResolver};
use super::ledger_service::LedgerService;
use super::notification_service::{NotificationKind, NotificationPayload, NotificationService};
use super::reminder_lifecycle::{retire_reminders, Retirement};
use super::validation::validate_owner;
use crate::storage::{Connection, LedgerStorage, ReminderStorage};

#[derive(Clone)]
pub struct SplitService<C: Connection> {
    ledger_service: LedgerService<C>,
    reminder_repository: C::ReminderRepository,
    resolver: Arc<dyn IdentityResolver>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> SplitService<C> {
    pub fn new(
        connection: Arc<C>,
        ledger_service: LedgerService<C>,
        resolver: Arc<dyn IdentityResolver>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger_service,
            reminder_repository: connection.create_reminder_repository(),
            resolver,
            notifications,
            clock,
        }
    }

    /// Record an expense the owner paid in full and split it into shares
    pub async fn create_group_expense(
        &self,
        owner: &str,
        request: CreateGroupExpenseRequest,
    ) -> LedgerResult<LedgerEntry> {
        validate_owner(owner)?;
        if request.shares.is_empty() {
            return Err(LedgerError::validation("A group expense needs at least one share"));
        }

        let mut shares = Vec::with_capacity(request.shares.len());
        for share_request in &request.shares {
            let recipient = resolve_recipient(&self.resolver, &share_request.recipient_ref).await?;
            shares.push(Share {
                id: Share::generate_id(),
                recipient_ref: share_request.recipient_ref.clone(),
                recipient,
                amount_owed: share_request.amount_owed,
                status: ShareStatus::Pending,
                paid_at: None,
            });
        }

        let entry = self
            .ledger_service
            .append(AppendEntryCommand {
                owner: owner.to_string(),
                title: request.title,
                amount: request.amount,
                kind: EntryKind::Expense,
                category: request.category,
                occurred_at: request.occurred_at,
                group_id: request.group_id,
                shares,
                notes: request.notes,
                origin: None,
            })
            .await?;

        let mut reminders = 0;
        let mut notified = 0;
        for share in entry.shares.iter().filter(|s| s.is_pending()) {
            if let Recipient::Registered { user_id, email, .. } = &share.recipient {
                let reminder = self.reminder_for(&entry, share, user_id, email);
                match self.reminder_repository.store_reminder(&reminder).await {
                    Ok(()) => reminders += 1,
                    Err(e) => error!("Failed to store reminder for share {}: {}", share.id, e),
                }
            }

            let payload = NotificationPayload {
                amount: share.amount_owed,
                reason: entry.title.clone(),
                counterparty: owner.to_string(),
                due_date: None,
            };
            if self
                .notifications
                .send_best_effort(share.recipient.email(), NotificationKind::ExpenseAdded, &payload)
                .await
            {
                notified += 1;
            }
        }

        info!(
            "Created group expense {} for {} with {} shares ({} reminders, {} notified)",
            entry.id,
            owner,
            entry.shares.len(),
            reminders,
            notified
        );
        Ok(entry)
    }

    /// Settle one share and return the income entry recording the payment
    pub async fn mark_share_paid(
        &self,
        owner: &str,
        entry_id: &str,
        share_id: &str,
    ) -> LedgerResult<LedgerEntry> {
        let (entry, share) = self.settle_share(owner, entry_id, share_id).await?;

        let command = AppendEntryCommand::derived(
            owner,
            format!("{} settled {}", share.recipient.name(), entry.title),
            share.amount_owed,
            EntryKind::Income,
            categories::SETTLEMENT,
            EntryOrigin::ShareSettlement {
                entry_id: entry_id.to_string(),
                share_id: share_id.to_string(),
            },
        );
        let income = match self.ledger_service.append(command).await {
            Ok(income) => income,
            Err(e) => {
                self.reopen_share(entry_id, share_id).await;
                return Err(e);
            }
        };

        if let Err(e) = retire_reminders(
            &self.reminder_repository,
            entry_id,
            Some(share_id),
            Retirement::PaymentReceived,
            self.clock.now(),
        )
        .await
        {
            error!("Failed to retire reminder for settled share {}: {}", share_id, e);
        }

        info!(
            "Share {} of entry {} settled: {} credited to {}",
            share_id, entry_id, income.amount, owner
        );
        Ok(income)
    }

    /// Pending shares owed to `owner`, oldest expense first
    pub async fn outstanding_shares(&self, owner: &str) -> LedgerResult<Vec<OutstandingShare>> {
        let mut entries = self.ledger_service.repository().list_entries(owner).await?;
        entries.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));

        Ok(entries
            .into_iter()
            .flat_map(|entry| {
                let LedgerEntry { id, title, occurred_at, shares, .. } = entry;
                shares
                    .into_iter()
                    .filter(Share::is_pending)
                    .map(move |share| OutstandingShare {
                        entry_id: id.clone(),
                        entry_title: title.clone(),
                        occurred_at,
                        share,
                    })
            })
            .collect())
    }

    /// Reminders derived from an entry's shares, including retired ones
    pub async fn reminders_for_entry(&self, entry_id: &str) -> LedgerResult<Vec<Reminder>> {
        Ok(self.reminder_repository.list_reminders_for_entry(entry_id).await?)
    }

    fn reminder_for(&self, entry: &LedgerEntry, share: &Share, user_id: &str, email: &str) -> Reminder {
        Reminder {
            id: Reminder::generate_id(),
            entry_id: entry.id.clone(),
            share_id: share.id.clone(),
            to_user: user_id.to_string(),
            to_address: email.to_string(),
            from_user: entry.owner.clone(),
            amount: share.amount_owed,
            message: entry.title.clone(),
            active: true,
            sent: false,
            last_sent_at: None,
            payment_received: false,
            deactivated_at: None,
            created_at: self.clock.now(),
            version: 0,
        }
    }

    /// Flip a pending share to paid. The version check makes concurrent
    /// settlements of the same share resolve to exactly one winner.
    async fn settle_share(
        &self,
        owner: &str,
        entry_id: &str,
        share_id: &str,
    ) -> LedgerResult<(LedgerEntry, Share)> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut entry = self.ledger_service.get_entry(owner, entry_id).await?;
            let now = self.clock.now();

            let share = entry
                .shares
                .iter_mut()
                .find(|s| s.id == share_id)
                .ok_or_else(|| {
                    LedgerError::not_found(format!("share {} on entry {}", share_id, entry_id))
                })?;
            if !share.is_pending() {
                return Err(LedgerError::AlreadySettled(format!("share {}", share_id)));
            }
            share.status = ShareStatus::Paid;
            share.paid_at = Some(now);
            let share = share.clone();

            if self.ledger_service.repository().update_entry(&entry).await? {
                entry.version += 1;
                return Ok((entry, share));
            }
        }
        Err(LedgerError::Conflict(format!("share {}", share_id)))
    }

    async fn reopen_share(&self, entry_id: &str, share_id: &str) {
        let repository = self.ledger_service.repository();
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut entry = match repository.get_entry(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to reopen share {}: {}", share_id, e);
                    return;
                }
            };
            if let Some(share) = entry.shares.iter_mut().find(|s| s.id == share_id) {
                share.status = ShareStatus::Pending;
                share.paid_at = None;
            }
            match repository.update_entry(&entry).await {
                Ok(true) => {
                    warn!("Share {} reopened after its settlement entry failed", share_id);
                    return;
                }
                Ok(false) => continue,
                Err(e) => {
                    error!("Failed to reopen share {}: {}", share_id, e);
                    return;
                }
            }
        }
        error!("Gave up reopening share {} after repeated conflicts", share_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedConnection, TestEnvironment};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use shared::{LedgerFilter, ShareRequest};

    fn dinner(shares: Vec<(&str, Decimal)>) -> CreateGroupExpenseRequest {
        CreateGroupExpenseRequest {
            title: "Dinner".to_string(),
            amount: dec!(100),
            category: "Food".to_string(),
            occurred_at: None,
            group_id: Some("friday-crew".to_string()),
            notes: None,
            shares: shares
                .into_iter()
                .map(|(r, amount)| ShareRequest {
                    recipient_ref: r.to_string(),
                    amount_owed: amount,
                })
                .collect(),
        }
    }

    async fn settlements<C: Connection>(env: &TestEnvironment<C>) -> Vec<LedgerEntry> {
        env.backend
            .ledger_service
            .list_entries(
                "alice",
                &LedgerFilter {
                    category: Some(categories::SETTLEMENT.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_group_expense_creates_reminders_for_registered_users() {
        let env = TestEnvironment::new();
        let entry = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![("bob", dec!(25)), ("dana", dec!(25))]))
            .await
            .unwrap();

        assert_eq!(entry.shares.len(), 2);
        assert!(entry.shares.iter().all(Share::is_pending));

        let reminders = env.backend.split_service.reminders_for_entry(&entry.id).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].to_user, "user-bob");
        assert_eq!(reminders[0].amount, dec!(25));
        assert!(reminders[0].active);

        // external contacts still get the expense notification
        assert_eq!(env.notifier.delivered_to("bob@example.com"), 1);
        assert_eq!(env.notifier.delivered_to("dana@example.com"), 1);
        let sent = env.notifier.sent();
        assert!(sent.iter().all(|n| n.kind == NotificationKind::ExpenseAdded));
        assert!(sent.iter().all(|n| n.payload.counterparty == "alice"));
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_expense() {
        let env = TestEnvironment::new();
        env.notifier.fail_for("bob@example.com");

        let entry = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![("bob", dec!(30))]))
            .await
            .unwrap();

        let stored = env.backend.ledger_service.get_entry("alice", &entry.id).await.unwrap();
        assert_eq!(stored.shares.len(), 1);
        let reminders = env.backend.split_service.reminders_for_entry(&entry.id).await.unwrap();
        assert_eq!(reminders.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_recipient_writes_nothing() {
        let env = TestEnvironment::new();
        let err = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![("bob", dec!(30)), ("mallory", dec!(30))]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let entries = env
            .backend
            .ledger_service
            .list_entries("alice", &LedgerFilter::default())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_group_expense_requires_shares() {
        let env = TestEnvironment::new();
        let err = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mark_share_paid_is_idempotent() {
        let env = TestEnvironment::new();
        let service = &env.backend.split_service;
        let entry = service
            .create_group_expense("alice", dinner(vec![("bob", dec!(40))]))
            .await
            .unwrap();
        let share_id = entry.shares[0].id.clone();

        let income = service.mark_share_paid("alice", &entry.id, &share_id).await.unwrap();
        assert_eq!(income.kind, EntryKind::Income);
        assert_eq!(income.amount, dec!(40));
        assert_eq!(income.category, categories::SETTLEMENT);
        assert_eq!(
            income.origin,
            Some(EntryOrigin::ShareSettlement {
                entry_id: entry.id.clone(),
                share_id: share_id.clone(),
            })
        );

        let err = service.mark_share_paid("alice", &entry.id, &share_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadySettled(_)));
        assert_eq!(settlements(&env).await.len(), 1);

        let stored = env.backend.ledger_service.get_entry("alice", &entry.id).await.unwrap();
        assert_eq!(stored.shares[0].status, ShareStatus::Paid);
        assert_eq!(stored.shares[0].paid_at, Some(env.clock.now()));

        let reminders = service.reminders_for_entry(&entry.id).await.unwrap();
        assert!(!reminders[0].active);
        assert!(reminders[0].payment_received);
        assert!(reminders[0].deactivated_at.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_settlements_credit_once() {
        // every task reads the pending share before the first write lands
        let env = TestEnvironment::with_connection(ScriptedConnection::new().interleave_entry_reads());
        let entry = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![("carol", dec!(15))]))
            .await
            .unwrap();
        let share_id = entry.shares[0].id.clone();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = env.backend.split_service.clone();
            let entry_id = entry.id.clone();
            let share_id = share_id.clone();
            handles.push(tokio::spawn(async move {
                service.mark_share_paid("alice", &entry_id, &share_id).await
            }));
        }

        let mut settled = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => settled += 1,
                Err(LedgerError::AlreadySettled(_)) => rejected += 1,
                Err(e) => panic!("unexpected settlement error: {}", e),
            }
        }
        assert_eq!(settled, 1);
        assert_eq!(rejected, 3);
        assert_eq!(settlements(&env).await.len(), 1);

        let stored = env.backend.ledger_service.get_entry("alice", &entry.id).await.unwrap();
        assert_eq!(stored.share(&share_id).map(|s| s.status), Some(ShareStatus::Paid));
        assert_eq!(stored.version, entry.version + 1);
    }

    #[tokio::test]
    async fn test_mark_share_paid_not_found() {
        let env = TestEnvironment::new();
        let service = &env.backend.split_service;
        let entry = service
            .create_group_expense("alice", dinner(vec![("bob", dec!(40))]))
            .await
            .unwrap();

        let err = service.mark_share_paid("alice", "entry::missing", "share::x").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = service.mark_share_paid("alice", &entry.id, "share::missing").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleting_entry_deactivates_reminders() {
        let env = TestEnvironment::new();
        let entry = env
            .backend
            .split_service
            .create_group_expense("alice", dinner(vec![("bob", dec!(20)), ("carol", dec!(20))]))
            .await
            .unwrap();

        env.backend.ledger_service.remove("alice", &entry.id).await.unwrap();

        let reminders = env.backend.split_service.reminders_for_entry(&entry.id).await.unwrap();
        assert_eq!(reminders.len(), 2);
        for reminder in &reminders {
            assert!(!reminder.active);
            assert!(!reminder.payment_received);
            assert_eq!(reminder.deactivated_at, Some(env.clock.now()));
        }

        let report = env.backend.reminder_scheduler.sweep().await.unwrap();
        assert_eq!(report.selected, 0);
    }

    #[tokio::test]
    async fn test_outstanding_shares_and_pending_balance() {
        let env = TestEnvironment::new();
        let service = &env.backend.split_service;
        let entry = service
            .create_group_expense("alice", dinner(vec![("bob", dec!(20)), ("dana", dec!(35))]))
            .await
            .unwrap();
        service.mark_share_paid("alice", &entry.id, &entry.shares[0].id).await.unwrap();

        let outstanding = service.outstanding_shares("alice").await.unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].share.recipient_ref, "dana");
        assert_eq!(outstanding[0].entry_title, "Dinner");

        let snapshot = env.backend.balance_service.project_balance("alice").await.unwrap();
        assert_eq!(snapshot.expenses, dec!(100));
        assert_eq!(snapshot.income, dec!(20));
        assert_eq!(snapshot.pending_shares, dec!(35));
        assert_eq!(snapshot.usable_balance, dec!(-80));
    }
}
