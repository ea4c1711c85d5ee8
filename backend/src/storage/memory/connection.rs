use std::sync::Arc;

use shared::{Goal, LedgerEntry, PaymentRequest, Reminder, ReservedHold};

use super::goal_repository::GoalRepository;
use super::hold_repository::ReservedHoldRepository;
use super::ledger_repository::LedgerRepository;
use super::payment_request_repository::PaymentRequestRepository;
use super::reminder_repository::ReminderRepository;
use super::table::VersionedTable;
use crate::storage::traits::Connection;

pub(crate) struct Tables {
    pub ledger: VersionedTable<LedgerEntry>,
    pub goals: VersionedTable<Goal>,
    pub holds: VersionedTable<ReservedHold>,
    pub requests: VersionedTable<PaymentRequest>,
    pub reminders: VersionedTable<Reminder>,
}

/// MemoryConnection keeps every table in process memory.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Clone)]
pub struct MemoryConnection {
    tables: Arc<Tables>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables {
                ledger: VersionedTable::new("ledger"),
                goals: VersionedTable::new("goals"),
                holds: VersionedTable::new("holds"),
                requests: VersionedTable::new("payment_requests"),
                reminders: VersionedTable::new("reminders"),
            }),
        }
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MemoryConnection {
    type LedgerRepository = LedgerRepository;
    type GoalRepository = GoalRepository;
    type ReservedHoldRepository = ReservedHoldRepository;
    type PaymentRequestRepository = PaymentRequestRepository;
    type ReminderRepository = ReminderRepository;

    fn create_ledger_repository(&self) -> Self::LedgerRepository {
        LedgerRepository::new(self.clone())
    }

    fn create_goal_repository(&self) -> Self::GoalRepository {
        GoalRepository::new(self.clone())
    }

    fn create_reserved_hold_repository(&self) -> Self::ReservedHoldRepository {
        ReservedHoldRepository::new(self.clone())
    }

    fn create_payment_request_repository(&self) -> Self::PaymentRequestRepository {
        PaymentRequestRepository::new(self.clone())
    }

    fn create_reminder_repository(&self) -> Self::ReminderRepository {
        ReminderRepository::new(self.clone())
    }
}
