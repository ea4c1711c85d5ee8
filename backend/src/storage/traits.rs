//! # Storage Traits
//!
//! Storage abstraction for the ledger engine. The domain layer only talks to
//! these traits, so the backing store can change without touching services.
//!
//! Every `update_*` method is a compare-and-swap on the record's `version`:
//! it writes only when the stored version equals the version carried by the
//! caller's copy, bumps the stored version by one and returns `true`. A
//! `false` means somebody else wrote first (or the record is gone) and the
//! caller should re-read before deciding what to do.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Goal, LedgerEntry, PaymentRequest, Reminder, ReservedHold};

/// Ledger entries per owner. Amount and kind of a stored entry are immutable.
#[async_trait]
pub trait LedgerStorage: Send + Sync + Clone {
    /// Store a new entry; fails if the id already exists
    async fn store_entry(&self, entry: &LedgerEntry) -> Result<()>;

    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>>;

    /// All entries of one owner, in no particular order
    async fn list_entries(&self, owner: &str) -> Result<Vec<LedgerEntry>>;

    /// Compare-and-swap the entry's mutable parts (its shares).
    /// Rejects any attempt to change amount or kind.
    async fn update_entry(&self, entry: &LedgerEntry) -> Result<bool>;

    /// Returns the removed entry, or None if it did not exist
    async fn delete_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>>;
}

#[async_trait]
pub trait GoalStorage: Send + Sync + Clone {
    async fn store_goal(&self, goal: &Goal) -> Result<()>;

    async fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>>;

    async fn list_goals(&self, owner: &str) -> Result<Vec<Goal>>;

    async fn update_goal(&self, goal: &Goal) -> Result<bool>;

    /// Returns true if the goal was found and deleted
    async fn delete_goal(&self, goal_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ReservedHoldStorage: Send + Sync + Clone {
    async fn store_hold(&self, hold: &ReservedHold) -> Result<()>;

    async fn get_hold(&self, hold_id: &str) -> Result<Option<ReservedHold>>;

    async fn list_holds(&self, owner: &str) -> Result<Vec<ReservedHold>>;

    async fn update_hold(&self, hold: &ReservedHold) -> Result<bool>;
}

#[async_trait]
pub trait PaymentRequestStorage: Send + Sync + Clone {
    async fn store_request(&self, request: &PaymentRequest) -> Result<()>;

    async fn get_request(&self, request_id: &str) -> Result<Option<PaymentRequest>>;

    async fn list_requests(&self, owner: &str) -> Result<Vec<PaymentRequest>>;

    /// Pending requests across all owners, for the reminder sweep
    async fn list_pending_requests(&self) -> Result<Vec<PaymentRequest>>;

    async fn update_request(&self, request: &PaymentRequest) -> Result<bool>;
}

#[async_trait]
pub trait ReminderStorage: Send + Sync + Clone {
    async fn store_reminder(&self, reminder: &Reminder) -> Result<()>;

    async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>>;

    /// Reminders derived from the shares of one ledger entry
    async fn list_reminders_for_entry(&self, entry_id: &str) -> Result<Vec<Reminder>>;

    /// Reminders that are active and still waiting for payment
    async fn list_open_reminders(&self) -> Result<Vec<Reminder>>;

    async fn update_reminder(&self, reminder: &Reminder) -> Result<bool>;
}

/// Trait defining the interface for storage connections
///
/// A connection is a factory for repositories. The domain layer is generic
/// over it and never sees the concrete store.
pub trait Connection: Send + Sync + Clone + 'static {
    type LedgerRepository: LedgerStorage + 'static;
    type GoalRepository: GoalStorage + 'static;
    type ReservedHoldRepository: ReservedHoldStorage + 'static;
    type PaymentRequestRepository: PaymentRequestStorage + 'static;
    type ReminderRepository: ReminderStorage + 'static;

    fn create_ledger_repository(&self) -> Self::LedgerRepository;
    fn create_goal_repository(&self) -> Self::GoalRepository;
    fn create_reserved_hold_repository(&self) -> Self::ReservedHoldRepository;
    fn create_payment_request_repository(&self) -> Self::PaymentRequestRepository;
    fn create_reminder_repository(&self) -> Self::ReminderRepository;
}
