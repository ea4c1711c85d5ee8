//! Data types shared between the ledger engine and whatever sits in front of it.
//!
//! Everything here is plain data: entities as they are stored, the request
//! structs each engine operation accepts, and the read-side results. Amounts
//! are exact decimals; timestamps are UTC.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn prefixed_id(prefix: &str) -> String {
    format!("{}::{}", prefix, Uuid::new_v4())
}

/// Direction of a ledger entry relative to the owner's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Money added to the owner's balance
    Income,
    /// Money leaving the owner's balance
    Expense,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Income => write!(f, "income"),
            EntryKind::Expense => write!(f, "expense"),
        }
    }
}

/// Who a share or payment request points at, resolved once when the
/// owning record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    /// A user of the app; can receive in-app reminders
    Registered {
        user_id: String,
        name: String,
        email: String,
    },
    /// A bare contact; only reachable by external notification
    External { name: String, email: String },
}

impl Recipient {
    pub fn name(&self) -> &str {
        match self {
            Recipient::Registered { name, .. } | Recipient::External { name, .. } => name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Recipient::Registered { email, .. } | Recipient::External { email, .. } => email,
        }
    }

    /// The app user behind this recipient, if there is one
    pub fn registered_user_id(&self) -> Option<&str> {
        match self {
            Recipient::Registered { user_id, .. } => Some(user_id),
            Recipient::External { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Pending,
    Paid,
}

/// One recipient's portion of a group expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    /// Opaque contact reference as supplied by the caller
    pub recipient_ref: String,
    pub recipient: Recipient,
    /// Amount this recipient owes the entry owner (> 0)
    pub amount_owed: Decimal,
    pub status: ShareStatus,
    /// Set exactly when `status` is `Paid`
    pub paid_at: Option<DateTime<Utc>>,
}

impl Share {
    /// Format: "share::<uuid>"
    pub fn generate_id() -> String {
        prefixed_id("share")
    }

    pub fn is_pending(&self) -> bool {
        self.status == ShareStatus::Pending
    }
}

/// What caused a ledger entry to exist when it was derived from another record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryOrigin {
    ShareSettlement { entry_id: String, share_id: String },
    GoalFunding { goal_id: String },
    PaymentRequestIssued { request_id: String },
    PaymentRequestSettled { request_id: String },
}

impl fmt::Display for EntryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryOrigin::ShareSettlement { entry_id, share_id } => {
                write!(f, "share_settlement:{}:{}", entry_id, share_id)
            }
            EntryOrigin::GoalFunding { goal_id } => write!(f, "goal_funding:{}", goal_id),
            EntryOrigin::PaymentRequestIssued { request_id } => {
                write!(f, "payment_request_issued:{}", request_id)
            }
            EntryOrigin::PaymentRequestSettled { request_id } => {
                write!(f, "payment_request_settled:{}", request_id)
            }
        }
    }
}

/// An income or expense fact against the owner's balance.
///
/// Amount and kind never change after creation. Only the embedded shares
/// move (pending to paid), guarded by `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub owner: String,
    pub title: String,
    /// Always positive; direction comes from `kind`
    pub amount: Decimal,
    pub kind: EntryKind,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
    pub group_id: Option<String>,
    pub shares: Vec<Share>,
    pub notes: Option<String>,
    pub origin: Option<EntryOrigin>,
    pub version: u64,
}

impl LedgerEntry {
    /// Format: "entry::<uuid>"
    pub fn generate_id() -> String {
        prefixed_id("entry")
    }

    /// Amount with the sign it contributes to the balance
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            EntryKind::Income => self.amount,
            EntryKind::Expense => -self.amount,
        }
    }

    pub fn shares_total(&self) -> Decimal {
        self.shares.iter().map(|s| s.amount_owed).sum()
    }

    /// The part of a group expense the owner carries personally
    pub fn owner_portion(&self) -> Decimal {
        self.amount - self.shares_total()
    }

    pub fn share(&self, share_id: &str) -> Option<&Share> {
        self.shares.iter().find(|s| s.id == share_id)
    }

    pub fn pending_shares_total(&self) -> Decimal {
        self.shares
            .iter()
            .filter(|s| s.is_pending())
            .map(|s| s.amount_owed)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalContribution {
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    InProgress,
    Completed,
}

/// A savings goal. `saved_amount` always equals the sum of `history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub target_amount: Decimal,
    pub saved_amount: Decimal,
    pub history: Vec<GoalContribution>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Goal {
    pub fn generate_id() -> String {
        prefixed_id("goal")
    }

    pub fn remaining(&self) -> Decimal {
        (self.target_amount - self.saved_amount).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Reserved,
    Paid,
    Cancelled,
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldStatus::Reserved => write!(f, "reserved"),
            HoldStatus::Paid => write!(f, "paid"),
            HoldStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Money earmarked for a future obligation; never a ledger movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedHold {
    pub id: String,
    pub owner: String,
    pub amount: Decimal,
    pub reason: String,
    /// Free-form description of who the money is set aside for
    pub recipient: String,
    pub due_date: Option<NaiveDate>,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl ReservedHold {
    pub fn generate_id() -> String {
        prefixed_id("hold")
    }
}

/// When the counterparty of a payment request gets notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderTiming {
    Immediate,
    DayBefore,
    DayOf,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRequestStatus {
    Pending,
    Paid,
    Cancelled,
}

impl fmt::Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentRequestStatus::Pending => write!(f, "pending"),
            PaymentRequestStatus::Paid => write!(f, "paid"),
            PaymentRequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Invoice-like request for money from a counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: String,
    pub owner: String,
    pub counterparty: Recipient,
    pub amount: Decimal,
    pub reason: String,
    pub due_date: Option<NaiveDate>,
    pub reminder_timing: ReminderTiming,
    pub status: PaymentRequestStatus,
    pub reminder_sent: bool,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the transition to `Paid`
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl PaymentRequest {
    pub fn generate_id() -> String {
        prefixed_id("payreq")
    }
}

/// In-app reminder derived from a pending share owed by a registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub entry_id: String,
    pub share_id: String,
    /// Registered user who owes the money
    pub to_user: String,
    pub to_address: String,
    /// Owner of the group expense
    pub from_user: String,
    pub amount: Decimal,
    pub message: String,
    pub active: bool,
    pub sent: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub payment_received: bool,
    /// Set when the reminder was switched off without a payment
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Reminder {
    pub fn generate_id() -> String {
        prefixed_id("reminder")
    }
}

/// Balance figures as the rest of the app displays them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub owner: String,
    pub income: Decimal,
    pub expenses: Decimal,
    /// income - expenses
    pub balance: Decimal,
    /// Sum of holds still in `reserved`
    pub reserved: Decimal,
    /// balance - reserved
    pub usable_balance: Decimal,
    /// Money friends still owe on pending shares; informational only
    pub pending_shares: Decimal,
}

/// A pending share together with the expense it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingShare {
    pub entry_id: String,
    pub entry_title: String,
    pub occurred_at: DateTime<Utc>,
    pub share: Share,
}

/// Outcome of one reminder sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Reminders and payment requests picked by the selection rule
    pub selected: usize,
    pub sent: usize,
    pub failed: usize,
    /// Ids of items whose notification failed; they stay eligible
    pub failed_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLedgerEntryRequest {
    /// Title of the entry (max 256 characters)
    pub title: String,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub category: String,
    /// Defaults to the current time when absent
    pub occurred_at: Option<DateTime<Utc>>,
    pub group_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub recipient_ref: String,
    pub amount_owed: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGroupExpenseRequest {
    pub title: String,
    /// Full amount the owner paid, shares included
    pub amount: Decimal,
    pub category: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub group_id: Option<String>,
    pub notes: Option<String>,
    pub shares: Vec<ShareRequest>,
}

/// Filter for listing ledger entries; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub kind: Option<EntryKind>,
    pub category: Option<String>,
    pub group_id: Option<String>,
    /// Inclusive lower bound on `occurred_at`
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.kind.map_or(true, |k| entry.kind == k)
            && self.category.as_ref().map_or(true, |c| &entry.category == c)
            && self
                .group_id
                .as_ref()
                .map_or(true, |g| entry.group_id.as_ref() == Some(g))
            && self.start.map_or(true, |s| entry.occurred_at >= s)
            && self.end.map_or(true, |e| entry.occurred_at <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub target_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveFundsRequest {
    pub amount: Decimal,
    pub reason: String,
    pub recipient: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequestRequest {
    pub counterparty_ref: String,
    pub amount: Decimal,
    pub reason: String,
    pub due_date: Option<NaiveDate>,
    pub reminder_timing: ReminderTiming,
}
