//! # Domain Module
//!
//! Business logic of the ledger and settlement engine.
//!
//! The ledger is the single source of truth for money: every
//! balance-affecting event becomes an immutable entry, and balances are
//! always re-derived from entries. Splits, goals, holds and payment
//! requests layer their own state on top and write to the ledger through
//! [`LedgerService`] only.
//!
//! ## Module Organization
//!
//! - **ledger_service**: append, list and remove entries
//! - **balance_service**: balance and usable-balance projection
//! - **split_service**: group expenses, share settlement, share reminders
//! - **goal_service**: savings goals funded from the ledger
//! - **reserved_fund_service**: earmarked holds that lower usable balance
//! - **payment_request_service**: request/settle/cancel money owed
//! - **reminder_scheduler**: periodic and on-demand reminder delivery
//! - **export_service**: CSV export of a ledger
//!
//! ## Business Rules
//!
//! - `balance = income - expenses`, `usable_balance = balance - reserved`
//! - Derived entries record their origin
//! - A state-machine violation never mutates anything
//! - Notifications are best effort except for explicit "send now" calls

pub mod balance_service;
pub mod clock;
pub mod commands;
pub mod errors;
pub mod export_service;
pub mod goal_service;
pub mod identity;
pub mod ledger_service;
pub mod notification_service;
pub mod payment_request_service;
pub mod reminder_lifecycle;
pub mod reminder_scheduler;
pub mod reserved_fund_service;
pub mod split_service;
pub mod validation;

pub use balance_service::BalanceService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{LedgerError, LedgerResult};
pub use export_service::ExportService;
pub use goal_service::GoalService;
pub use identity::{Contact, ContactDirectory, IdentityResolver};
pub use ledger_service::LedgerService;
pub use notification_service::{
    LogNotifier, NotificationKind, NotificationPayload, NotificationService, Notifier,
};
pub use payment_request_service::PaymentRequestService;
pub use reminder_scheduler::ReminderScheduler;
pub use reserved_fund_service::ReservedFundService;
pub use split_service::SplitService;
