//! # Storage Module
//!
//! Persistence for ledger entries, goals, holds, payment requests and
//! reminders. The domain layer depends on the traits in [`traits`] only; the
//! [`memory`] implementation is what the daemon and the tests run on.
//!
//! ## Design Principles
//!
//! - **Repository Pattern**: one repository per entity, created by a `Connection`
//! - **Optimistic Concurrency**: updates are compare-and-swap on a version
//! - **No lock across await**: repositories finish their critical section
//!   before returning

pub mod memory;
pub mod traits;

pub use memory::MemoryConnection;
pub use traits::{
    Connection, GoalStorage, LedgerStorage, PaymentRequestStorage, ReminderStorage,
    ReservedHoldStorage,
};
