//! # In-memory storage
//!
//! Process-local implementation of the storage traits. Each table is a
//! versioned map, so per-record writes are compare-and-swap and two writers
//! racing on the same record cannot both win.

pub mod connection;
pub mod goal_repository;
pub mod hold_repository;
pub mod ledger_repository;
pub mod payment_request_repository;
pub mod reminder_repository;
pub mod table;

pub use connection::MemoryConnection;
pub use goal_repository::GoalRepository;
pub use hold_repository::ReservedHoldRepository;
pub use ledger_repository::LedgerRepository;
pub use payment_request_repository::PaymentRequestRepository;
pub use reminder_repository::ReminderRepository;
