//! Domain-level command types.
//!
//! Public request types live in the `shared` crate. These are the internal
//! forms services hand to each other, mainly for ledger writes derived from
//! other records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{EntryKind, EntryOrigin, Share};

/// Input for appending one ledger entry
#[derive(Debug, Clone)]
pub struct AppendEntryCommand {
    pub owner: String,
    pub title: String,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub category: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub group_id: Option<String>,
    pub shares: Vec<Share>,
    pub notes: Option<String>,
    pub origin: Option<EntryOrigin>,
}

impl AppendEntryCommand {
    /// A plain entry derived from another record
    pub fn derived(
        owner: &str,
        title: String,
        amount: Decimal,
        kind: EntryKind,
        category: &str,
        origin: EntryOrigin,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            title,
            amount,
            kind,
            category: category.to_string(),
            occurred_at: None,
            group_id: None,
            shares: Vec::new(),
            notes: None,
            origin: Some(origin),
        }
    }
}

/// Categories of entries the engine writes on its own
pub mod categories {
    pub const SETTLEMENT: &str = "Settlement";
    pub const GOAL_FUNDING: &str = "Goal Funding";
    pub const PAYMENT_REQUEST: &str = "Payment Request";
}
