//! Switching reminders off, either because the share was paid or because the
//! entry behind it went away. The two outcomes stay distinguishable:
//! a paid share sets `payment_received`, a deletion sets `deactivated_at`.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use crate::storage::ReminderStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    PaymentReceived,
    EntryDeleted,
}

/// Retire the reminders of an entry, optionally only the one for `share_id`.
/// Returns how many reminders changed state.
pub async fn retire_reminders<R: ReminderStorage>(
    repository: &R,
    entry_id: &str,
    share_id: Option<&str>,
    retirement: Retirement,
    now: DateTime<Utc>,
) -> LedgerResult<usize> {
    let reminders = repository.list_reminders_for_entry(entry_id).await?;
    let mut changed = 0;

    for reminder in reminders {
        if share_id.map_or(false, |id| reminder.share_id != id) {
            continue;
        }

        let mut current = Some(reminder);
        let mut attempts = 0;
        while let Some(mut r) = current.take() {
            if !r.active {
                break;
            }
            attempts += 1;
            if attempts > MAX_UPDATE_ATTEMPTS {
                return Err(LedgerError::Conflict(format!("reminder {}", r.id)));
            }

            r.active = false;
            match retirement {
                Retirement::PaymentReceived => r.payment_received = true,
                Retirement::EntryDeleted => r.deactivated_at = Some(now),
            }

            if repository.update_reminder(&r).await? {
                debug!("Reminder {} retired ({:?})", r.id, retirement);
                changed += 1;
            } else {
                current = repository.get_reminder(&r.id).await?;
            }
        }
    }

    Ok(changed)
}
