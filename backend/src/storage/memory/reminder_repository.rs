use anyhow::Result;
use async_trait::async_trait;

use shared::Reminder;

use super::connection::MemoryConnection;
use crate::storage::traits::ReminderStorage;

/// Memory-backed reminder repository. Reminders are never deleted, only
/// deactivated, so the table doubles as an audit trail.
#[derive(Clone)]
pub struct ReminderRepository {
    connection: MemoryConnection,
}

impl ReminderRepository {
    pub fn new(connection: MemoryConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ReminderStorage for ReminderRepository {
    async fn store_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.connection.tables().reminders.insert(reminder)
    }

    async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>> {
        self.connection.tables().reminders.get(reminder_id)
    }

    async fn list_reminders_for_entry(&self, entry_id: &str) -> Result<Vec<Reminder>> {
        self.connection
            .tables()
            .reminders
            .filter(|r| r.entry_id == entry_id)
    }

    async fn list_open_reminders(&self) -> Result<Vec<Reminder>> {
        let mut reminders = self
            .connection
            .tables()
            .reminders
            .filter(|r| r.active && !r.payment_received)?;
        reminders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reminders)
    }

    async fn update_reminder(&self, reminder: &Reminder) -> Result<bool> {
        self.connection.tables().reminders.compare_and_swap(reminder)
    }
}
