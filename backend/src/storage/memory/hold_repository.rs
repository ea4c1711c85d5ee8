use anyhow::Result;
use async_trait::async_trait;

use shared::ReservedHold;

use super::connection::MemoryConnection;
use crate::storage::traits::ReservedHoldStorage;

/// Memory-backed repository for reserved holds
#[derive(Clone)]
pub struct ReservedHoldRepository {
    connection: MemoryConnection,
}

impl ReservedHoldRepository {
    pub fn new(connection: MemoryConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl ReservedHoldStorage for ReservedHoldRepository {
    async fn store_hold(&self, hold: &ReservedHold) -> Result<()> {
        self.connection.tables().holds.insert(hold)
    }

    async fn get_hold(&self, hold_id: &str) -> Result<Option<ReservedHold>> {
        self.connection.tables().holds.get(hold_id)
    }

    async fn list_holds(&self, owner: &str) -> Result<Vec<ReservedHold>> {
        let mut holds = self.connection.tables().holds.filter(|h| h.owner == owner)?;
        holds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(holds)
    }

    async fn update_hold(&self, hold: &ReservedHold) -> Result<bool> {
        self.connection.tables().holds.compare_and_swap(hold)
    }
}
