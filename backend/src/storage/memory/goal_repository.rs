use anyhow::Result;
use async_trait::async_trait;

use shared::Goal;

use super::connection::MemoryConnection;
use crate::storage::traits::GoalStorage;

/// Memory-backed goal repository
#[derive(Clone)]
pub struct GoalRepository {
    connection: MemoryConnection,
}

impl GoalRepository {
    pub fn new(connection: MemoryConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl GoalStorage for GoalRepository {
    async fn store_goal(&self, goal: &Goal) -> Result<()> {
        self.connection.tables().goals.insert(goal)
    }

    async fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>> {
        self.connection.tables().goals.get(goal_id)
    }

    async fn list_goals(&self, owner: &str) -> Result<Vec<Goal>> {
        let mut goals = self.connection.tables().goals.filter(|g| g.owner == owner)?;
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(goals)
    }

    async fn update_goal(&self, goal: &Goal) -> Result<bool> {
        self.connection.tables().goals.compare_and_swap(goal)
    }

    async fn delete_goal(&self, goal_id: &str) -> Result<bool> {
        Ok(self.connection.tables().goals.remove(goal_id)?.is_some())
    }
}
