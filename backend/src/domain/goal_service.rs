//! Goal service domain logic for the ledger engine.
//!
//! Funding a goal is real money leaving the usable balance, so every
//! contribution is mirrored one to one as an expense in the ledger.
//!
//! ## Business Rules
//!
//! - Target and contribution amounts must be positive
//! - `saved_amount` always equals the sum of the contribution history
//! - A goal completes once saved >= target and never reverts on its own
//! - Completed goals still accept contributions
//! - Deleting a goal is not a refund: its ledger entries stay

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info};

use shared::{CreateGoalRequest, EntryKind, EntryOrigin, Goal, GoalContribution, GoalStatus};

use super::clock::Clock;
use super::commands::{categories, AppendEntryCommand};
use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use super::ledger_service::LedgerService;
use super::validation::{validate_amount, validate_owner, validate_text};
use crate::storage::{Connection, GoalStorage};

/// Service for managing goals and goal funding
#[derive(Clone)]
pub struct GoalService<C: Connection> {
    goal_repository: C::GoalRepository,
    ledger_service: LedgerService<C>,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> GoalService<C> {
    pub fn new(connection: Arc<C>, ledger_service: LedgerService<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            goal_repository: connection.create_goal_repository(),
            ledger_service,
            clock,
        }
    }

    pub async fn create_goal(&self, owner: &str, request: CreateGoalRequest) -> LedgerResult<Goal> {
        validate_owner(owner)?;
        let title = validate_text("Goal title", &request.title)?;
        validate_amount("Goal target amount", request.target_amount)?;

        let goal = Goal {
            id: Goal::generate_id(),
            owner: owner.to_string(),
            title,
            target_amount: request.target_amount,
            saved_amount: Decimal::ZERO,
            history: Vec::new(),
            status: GoalStatus::InProgress,
            created_at: self.clock.now(),
            version: 0,
        };

        self.goal_repository.store_goal(&goal).await?;
        info!("Created goal {} for {}: target {}", goal.id, owner, goal.target_amount);
        Ok(goal)
    }

    pub async fn get_goal(&self, owner: &str, goal_id: &str) -> LedgerResult<Goal> {
        let goal = self
            .goal_repository
            .get_goal(goal_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("goal {}", goal_id)))?;
        if goal.owner != owner {
            return Err(LedgerError::Unauthorized(format!(
                "goal {} does not belong to {}",
                goal_id, owner
            )));
        }
        Ok(goal)
    }

    pub async fn list_goals(&self, owner: &str) -> LedgerResult<Vec<Goal>> {
        Ok(self.goal_repository.list_goals(owner).await?)
    }

    /// Move `amount` from usable balance into the goal.
    ///
    /// Writes the ledger expense first, then the goal. If the goal write
    /// cannot land the expense is removed again, so neither side is left
    /// half-updated.
    pub async fn add_funds(
        &self,
        owner: &str,
        goal_id: &str,
        amount: Decimal,
        note: Option<String>,
    ) -> LedgerResult<Goal> {
        validate_amount("Contribution amount", amount)?;
        let goal = self.get_goal(owner, goal_id).await?;

        let entry = self
            .ledger_service
            .append(AppendEntryCommand::derived(
                owner,
                format!("Saved toward {}", goal.title),
                amount,
                EntryKind::Expense,
                categories::GOAL_FUNDING,
                EntryOrigin::GoalFunding {
                    goal_id: goal_id.to_string(),
                },
            ))
            .await?;

        match self.apply_contribution(goal, amount, note).await {
            Ok(updated) => {
                info!(
                    "Goal {} funded with {} (saved {} of {}, {} to go, {:?})",
                    updated.id,
                    amount,
                    updated.saved_amount,
                    updated.target_amount,
                    updated.remaining(),
                    updated.status
                );
                Ok(updated)
            }
            Err(e) => {
                if let Err(undo) = self.ledger_service.remove(owner, &entry.id).await {
                    error!(
                        "Failed to undo goal funding entry {} after {}: {}",
                        entry.id, e, undo
                    );
                }
                Err(e)
            }
        }
    }

    /// Delete a goal. Its funding entries stay in the ledger.
    pub async fn delete_goal(&self, owner: &str, goal_id: &str) -> LedgerResult<Goal> {
        let goal = self.get_goal(owner, goal_id).await?;
        if !self.goal_repository.delete_goal(goal_id).await? {
            return Err(LedgerError::not_found(format!("goal {}", goal_id)));
        }
        info!("Deleted goal {} for {} (saved {})", goal_id, owner, goal.saved_amount);
        Ok(goal)
    }

    async fn apply_contribution(
        &self,
        mut goal: Goal,
        amount: Decimal,
        note: Option<String>,
    ) -> LedgerResult<Goal> {
        let contribution = GoalContribution {
            amount,
            date: self.clock.now(),
            note,
        };

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            goal.history.push(contribution.clone());
            goal.saved_amount += amount;
            if goal.saved_amount >= goal.target_amount {
                goal.status = GoalStatus::Completed;
            }

            if self.goal_repository.update_goal(&goal).await? {
                goal.version += 1;
                return Ok(goal);
            }

            goal = self
                .goal_repository
                .get_goal(&goal.id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("goal {}", goal.id)))?;
        }
        Err(LedgerError::Conflict(format!("goal {}", goal.id)))
    }
}
