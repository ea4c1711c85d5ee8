//! Reserved fund tracker.
//!
//! A hold earmarks money for a future obligation. It lowers the usable
//! balance while it is `reserved` and never writes to the ledger, not even
//! when marked paid: the actual payment is recorded separately if and when
//! it happens.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use shared::{HoldStatus, ReserveFundsRequest, ReservedHold};

use super::clock::Clock;
use super::errors::{LedgerError, LedgerResult, MAX_UPDATE_ATTEMPTS};
use super::validation::{validate_amount, validate_owner, validate_text};
use crate::storage::{Connection, ReservedHoldStorage};

#[derive(Clone)]
pub struct ReservedFundService<C: Connection> {
    hold_repository: C::ReservedHoldRepository,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> ReservedFundService<C> {
    pub fn new(connection: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            hold_repository: connection.create_reserved_hold_repository(),
            clock,
        }
    }

    pub async fn reserve(
        &self,
        owner: &str,
        request: ReserveFundsRequest,
    ) -> LedgerResult<ReservedHold> {
        validate_owner(owner)?;
        validate_amount("Reserved amount", request.amount)?;
        let reason = validate_text("Reason", &request.reason)?;
        let recipient = validate_text("Recipient", &request.recipient)?;

        let hold = ReservedHold {
            id: ReservedHold::generate_id(),
            owner: owner.to_string(),
            amount: request.amount,
            reason,
            recipient,
            due_date: request.due_date,
            status: HoldStatus::Reserved,
            created_at: self.clock.now(),
            paid_at: None,
            cancelled_at: None,
            version: 0,
        };

        self.hold_repository.store_hold(&hold).await?;
        info!("Reserved {} for {} ({})", hold.amount, owner, hold.id);
        Ok(hold)
    }

    /// Mark a hold as paid. Deliberately not mirrored into the ledger.
    pub async fn mark_paid(&self, owner: &str, hold_id: &str) -> LedgerResult<ReservedHold> {
        let now = self.clock.now();
        let hold = self
            .transition(owner, hold_id, "mark paid", |hold| {
                hold.status = HoldStatus::Paid;
                hold.paid_at = Some(now);
            })
            .await?;
        info!("Hold {} marked paid", hold.id);
        Ok(hold)
    }

    pub async fn cancel(&self, owner: &str, hold_id: &str) -> LedgerResult<ReservedHold> {
        let now = self.clock.now();
        let hold = self
            .transition(owner, hold_id, "cancel", |hold| {
                hold.status = HoldStatus::Cancelled;
                hold.cancelled_at = Some(now);
            })
            .await?;
        info!("Hold {} cancelled", hold.id);
        Ok(hold)
    }

    pub async fn list_holds(&self, owner: &str) -> LedgerResult<Vec<ReservedHold>> {
        Ok(self.hold_repository.list_holds(owner).await?)
    }

    /// Sum of holds still in `reserved`
    pub async fn total_reserved(&self, owner: &str) -> LedgerResult<Decimal> {
        let holds = self.hold_repository.list_holds(owner).await?;
        Ok(reserved_total(&holds))
    }

    /// Move a `reserved` hold to a terminal state, retrying lost races
    async fn transition<F>(
        &self,
        owner: &str,
        hold_id: &str,
        action: &'static str,
        apply: F,
    ) -> LedgerResult<ReservedHold>
    where
        F: Fn(&mut ReservedHold),
    {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let mut hold = self
                .hold_repository
                .get_hold(hold_id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("reserved hold {}", hold_id)))?;

            if hold.owner != owner {
                return Err(LedgerError::Unauthorized(format!(
                    "reserved hold {} does not belong to {}",
                    hold_id, owner
                )));
            }
            if hold.status != HoldStatus::Reserved {
                return Err(LedgerError::invalid_transition(
                    format!("reserved hold {}", hold_id),
                    hold.status,
                    action,
                ));
            }

            apply(&mut hold);
            if self.hold_repository.update_hold(&hold).await? {
                hold.version += 1;
                return Ok(hold);
            }
        }
        Err(LedgerError::Conflict(format!("reserved hold {}", hold_id)))
    }
}

/// Sum of the amounts of holds in `reserved`; paid and cancelled holds are free again
pub fn reserved_total(holds: &[ReservedHold]) -> Decimal {
    holds
        .iter()
        .filter(|h| h.status == HoldStatus::Reserved)
        .map(|h| h.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnvironment;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal) -> ReserveFundsRequest {
        ReserveFundsRequest {
            amount,
            reason: "Rent".to_string(),
            recipient: "Landlord".to_string(),
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_total_reserved_counts_only_reserved() {
        let env = TestEnvironment::new();
        let service = &env.backend.reserved_fund_service;

        let a = service.reserve("alice", request(dec!(100))).await.unwrap();
        let b = service.reserve("alice", request(dec!(250))).await.unwrap();
        service.reserve("alice", request(dec!(40))).await.unwrap();
        assert_eq!(service.total_reserved("alice").await.unwrap(), dec!(390));

        service.mark_paid("alice", &a.id).await.unwrap();
        service.cancel("alice", &b.id).await.unwrap();
        assert_eq!(service.total_reserved("alice").await.unwrap(), dec!(40));
    }

    #[tokio::test]
    async fn test_mark_paid_sets_time_and_skips_ledger() {
        let env = TestEnvironment::new();
        let hold = env
            .backend
            .reserved_fund_service
            .reserve("alice", request(dec!(75)))
            .await
            .unwrap();

        let paid = env.backend.reserved_fund_service.mark_paid("alice", &hold.id).await.unwrap();
        assert_eq!(paid.status, HoldStatus::Paid);
        assert_eq!(paid.paid_at, Some(env.clock.now()));

        let entries = env
            .backend
            .ledger_service
            .list_entries("alice", &Default::default())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_holds_reject_transitions() {
        let env = TestEnvironment::new();
        let service = &env.backend.reserved_fund_service;
        let hold = service.reserve("alice", request(dec!(10))).await.unwrap();

        service.cancel("alice", &hold.id).await.unwrap();
        let err = service.mark_paid("alice", &hold.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_other_owner_is_unauthorized() {
        let env = TestEnvironment::new();
        let service = &env.backend.reserved_fund_service;
        let hold = service.reserve("alice", request(dec!(10))).await.unwrap();

        let err = service.mark_paid("bob", &hold.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_reserve_validation() {
        let env = TestEnvironment::new();
        let err = env
            .backend
            .reserved_fund_service
            .reserve("alice", request(dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
