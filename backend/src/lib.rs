//! # Ledger Settle Backend
//!
//! Ledger, split settlement and reminder engine. The ledger is an
//! append-only list of income and expense entries; every balance is
//! derived from it.
//!
//! - **domain**: services and business rules
//! - **storage**: repository traits and the in-memory store
//! - **config**: daemon configuration

pub mod config;
pub mod domain;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

use std::sync::Arc;

use domain::{
    BalanceService, Clock, ExportService, GoalService, IdentityResolver, LedgerService,
    NotificationService, Notifier, PaymentRequestService, ReminderScheduler, ReservedFundService,
    SplitService,
};
use storage::Connection;

/// Every service wired over one connection
#[derive(Clone)]
pub struct Backend<C: Connection> {
    pub ledger_service: LedgerService<C>,
    pub balance_service: BalanceService<C>,
    pub split_service: SplitService<C>,
    pub goal_service: GoalService<C>,
    pub reserved_fund_service: ReservedFundService<C>,
    pub payment_request_service: PaymentRequestService<C>,
    pub reminder_scheduler: ReminderScheduler<C>,
    pub export_service: ExportService<C>,
}

impl<C: Connection> Backend<C> {
    pub fn new(
        connection: Arc<C>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        resolver: Arc<dyn IdentityResolver>,
        scheduler: &config::SchedulerConfig,
    ) -> Self {
        let notifications = NotificationService::new(notifier, scheduler.notification_timeout());

        let ledger_service = LedgerService::new(connection.clone(), clock.clone());
        let balance_service = BalanceService::new(connection.clone());
        let split_service = SplitService::new(
            connection.clone(),
            ledger_service.clone(),
            resolver.clone(),
            notifications.clone(),
            clock.clone(),
        );
        let goal_service = GoalService::new(connection.clone(), ledger_service.clone(), clock.clone());
        let reserved_fund_service = ReservedFundService::new(connection.clone(), clock.clone());
        let payment_request_service = PaymentRequestService::new(
            connection.clone(),
            ledger_service.clone(),
            resolver,
            notifications.clone(),
            clock.clone(),
        );
        let reminder_scheduler = ReminderScheduler::new(
            connection.clone(),
            payment_request_service.clone(),
            notifications,
            clock,
            scheduler.reminder_cooldown(),
        );
        let export_service = ExportService::new(connection);

        Self {
            ledger_service,
            balance_service,
            split_service,
            goal_service,
            reserved_fund_service,
            payment_request_service,
            reminder_scheduler,
            export_service,
        }
    }

    /// Run the reminder scheduler until `shutdown` resolves
    pub async fn run_scheduler<F>(&self, scheduler: &config::SchedulerConfig, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        self.reminder_scheduler
            .run(scheduler.sweep_interval(), scheduler.run_on_startup, shutdown)
            .await;
    }
}
