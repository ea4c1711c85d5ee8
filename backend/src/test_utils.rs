//! Test utilities shared by every service test.
//!
//! `TestEnvironment` wires the whole backend over a fresh in-memory store
//! with a manual clock, a recording notifier and a small contact directory:
//! bob and carol are registered users, dana is an external contact.
//! The temporary directory is removed when the environment is dropped.
//! `ScriptedConnection` swaps in repositories that interleave or fail on cue.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{LedgerEntry, PaymentRequest};
use tempfile::TempDir;

use crate::config::SchedulerConfig;
use crate::domain::notification_service::{NotificationKind, NotificationPayload, Notifier};
use crate::domain::{Contact, ContactDirectory, ManualClock};
use crate::storage::memory::{
    GoalRepository, LedgerRepository, PaymentRequestRepository, ReminderRepository,
    ReservedHoldRepository,
};
use crate::storage::{Connection, LedgerStorage, MemoryConnection, PaymentRequestStorage};
use crate::Backend;

/// A notification as the notifier saw it
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub to_address: String,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

/// Notifier that records deliveries and can be told to fail per address
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn recover(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    /// Successful deliveries to `address`
    pub fn delivered_to(&self, address: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.to_address == address)
            .count()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        to_address: &str,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()> {
        if self.failing.lock().unwrap().contains(to_address) {
            return Err(anyhow::anyhow!("mailbox {} unreachable", to_address));
        }
        self.sent.lock().unwrap().push(SentNotification {
            to_address: to_address.to_string(),
            kind,
            payload: payload.clone(),
        });
        Ok(())
    }
}

pub fn test_contacts() -> Vec<Contact> {
    let registered: HashMap<&str, &str> = [("bob", "user-bob"), ("carol", "user-carol")].into();
    ["bob", "carol", "dana"]
        .iter()
        .map(|reference| {
            let mut name = reference.to_string();
            name[..1].make_ascii_uppercase();
            Contact {
                reference: reference.to_string(),
                name,
                email: format!("{}@example.com", reference),
                user_id: registered.get(reference).map(|id| id.to_string()),
            }
        })
        .collect()
}

/// Test environment with every service over a fresh store
pub struct TestEnvironment<C: Connection = MemoryConnection> {
    pub backend: Backend<C>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
    /// Scratch directory for file output such as exports
    pub base_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_connection(MemoryConnection::new())
    }
}

impl<C: Connection> TestEnvironment<C> {
    pub fn with_connection(connection: C) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let backend = Backend::new(
            Arc::new(connection),
            Arc::new(clock.clone()),
            notifier.clone(),
            Arc::new(ContactDirectory::new(test_contacts())),
            &SchedulerConfig {
                notification_timeout_secs: 1,
                ..SchedulerConfig::default()
            },
        );

        Self {
            backend,
            clock,
            notifier,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    yield_after_entry_read: AtomicBool,
    fail_request_stores: AtomicBool,
}

/// In-memory store whose repositories can be told to misbehave.
///
/// `interleave_entry_reads` yields to the scheduler after every ledger entry
/// read, so tasks spawned together all read before any of them writes.
/// `fail_request_stores` makes every new payment request fail to store.
#[derive(Clone, Default)]
pub struct ScriptedConnection {
    inner: MemoryConnection,
    script: Arc<Script>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interleave_entry_reads(self) -> Self {
        self.script.yield_after_entry_read.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_request_stores(self) -> Self {
        self.script.fail_request_stores.store(true, Ordering::SeqCst);
        self
    }
}

impl Connection for ScriptedConnection {
    type LedgerRepository = ScriptedLedgerRepository;
    type GoalRepository = GoalRepository;
    type ReservedHoldRepository = ReservedHoldRepository;
    type PaymentRequestRepository = ScriptedPaymentRequestRepository;
    type ReminderRepository = ReminderRepository;

    fn create_ledger_repository(&self) -> Self::LedgerRepository {
        ScriptedLedgerRepository {
            inner: self.inner.create_ledger_repository(),
            script: self.script.clone(),
        }
    }

    fn create_goal_repository(&self) -> Self::GoalRepository {
        self.inner.create_goal_repository()
    }

    fn create_reserved_hold_repository(&self) -> Self::ReservedHoldRepository {
        self.inner.create_reserved_hold_repository()
    }

    fn create_payment_request_repository(&self) -> Self::PaymentRequestRepository {
        ScriptedPaymentRequestRepository {
            inner: self.inner.create_payment_request_repository(),
            script: self.script.clone(),
        }
    }

    fn create_reminder_repository(&self) -> Self::ReminderRepository {
        self.inner.create_reminder_repository()
    }
}

#[derive(Clone)]
pub struct ScriptedLedgerRepository {
    inner: LedgerRepository,
    script: Arc<Script>,
}

#[async_trait]
impl LedgerStorage for ScriptedLedgerRepository {
    async fn store_entry(&self, entry: &LedgerEntry) -> Result<()> {
        self.inner.store_entry(entry).await
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        let entry = self.inner.get_entry(entry_id).await?;
        if self.script.yield_after_entry_read.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(entry)
    }

    async fn list_entries(&self, owner: &str) -> Result<Vec<LedgerEntry>> {
        self.inner.list_entries(owner).await
    }

    async fn update_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        self.inner.update_entry(entry).await
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        self.inner.delete_entry(entry_id).await
    }
}

#[derive(Clone)]
pub struct ScriptedPaymentRequestRepository {
    inner: PaymentRequestRepository,
    script: Arc<Script>,
}

#[async_trait]
impl PaymentRequestStorage for ScriptedPaymentRequestRepository {
    async fn store_request(&self, request: &PaymentRequest) -> Result<()> {
        if self.script.fail_request_stores.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("payment_requests table unavailable"));
        }
        self.inner.store_request(request).await
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<PaymentRequest>> {
        self.inner.get_request(request_id).await
    }

    async fn list_requests(&self, owner: &str) -> Result<Vec<PaymentRequest>> {
        self.inner.list_requests(owner).await
    }

    async fn list_pending_requests(&self) -> Result<Vec<PaymentRequest>> {
        self.inner.list_pending_requests().await
    }

    async fn update_request(&self, request: &PaymentRequest) -> Result<bool> {
        self.inner.update_request(request).await
    }
}
