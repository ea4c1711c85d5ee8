use anyhow::Result;
use async_trait::async_trait;

use shared::{PaymentRequest, PaymentRequestStatus};

use super::connection::MemoryConnection;
use crate::storage::traits::PaymentRequestStorage;

/// Memory-backed payment request repository
#[derive(Clone)]
pub struct PaymentRequestRepository {
    connection: MemoryConnection,
}

impl PaymentRequestRepository {
    pub fn new(connection: MemoryConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl PaymentRequestStorage for PaymentRequestRepository {
    async fn store_request(&self, request: &PaymentRequest) -> Result<()> {
        self.connection.tables().requests.insert(request)
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<PaymentRequest>> {
        self.connection.tables().requests.get(request_id)
    }

    async fn list_requests(&self, owner: &str) -> Result<Vec<PaymentRequest>> {
        let mut requests = self.connection.tables().requests.filter(|r| r.owner == owner)?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_pending_requests(&self) -> Result<Vec<PaymentRequest>> {
        let mut requests = self
            .connection
            .tables()
            .requests
            .filter(|r| r.status == PaymentRequestStatus::Pending)?;
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(requests)
    }

    async fn update_request(&self, request: &PaymentRequest) -> Result<bool> {
        self.connection.tables().requests.compare_and_swap(request)
    }
}
