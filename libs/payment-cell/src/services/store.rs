use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Payment, PaymentError};

pub type PaymentResult<T> = Result<T, PaymentError>;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Non-deleted payments of the tenant recorded against any of `appointment_ids`,
    /// oldest first.
    async fn find_live_for_appointments(
        &self,
        tenant_id: &str,
        appointment_ids: &[Uuid],
    ) -> PaymentResult<Vec<Payment>>;

    async fn get(&self, id: Uuid) -> PaymentResult<Option<Payment>>;

    async fn insert(&self, payment: &Payment) -> PaymentResult<Payment>;

    async fn replace(&self, payment: &Payment) -> PaymentResult<Payment>;

    /// Flags the payment deleted; the row stays for the ledger.
    async fn soft_delete(&self, id: Uuid) -> PaymentResult<Payment>;
}
