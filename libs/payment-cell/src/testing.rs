//! In-memory payment store for exercising the services without Supabase.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Payment, PaymentError};
use crate::services::store::{PaymentResult, PaymentStore};

#[derive(Default)]
pub struct InMemoryPaymentStore {
    // insertion order doubles as payment order
    payments: RwLock<Vec<Payment>>,
    reads: AtomicUsize,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Payment> {
        self.payments.read().await.iter().find(|p| p.id == id).cloned()
    }

    pub async fn all(&self) -> Vec<Payment> {
        self.payments.read().await.clone()
    }

    /// Number of live-payment queries served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_live_for_appointments(
        &self,
        tenant_id: &str,
        appointment_ids: &[Uuid],
    ) -> PaymentResult<Vec<Payment>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.payments
            .read()
            .await
            .iter()
            .filter(|p| p.tenant_id == tenant_id && !p.is_deleted && appointment_ids.contains(&p.appointment_id))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> PaymentResult<Option<Payment>> {
        Ok(self.snapshot(id).await)
    }

    async fn insert(&self, payment: &Payment) -> PaymentResult<Payment> {
        self.payments.write().await.push(payment.clone());
        Ok(payment.clone())
    }

    async fn replace(&self, payment: &Payment) -> PaymentResult<Payment> {
        let mut payments = self.payments.write().await;
        let stored = payments
            .iter_mut()
            .find(|p| p.id == payment.id)
            .ok_or(PaymentError::NotFound(payment.id))?;
        *stored = payment.clone();
        Ok(payment.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> PaymentResult<Payment> {
        let mut payments = self.payments.write().await;
        let stored = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PaymentError::NotFound(id))?;
        stored.is_deleted = true;
        Ok(stored.clone())
    }
}
