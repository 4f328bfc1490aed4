// libs/payment-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Payment, PaymentError};
use crate::services::store::{PaymentResult, PaymentStore};

const PAYMENTS: &str = "/rest/v1/payments";

fn database_error(e: anyhow::Error) -> PaymentError {
    error!("Payment storage failure: {}", e);
    PaymentError::DatabaseError(e.to_string())
}

fn parse_rows(rows: Vec<Value>) -> PaymentResult<Vec<Payment>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse payment: {}", e)))
        })
        .collect()
}

/// `payments` table over PostgREST with the caller's token.
pub struct SupabasePaymentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabasePaymentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> PaymentResult<Option<Payment>> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                method,
                path,
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(database_error)?;

        Ok(parse_rows(rows)?.into_iter().next())
    }
}

#[async_trait]
impl PaymentStore for SupabasePaymentStore {
    async fn find_live_for_appointments(
        &self,
        tenant_id: &str,
        appointment_ids: &[Uuid],
    ) -> PaymentResult<Vec<Payment>> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = appointment_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!(
            "{}?tenant_id=eq.{}&appointment_id=in.({})&is_deleted=eq.false&order=payment_date.asc",
            PAYMENTS,
            urlencoding::encode(tenant_id),
            ids
        );
        debug!("Fetching live payments for {} appointments", appointment_ids.len());

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(database_error)?;
        parse_rows(rows)
    }

    async fn get(&self, id: Uuid) -> PaymentResult<Option<Payment>> {
        let path = format!("{}?id=eq.{}", PAYMENTS, id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(database_error)?;
        Ok(parse_rows(rows)?.into_iter().next())
    }

    async fn insert(&self, payment: &Payment) -> PaymentResult<Payment> {
        let body = serde_json::to_value(payment)
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        self.write(Method::POST, PAYMENTS, body)
            .await?
            .ok_or_else(|| PaymentError::DatabaseError("Payment insert returned no rows".to_string()))
    }

    async fn replace(&self, payment: &Payment) -> PaymentResult<Payment> {
        let body = serde_json::to_value(payment)
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;
        let path = format!("{}?id=eq.{}", PAYMENTS, payment.id);

        self.write(Method::PATCH, &path, body)
            .await?
            .ok_or(PaymentError::NotFound(payment.id))
    }

    async fn soft_delete(&self, id: Uuid) -> PaymentResult<Payment> {
        let path = format!("{}?id=eq.{}", PAYMENTS, id);

        self.write(Method::PATCH, &path, json!({ "is_deleted": true }))
            .await?
            .ok_or(PaymentError::NotFound(id))
    }
}
