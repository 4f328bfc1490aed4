// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use scheduling_cell::models::OccurrenceId;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_schedule_writer, require_tenant};

use crate::models::{
    local_timestamp, CreatePaymentRequest, PaymentError, PaymentPeriod, UpdatePaymentRequest,
};
use crate::services::calculate_period_end;
use crate::state::PaymentState;

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::NotFound(_) | PaymentError::BookingNotFound(_) => {
                AppError::NotFound(error.to_string())
            }
            PaymentError::Forbidden(message) => AppError::Forbidden(message),
            PaymentError::ValidationError(message) => AppError::ValidationError(message),
            PaymentError::Scheduling(inner) => AppError::from(inner),
            PaymentError::DatabaseError(message) => AppError::Database(message),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ViewedDateQuery {
    pub viewed_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodEndQuery {
    pub period: PaymentPeriod,
    pub payment_date: String,
    pub occurrence_date: Option<NaiveDate>,
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<Arc<PaymentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;

    let outcome = state.service(auth.token()).create(tenant_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "payment": outcome.payment,
        "booking": outcome.booking,
        "message": "Payment recorded"
    })))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(state): State<Arc<PaymentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;

    let outcome = state.service(auth.token()).update(tenant_id, payment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "payment": outcome.payment,
        "booking": outcome.booking,
        "message": "Payment updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_payment(
    State(state): State<Arc<PaymentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;

    let outcome = state.service(auth.token()).delete(tenant_id, payment_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": outcome.booking,
        "message": "Payment deleted"
    })))
}

#[axum::debug_handler]
pub async fn list_occurrence_payments(
    State(state): State<Arc<PaymentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(occurrence_id): Path<String>,
    Query(query): Query<ViewedDateQuery>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    let id: OccurrenceId = occurrence_id.parse()?;

    let payments = state
        .service(auth.token())
        .list_for_occurrence(tenant_id, id, query.viewed_date)
        .await?;

    Ok(Json(json!({
        "success": true,
        "occurrence_id": id,
        "total": payments.len(),
        "payments": payments
    })))
}

#[axum::debug_handler]
pub async fn period_end(
    Extension(user): Extension<User>,
    Query(query): Query<PeriodEndQuery>,
) -> Result<Json<Value>, AppError> {
    require_tenant(&user)?;
    let payment_date = local_timestamp::parse(&query.payment_date)
        .ok_or_else(|| AppError::ValidationError(format!("Invalid payment_date: {}", query.payment_date)))?;

    let period_end_date = calculate_period_end(query.period, payment_date, query.occurrence_date);

    Ok(Json(json!({
        "success": true,
        "period": query.period,
        "period_end_date": period_end_date
    })))
}

#[axum::debug_handler]
pub async fn reconcile_booking(
    State(state): State<Arc<PaymentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;

    let booking = state.service(auth.token()).reconcile(tenant_id, &booking_id).await?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}
