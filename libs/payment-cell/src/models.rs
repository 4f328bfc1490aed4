// libs/payment-cell/src/models.rs
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scheduling_cell::models::{AppointmentStatus, OccurrenceId, SchedulingError, StatusActions};

// ==============================================================================
// TIMESTAMP PARSING
// ==============================================================================

/// Clinic-local timestamps. Offsets sent by clients or the database are dropped, a bare
/// date reads as midnight.
pub(crate) mod local_timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where D: Deserializer<'de> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("Invalid timestamp: {}", raw)))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where D: Deserializer<'de> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse(&raw).ok_or_else(|| D::Error::custom(format!("Invalid timestamp: {}", raw))))
            .transpose()
    }
}

// ==============================================================================
// PAYMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    #[serde(alias = "Open", alias = "unpaid")]
    Open,
    #[serde(alias = "Pending", alias = "partial", alias = "payment_pending")]
    Pending,
    #[serde(alias = "Completed", alias = "paid", alias = "complete")]
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPeriod {
    #[serde(alias = "Single", alias = "one_time")]
    Single,
    #[serde(alias = "Monthly")]
    Monthly,
    #[serde(alias = "Quarterly")]
    Quarterly,
    #[serde(alias = "Biannual", alias = "semiannual")]
    Biannual,
}

impl PaymentPeriod {
    /// Calendar months a recurring period covers; `None` for a single payment.
    pub fn months(&self) -> Option<u32> {
        match self {
            PaymentPeriod::Single => None,
            PaymentPeriod::Monthly => Some(1),
            PaymentPeriod::Quarterly => Some(3),
            PaymentPeriod::Biannual => Some(6),
        }
    }
}

impl fmt::Display for PaymentPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentPeriod::Single => write!(f, "single"),
            PaymentPeriod::Monthly => write!(f, "monthly"),
            PaymentPeriod::Quarterly => write!(f, "quarterly"),
            PaymentPeriod::Biannual => write!(f, "biannual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: String,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub service_ids: Vec<String>,
    /// Always a stored appointment id, never a projected occurrence id.
    pub appointment_id: Uuid,
    pub amount: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_period: PaymentPeriod,
    #[serde(deserialize_with = "local_timestamp::deserialize")]
    pub payment_date: NaiveDateTime,
    #[serde(default, deserialize_with = "local_timestamp::deserialize_option")]
    pub period_end_date: Option<NaiveDateTime>,
    /// Occurrence the period is measured from.
    #[serde(default)]
    pub occurrence_date: Option<NaiveDate>,
    #[serde(default)]
    pub service_fee: f64,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A payment as seen from one occurrence.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnnotatedPayment {
    #[serde(flatten)]
    pub payment: Payment,
    pub is_valid: bool,
    pub is_completed: bool,
}

/// Status written to a booking after a payment mutation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingStatusUpdate {
    pub booking_id: String,
    pub status: AppointmentStatus,
    #[serde(flatten)]
    pub actions: StatusActions,
    pub total_paid: f64,
    pub service_fee: f64,
    pub updated_appointments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub booking: BookingStatusUpdate,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub doctor_id: Uuid,
    #[serde(default)]
    pub service_ids: Vec<String>,
    /// Stored or projected occurrence id; projected ids are recorded against their series.
    pub appointment_id: OccurrenceId,
    pub amount: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_period: PaymentPeriod,
    /// Defaults to now.
    #[serde(default, deserialize_with = "local_timestamp::deserialize_option")]
    pub payment_date: Option<NaiveDateTime>,
    pub service_fee: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePaymentRequest {
    pub service_ids: Option<Vec<String>>,
    pub amount: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_period: Option<PaymentPeriod>,
    #[serde(default, deserialize_with = "local_timestamp::deserialize_option")]
    pub payment_date: Option<NaiveDateTime>,
    pub service_fee: Option<f64>,
    /// Occurrence the new period is measured from; defaults to the one the payment was
    /// recorded for.
    #[serde(default)]
    pub occurrence_date: Option<NaiveDate>,
}

impl UpdatePaymentRequest {
    pub fn changes_period(&self) -> bool {
        self.payment_period.is_some() || self.payment_date.is_some() || self.occurrence_date.is_some()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PaymentError {
    #[error("Payment {0} not found")]
    NotFound(Uuid),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Booking {0} not found")]
    BookingNotFound(String),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_accepts_database_timestamps() {
        let payment: Payment = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "tenant_id": "clinic-a",
            "doctor_id": Uuid::new_v4(),
            "appointment_id": Uuid::new_v4(),
            "amount": 150,
            "payment_status": "paid",
            "payment_period": "Monthly",
            "payment_date": "2025-01-10T10:00:00+02:00",
            "period_end_date": "2025-02-14T23:59:59.999",
            "service_fee": 300
        }))
        .unwrap();

        assert_eq!(payment.payment_status, PaymentStatus::Completed);
        assert_eq!(payment.payment_period, PaymentPeriod::Monthly);
        assert_eq!(payment.payment_date.to_string(), "2025-01-10 10:00:00");
        assert_eq!(payment.period_end_date.unwrap().to_string(), "2025-02-14 23:59:59.999");
        assert!(!payment.is_deleted);
    }

    #[test]
    fn test_create_request_takes_virtual_ids() {
        let parent = Uuid::new_v4();
        let request: CreatePaymentRequest = serde_json::from_value(json!({
            "doctor_id": Uuid::new_v4(),
            "appointment_id": format!("{}_instance_2025-01-14", parent),
            "amount": 300.0,
            "payment_period": "single",
            "payment_date": "2025-01-10",
            "service_fee": 300.0
        }))
        .unwrap();

        assert_eq!(request.appointment_id.template_id(), parent);
        assert_eq!(request.payment_status, PaymentStatus::Open);
        assert_eq!(request.payment_date.unwrap().to_string(), "2025-01-10 00:00:00");
    }

    #[test]
    fn test_period_months() {
        assert_eq!(PaymentPeriod::Single.months(), None);
        assert_eq!(PaymentPeriod::Quarterly.months(), Some(3));
        assert_eq!(PaymentPeriod::Biannual.months(), Some(6));
    }
}
