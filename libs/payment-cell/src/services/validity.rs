// libs/payment-cell/src/services/validity.rs
//
// Read-only: decides which payments cover a viewed occurrence.

use chrono::NaiveDate;
use uuid::Uuid;

use scheduling_cell::models::{OccurrenceId, Template};

use crate::models::{AnnotatedPayment, Payment, PaymentPeriod, PaymentStatus};

/// The occurrence a payment list is viewed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewedOccurrence {
    /// Stored appointment the occurrence is read from.
    pub template_id: Uuid,
    /// Series root of the occurrence (the template itself for a one-off).
    pub parent_template_id: Uuid,
    pub date: NaiveDate,
}

impl ViewedOccurrence {
    /// Explicit date first, then the date inside a projected id, then the template's own date.
    pub fn resolve(explicit: Option<NaiveDate>, id: &OccurrenceId, template: &Template) -> Self {
        let date = explicit
            .or_else(|| id.instance_date())
            .unwrap_or(template.appointment_date);

        Self {
            template_id: template.id,
            parent_template_id: template.recurring_parent_id.unwrap_or(template.id),
            date,
        }
    }
}

pub fn is_valid(payment: &Payment, viewed: &ViewedOccurrence) -> bool {
    match payment.payment_period {
        PaymentPeriod::Single => {
            payment.appointment_id == viewed.template_id || payment.appointment_id == viewed.parent_template_id
        }
        _ => payment
            .period_end_date
            .map_or(true, |end| viewed.date <= end.date()),
    }
}

pub fn annotate(payment: Payment, viewed: &ViewedOccurrence) -> AnnotatedPayment {
    let is_valid = is_valid(&payment, viewed);
    let is_completed = is_valid && payment.payment_status == PaymentStatus::Completed;
    AnnotatedPayment { payment, is_valid, is_completed }
}

/// Annotates and orders payments: completed and valid first, then valid, then the rest.
/// Equal ranks keep their input order.
pub fn resolve(payments: Vec<Payment>, viewed: &ViewedOccurrence) -> Vec<AnnotatedPayment> {
    let mut annotated: Vec<AnnotatedPayment> = payments
        .into_iter()
        .filter(|payment| !payment.is_deleted)
        .map(|payment| annotate(payment, viewed))
        .collect();

    annotated.sort_by_key(rank);
    annotated
}

fn rank(payment: &AnnotatedPayment) -> u8 {
    match (payment.is_completed, payment.is_valid) {
        (true, _) => 0,
        (false, true) => 1,
        (false, false) => 2,
    }
}
