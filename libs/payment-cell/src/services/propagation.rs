// libs/payment-cell/src/services/propagation.rs
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use scheduling_cell::models::{AppointmentStatus, Template};
use scheduling_cell::services::TemplateStore;

use crate::models::{BookingStatusUpdate, Payment};
use crate::services::store::{PaymentResult, PaymentStore};

/// Booking status implied by the live payments in scope.
pub fn status_for(live_payments: &[Payment], service_fee: f64) -> AppointmentStatus {
    if live_payments.is_empty() {
        return AppointmentStatus::Open;
    }

    if total_paid(live_payments) >= service_fee {
        AppointmentStatus::Completed
    } else {
        AppointmentStatus::PaymentPending
    }
}

pub fn total_paid(live_payments: &[Payment]) -> f64 {
    live_payments
        .iter()
        .filter(|payment| !payment.is_deleted)
        .map(|payment| payment.amount)
        .sum()
}

/// Keeps every template of a booking on the same status after payments change.
pub struct BookingStatusPropagator {
    templates: Arc<dyn TemplateStore>,
    payments: Arc<dyn PaymentStore>,
}

impl BookingStatusPropagator {
    pub fn new(templates: Arc<dyn TemplateStore>, payments: Arc<dyn PaymentStore>) -> Self {
        Self { templates, payments }
    }

    /// Recomputes the status of `template`'s booking from the cumulative live total and
    /// writes it to the whole booking in one operation.
    ///
    /// `service_fee` defaults to the largest fee among the live payments.
    /// The caller holds the booking lock.
    #[instrument(skip(self, template), fields(template_id = %template.id, booking_id = %template.booking_id))]
    pub async fn propagate(
        &self,
        tenant_id: &str,
        template: &Template,
        service_fee: Option<f64>,
    ) -> PaymentResult<BookingStatusUpdate> {
        let scope = self.scope(tenant_id, template).await?;
        let appointment_ids: Vec<Uuid> = scope.iter().map(|t| t.id).collect();

        let live = self.payments.find_live_for_appointments(tenant_id, &appointment_ids).await?;
        let fee = service_fee.unwrap_or_else(|| {
            live.iter().map(|payment| payment.service_fee).fold(0.0, f64::max)
        });
        let status = status_for(&live, fee);
        let paid = total_paid(&live);
        debug!(
            "Booking {} has {} live payments totalling {} against fee {}",
            template.booking_id,
            live.len(),
            paid,
            fee
        );

        let updated = if template.booking_id.is_empty() {
            let mut single = template.clone();
            single.status = status;
            single.actions = status.actions();
            vec![self.templates.replace(&single).await?]
        } else {
            self.templates
                .set_booking_status(tenant_id, &template.booking_id, status)
                .await?
        };

        info!(
            "Booking {} is now {} across {} appointments",
            template.booking_id,
            status,
            updated.len()
        );

        Ok(BookingStatusUpdate {
            booking_id: template.booking_id.clone(),
            status,
            actions: status.actions(),
            total_paid: paid,
            service_fee: fee,
            updated_appointments: updated.len(),
        })
    }

    async fn scope(&self, tenant_id: &str, template: &Template) -> PaymentResult<Vec<Template>> {
        if template.booking_id.is_empty() {
            return Ok(vec![template.clone()]);
        }

        let mut booking = self.templates.find_by_booking(tenant_id, &template.booking_id).await?;
        if !booking.iter().any(|t| t.id == template.id) {
            booking.push(template.clone());
        }
        Ok(booking)
    }
}
