// libs/payment-cell/src/services/payment.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use scheduling_cell::models::{OccurrenceId, SchedulingError, Template};
use scheduling_cell::services::{booking_lock_key, TemplateStore};
use shared_utils::locks::KeyedLocks;

use crate::models::{
    AnnotatedPayment, BookingStatusUpdate, CreatePaymentRequest, Payment, PaymentError,
    PaymentOutcome, PaymentPeriod, UpdatePaymentRequest,
};
use crate::services::period::{calculate_period_end, end_of_day};
use crate::services::propagation::BookingStatusPropagator;
use crate::services::store::{PaymentResult, PaymentStore};
use crate::services::validity::{self, ViewedOccurrence};

/// Payment commands. Each write runs under the booking lock: validate, persist, then
/// recompute and fan out the booking status.
pub struct PaymentService {
    templates: Arc<dyn TemplateStore>,
    payments: Arc<dyn PaymentStore>,
    propagator: BookingStatusPropagator,
    locks: KeyedLocks,
}

impl PaymentService {
    pub fn new(templates: Arc<dyn TemplateStore>, payments: Arc<dyn PaymentStore>, locks: KeyedLocks) -> Self {
        Self {
            propagator: BookingStatusPropagator::new(Arc::clone(&templates), Arc::clone(&payments)),
            templates,
            payments,
            locks,
        }
    }

    #[instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn create(&self, tenant_id: &str, request: CreatePaymentRequest) -> PaymentResult<PaymentOutcome> {
        validate_amounts(Some(request.amount), Some(request.service_fee))?;

        let template = self.owned_template(tenant_id, request.appointment_id.template_id()).await?;
        let _guard = self.locks.acquire(&booking_lock_key(&template)).await;

        let payment_date = request
            .payment_date
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let occurrence_date = request
            .appointment_id
            .instance_date()
            .unwrap_or(template.appointment_date);

        let payment = Payment {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            doctor_id: request.doctor_id,
            service_ids: request.service_ids,
            appointment_id: template.id,
            amount: request.amount,
            payment_status: request.payment_status,
            payment_period: request.payment_period,
            payment_date,
            period_end_date: period_end(request.payment_period, payment_date, occurrence_date),
            occurrence_date: Some(occurrence_date),
            service_fee: request.service_fee,
            is_deleted: false,
        };

        let created = self.payments.insert(&payment).await?;
        info!(
            "Recorded {} payment {} of {} for appointment {}",
            created.payment_period, created.id, created.amount, template.id
        );

        let booking = self.propagator.propagate(tenant_id, &template, Some(created.service_fee)).await?;
        Ok(PaymentOutcome { payment: created, booking })
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
        request: UpdatePaymentRequest,
    ) -> PaymentResult<PaymentOutcome> {
        validate_amounts(request.amount, request.service_fee)?;

        let (mut payment, template, _guard) = self.load_locked(tenant_id, payment_id).await?;

        if let Some(service_ids) = request.service_ids.clone() {
            payment.service_ids = service_ids;
        }
        if let Some(amount) = request.amount {
            payment.amount = amount;
        }
        if let Some(payment_status) = request.payment_status {
            payment.payment_status = payment_status;
        }
        if let Some(service_fee) = request.service_fee {
            payment.service_fee = service_fee;
        }
        if request.changes_period() {
            payment.payment_period = request.payment_period.unwrap_or(payment.payment_period);
            payment.payment_date = request.payment_date.unwrap_or(payment.payment_date);
            let occurrence_date = request
                .occurrence_date
                .or(payment.occurrence_date)
                .unwrap_or(template.appointment_date);
            payment.occurrence_date = Some(occurrence_date);
            payment.period_end_date = period_end(payment.payment_period, payment.payment_date, occurrence_date);
            debug!("Payment {} now covers until {:?}", payment.id, payment.period_end_date);
        }

        let updated = self.payments.replace(&payment).await?;
        info!("Updated payment {}", updated.id);

        let booking = self.propagator.propagate(tenant_id, &template, Some(updated.service_fee)).await?;
        Ok(PaymentOutcome { payment: updated, booking })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, tenant_id: &str, payment_id: Uuid) -> PaymentResult<PaymentOutcome> {
        let (payment, template, _guard) = self.load_locked(tenant_id, payment_id).await?;

        let deleted = self.payments.soft_delete(payment.id).await?;
        info!("Soft-deleted payment {}", deleted.id);

        let booking = self.propagator.propagate(tenant_id, &template, Some(payment.service_fee)).await?;
        Ok(PaymentOutcome { payment: deleted, booking })
    }

    /// Re-derives a booking's status from its live payments.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, tenant_id: &str, booking_id: &str) -> PaymentResult<BookingStatusUpdate> {
        let booking = self.templates.find_by_booking(tenant_id, booking_id).await?;
        let template = booking
            .into_iter()
            .next()
            .ok_or_else(|| PaymentError::BookingNotFound(booking_id.to_string()))?;

        let _guard = self.locks.acquire(&booking_lock_key(&template)).await;
        self.propagator.propagate(tenant_id, &template, None).await
    }

    /// Live payments of the occurrence's booking (or of the one-off appointment), annotated
    /// for the viewed date and ordered.
    #[instrument(skip(self))]
    pub async fn list_for_occurrence(
        &self,
        tenant_id: &str,
        id: OccurrenceId,
        viewed_date: Option<NaiveDate>,
    ) -> PaymentResult<Vec<AnnotatedPayment>> {
        let template = self.owned_template(tenant_id, id.template_id()).await?;
        let viewed = ViewedOccurrence::resolve(viewed_date, &id, &template);

        let appointment_ids = if template.is_recurring || template.recurring_parent_id.is_some() {
            let mut ids: Vec<Uuid> = self.templates
                .find_by_booking(tenant_id, &template.booking_id)
                .await?
                .iter()
                .map(|t| t.id)
                .collect();
            if !ids.contains(&template.id) {
                ids.push(template.id);
            }
            ids
        } else {
            vec![template.id]
        };

        let payments = self.payments.find_live_for_appointments(tenant_id, &appointment_ids).await?;
        let resolved = validity::resolve(payments, &viewed);
        debug!(
            "{} payments for {} viewed on {}, {} valid",
            resolved.len(),
            id,
            viewed.date,
            resolved.iter().filter(|p| p.is_valid).count()
        );
        Ok(resolved)
    }

    async fn owned_template(&self, tenant_id: &str, template_id: Uuid) -> PaymentResult<Template> {
        let template = self.templates
            .get(template_id)
            .await?
            .ok_or(SchedulingError::TemplateNotFound(template_id))?;

        if template.tenant_id != tenant_id {
            warn!("Tenant {} tried to reach appointment {} of another clinic", tenant_id, template_id);
            return Err(PaymentError::Forbidden(format!(
                "Appointment {} belongs to another clinic",
                template_id
            )));
        }
        Ok(template)
    }

    async fn owned_payment(&self, tenant_id: &str, payment_id: Uuid) -> PaymentResult<Payment> {
        let payment = self.payments
            .get(payment_id)
            .await?
            .filter(|payment| !payment.is_deleted)
            .ok_or(PaymentError::NotFound(payment_id))?;

        if payment.tenant_id != tenant_id {
            warn!("Tenant {} tried to reach payment {} of another clinic", tenant_id, payment_id);
            return Err(PaymentError::Forbidden(format!(
                "Payment {} belongs to another clinic",
                payment_id
            )));
        }
        Ok(payment)
    }

    /// Payment and its appointment, re-read under the booking lock.
    async fn load_locked(
        &self,
        tenant_id: &str,
        payment_id: Uuid,
    ) -> PaymentResult<(Payment, Template, tokio::sync::OwnedMutexGuard<()>)> {
        let unlocked = self.owned_payment(tenant_id, payment_id).await?;
        let template = self.owned_template(tenant_id, unlocked.appointment_id).await?;

        let guard = self.locks.acquire(&booking_lock_key(&template)).await;
        let payment = self.owned_payment(tenant_id, payment_id).await?;
        let template = self.owned_template(tenant_id, payment.appointment_id).await?;
        Ok((payment, template, guard))
    }
}

/// Period end, never earlier than the end of the payment day.
fn period_end(period: PaymentPeriod, payment_date: NaiveDateTime, occurrence_date: NaiveDate) -> Option<NaiveDateTime> {
    calculate_period_end(period, payment_date, Some(occurrence_date)).map(|end| {
        if end < payment_date {
            end_of_day(payment_date.date()).unwrap_or(payment_date)
        } else {
            end
        }
    })
}

fn validate_amounts(amount: Option<f64>, service_fee: Option<f64>) -> PaymentResult<()> {
    for (field, value) in [("amount", amount), ("service_fee", service_fee)] {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                warn!("Rejected payment with {} {}", field, value);
                return Err(PaymentError::ValidationError(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
    }
    Ok(())
}
