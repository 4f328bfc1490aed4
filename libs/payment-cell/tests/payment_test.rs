use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use payment_cell::models::*;
use payment_cell::services::PaymentService;
use payment_cell::testing::InMemoryPaymentStore;
use scheduling_cell::models::{
    AppointmentStatus, CreateTemplateRequest, DeleteMode, OccurrenceId, Participant, SchedulingError, Template,
};
use scheduling_cell::services::SeriesMutationEngine;
use scheduling_cell::testing::InMemoryTemplateStore;
use shared_utils::locks::KeyedLocks;

const TENANT: &str = "clinic-a";

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn at(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
}

struct Harness {
    templates: Arc<InMemoryTemplateStore>,
    payments: Arc<InMemoryPaymentStore>,
    service: PaymentService,
    engine: SeriesMutationEngine,
    doctor_id: Uuid,
}

impl Harness {
    fn new() -> Self {
        let locks = KeyedLocks::new();
        let templates = Arc::new(InMemoryTemplateStore::new());
        let payments = Arc::new(InMemoryPaymentStore::new());

        Self {
            service: PaymentService::new(templates.clone(), payments.clone(), locks.clone()),
            engine: SeriesMutationEngine::new(templates.clone(), locks),
            templates,
            payments,
            doctor_id: Uuid::new_v4(),
        }
    }

    async fn appointment(&self, date: &str, time_index: u8, recurring: bool) -> Template {
        self.engine
            .create(
                TENANT,
                CreateTemplateRequest {
                    doctor_id: self.doctor_id,
                    day_index: None,
                    time_index,
                    end_time_index: None,
                    slot_count: Some(2),
                    participants: vec![Participant { name: "Dana Levi".to_string() }],
                    phones: vec!["0521234567".to_string()],
                    description: None,
                    booking_id: Some("booking-1".to_string()),
                    appointment_date: day(date),
                    appointment_type: None,
                    is_recurring: recurring,
                    end_date: None,
                },
            )
            .await
            .unwrap()
    }

    fn payment(&self, appointment_id: OccurrenceId, amount: f64, period: PaymentPeriod) -> CreatePaymentRequest {
        CreatePaymentRequest {
            doctor_id: self.doctor_id,
            service_ids: vec!["physio-45".to_string()],
            appointment_id,
            amount,
            payment_status: PaymentStatus::Completed,
            payment_period: period,
            payment_date: Some(at("2025-01-10T10:00:00")),
            service_fee: 300.0,
        }
    }

    async fn statuses(&self) -> Vec<(AppointmentStatus, bool, bool)> {
        self.templates
            .all()
            .await
            .into_iter()
            .map(|t| (t.status, t.actions.awaiting_payment, t.actions.payment_completed))
            .collect()
    }
}

#[tokio::test]
async fn test_scenario_d_monthly_payment_on_projected_occurrence() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let occurrence = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-14") };

    let outcome = harness
        .service
        .create(TENANT, harness.payment(occurrence, 300.0, PaymentPeriod::Monthly))
        .await
        .unwrap();

    assert_eq!(outcome.payment.appointment_id, series.id);
    assert_eq!(outcome.payment.period_end_date, Some(at("2025-02-14T23:59:59.999")));

    let inside = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-02-11") };
    let listed = harness.service.list_for_occurrence(TENANT, inside, Some(day("2025-02-10"))).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_valid && listed[0].is_completed);

    let outside = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-02-18") };
    let listed = harness.service.list_for_occurrence(TENANT, outside, Some(day("2025-02-20"))).await.unwrap();
    assert!(!listed[0].is_valid);
    assert!(!listed[0].is_completed);

    // the date inside the id is used when no explicit date is given
    let listed = harness.service.list_for_occurrence(TENANT, outside, None).await.unwrap();
    assert!(!listed[0].is_valid);
}

#[tokio::test]
async fn test_scenario_e_exact_fee_completes_whole_booking() {
    let harness = Harness::new();
    let tuesday = harness.appointment("2025-01-07", 0, true).await;
    let thursday = harness.appointment("2025-01-09", 8, true).await;
    assert_eq!(tuesday.booking_id, thursday.booking_id);

    let first = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(tuesday.id), 100.0, PaymentPeriod::Monthly))
        .await
        .unwrap();
    assert_eq!(first.booking.status, AppointmentStatus::PaymentPending);
    assert!(harness.statuses().await.iter().all(|s| *s == (AppointmentStatus::PaymentPending, true, false)));

    let writes_before = harness.templates.status_writes();
    let second = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(thursday.id), 200.0, PaymentPeriod::Monthly))
        .await
        .unwrap();

    assert_eq!(second.booking.status, AppointmentStatus::Completed);
    assert_eq!(second.booking.total_paid, 300.0);
    assert_eq!(second.booking.updated_appointments, 2);
    assert_eq!(harness.templates.status_writes(), writes_before + 1);
    assert!(harness.statuses().await.iter().all(|s| *s == (AppointmentStatus::Completed, false, true)));
}

#[tokio::test]
async fn test_soft_delete_reopens_booking() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let outcome = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), 300.0, PaymentPeriod::Monthly))
        .await
        .unwrap();
    assert_eq!(outcome.booking.status, AppointmentStatus::Completed);

    let deleted = harness.service.delete(TENANT, outcome.payment.id).await.unwrap();

    assert!(deleted.payment.is_deleted);
    assert_eq!(deleted.booking.status, AppointmentStatus::Open);
    assert!(harness.payments.snapshot(outcome.payment.id).await.unwrap().is_deleted);
    assert!(harness.statuses().await.iter().all(|s| *s == (AppointmentStatus::Open, true, false)));

    assert_matches!(
        harness.service.delete(TENANT, outcome.payment.id).await,
        Err(PaymentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_update_recomputes_period_and_status() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let created = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), 100.0, PaymentPeriod::Monthly))
        .await
        .unwrap();
    assert_eq!(created.payment.period_end_date, Some(at("2025-02-07T23:59:59.999")));

    let update = UpdatePaymentRequest {
        amount: Some(300.0),
        payment_period: Some(PaymentPeriod::Quarterly),
        occurrence_date: Some(day("2025-01-14")),
        ..UpdatePaymentRequest::default()
    };
    let outcome = harness.service.update(TENANT, created.payment.id, update).await.unwrap();

    assert_eq!(outcome.payment.period_end_date, Some(at("2025-04-14T23:59:59.999")));
    assert_eq!(outcome.booking.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_single_payment_valid_across_series_only() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let occurrence = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-14") };
    let single = harness
        .service
        .create(TENANT, harness.payment(occurrence, 50.0, PaymentPeriod::Single))
        .await
        .unwrap();
    assert_eq!(single.payment.period_end_date, Some(at("2025-01-14T23:59:59.999")));

    let later = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-03-04") };
    let listed = harness.service.list_for_occurrence(TENANT, later, None).await.unwrap();
    assert!(listed[0].is_valid);

    // a standalone split off the series still resolves to the same parent
    let moved = harness
        .engine
        .update(TENANT, OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-21") }, Default::default(), false)
        .await
        .unwrap();
    let listed = harness.service.list_for_occurrence(TENANT, OccurrenceId::Concrete(moved.id), None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].is_valid);
}

#[tokio::test]
async fn test_one_off_only_sees_its_own_payments() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let one_off = harness.appointment("2025-01-08", 4, false).await;
    harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), 100.0, PaymentPeriod::Monthly))
        .await
        .unwrap();

    let listed = harness.service.list_for_occurrence(TENANT, OccurrenceId::Concrete(one_off.id), None).await.unwrap();
    assert!(listed.is_empty());

    let listed = harness.service.list_for_occurrence(TENANT, OccurrenceId::Concrete(series.id), None).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_late_payment_period_not_before_payment_day() {
    let harness = Harness::new();
    let one_off = harness.appointment("2025-01-02", 0, false).await;

    let outcome = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(one_off.id), 300.0, PaymentPeriod::Single))
        .await
        .unwrap();

    assert_eq!(outcome.payment.period_end_date, Some(at("2025-01-10T23:59:59.999")));
}

#[tokio::test]
async fn test_reconcile_heals_drifted_status() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), 300.0, PaymentPeriod::Monthly))
        .await
        .unwrap();
    // simulate a fan-out that never landed
    let mut drifted = harness.templates.snapshot(series.id).await.unwrap();
    drifted.status = AppointmentStatus::Open;
    drifted.actions = AppointmentStatus::Open.actions();
    harness.templates.put(drifted).await;

    let update = harness.service.reconcile(TENANT, &series.booking_id).await.unwrap();

    assert_eq!(update.status, AppointmentStatus::Completed);
    assert_eq!(update.service_fee, 300.0);
    assert_eq!(harness.templates.snapshot(series.id).await.unwrap().status, AppointmentStatus::Completed);

    assert_matches!(
        harness.service.reconcile(TENANT, "no-such-booking").await,
        Err(PaymentError::BookingNotFound(booking)) if booking == "no-such-booking"
    );
}

#[tokio::test]
async fn test_rejects_negative_amount_and_foreign_tenant() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;

    assert_matches!(
        harness
            .service
            .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), -5.0, PaymentPeriod::Monthly))
            .await,
        Err(PaymentError::ValidationError(_))
    );
    assert_matches!(
        harness
            .service
            .create("clinic-b", harness.payment(OccurrenceId::Concrete(series.id), 5.0, PaymentPeriod::Monthly))
            .await,
        Err(PaymentError::Forbidden(_))
    );
    assert_matches!(
        harness
            .service
            .create(TENANT, harness.payment(OccurrenceId::Concrete(Uuid::new_v4()), 5.0, PaymentPeriod::Monthly))
            .await,
        Err(PaymentError::Scheduling(SchedulingError::TemplateNotFound(_)))
    );
    assert!(harness.payments.all().await.is_empty());
}

#[tokio::test]
async fn test_series_delete_keeps_payment_history() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let created = harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(series.id), 300.0, PaymentPeriod::Monthly))
        .await
        .unwrap();

    harness
        .engine
        .delete(TENANT, OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-14") }, DeleteMode::AllSeries)
        .await
        .unwrap();

    assert!(!harness.payments.snapshot(created.payment.id).await.unwrap().is_deleted);
}

#[tokio::test]
async fn test_payment_date_correction_keeps_its_occurrence() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let june = OccurrenceId::Virtual { parent_id: series.id, date: day("2025-06-10") };
    let mut request = harness.payment(june, 300.0, PaymentPeriod::Monthly);
    request.payment_date = Some(at("2025-06-01T09:00:00"));
    let created = harness.service.create(TENANT, request).await.unwrap();
    assert_eq!(created.payment.occurrence_date, Some(day("2025-06-10")));
    assert_eq!(created.payment.period_end_date, Some(at("2025-07-10T23:59:59.999")));

    let correction = UpdatePaymentRequest {
        payment_date: Some(at("2025-06-02T09:00:00")),
        ..UpdatePaymentRequest::default()
    };
    let outcome = harness.service.update(TENANT, created.payment.id, correction).await.unwrap();

    assert_eq!(outcome.payment.period_end_date, Some(at("2025-07-10T23:59:59.999")));
    assert_eq!(outcome.payment.occurrence_date, Some(day("2025-06-10")));
    let listed = harness.service.list_for_occurrence(TENANT, june, None).await.unwrap();
    assert!(listed[0].is_valid);
}

#[tokio::test]
async fn test_single_payment_on_split_off_appointment_is_valid_there() {
    let harness = Harness::new();
    let series = harness.appointment("2025-01-07", 0, true).await;
    let moved = harness
        .engine
        .update(
            TENANT,
            OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-21") },
            Default::default(),
            false,
        )
        .await
        .unwrap();

    harness
        .service
        .create(TENANT, harness.payment(OccurrenceId::Concrete(moved.id), 80.0, PaymentPeriod::Single))
        .await
        .unwrap();

    let from_child = harness
        .service
        .list_for_occurrence(TENANT, OccurrenceId::Concrete(moved.id), None)
        .await
        .unwrap();
    assert_eq!(from_child.len(), 1);
    assert!(from_child[0].is_valid && from_child[0].is_completed);

    // scoped to the appointment it was recorded on, not the rest of the series
    let from_series = harness
        .service
        .list_for_occurrence(TENANT, OccurrenceId::Virtual { parent_id: series.id, date: day("2025-01-28") }, None)
        .await
        .unwrap();
    assert_eq!(from_series.len(), 1);
    assert!(!from_series[0].is_valid);
}
