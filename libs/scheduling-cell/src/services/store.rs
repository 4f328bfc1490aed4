//! Storage and directory contracts the scheduling services depend on.
//!
//! Production adapters live in `services::supabase`; `crate::testing` holds in-memory
//! versions used by the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AppointmentStatus, SchedulingError, Template, WeekWindow};

pub type SchedulingResult<T> = Result<T, SchedulingError>;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Every stored document of the tenant whose `appointment_date` lies in the window.
    async fn find_in_window(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        window: &WeekWindow,
    ) -> SchedulingResult<Vec<Template>>;

    /// Recurring templates whose `end_date` is unset or not before `from`.
    async fn find_recurring_active(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        from: NaiveDate,
    ) -> SchedulingResult<Vec<Template>>;

    async fn get(&self, id: Uuid) -> SchedulingResult<Option<Template>>;

    async fn find_by_booking(&self, tenant_id: &str, booking_id: &str) -> SchedulingResult<Vec<Template>>;

    async fn insert(&self, template: &Template) -> SchedulingResult<Template>;

    /// Overwrites the stored document with `template` (matched by id).
    async fn replace(&self, template: &Template) -> SchedulingResult<Template>;

    async fn delete(&self, id: Uuid) -> SchedulingResult<()>;

    /// Writes `status` and its action flags to every template of the booking in one
    /// storage operation and returns the updated rows.
    async fn set_booking_status(
        &self,
        tenant_id: &str,
        booking_id: &str,
        status: AppointmentStatus,
    ) -> SchedulingResult<Vec<Template>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorName {
    pub first_name: String,
    pub last_name: String,
}

impl DoctorName {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// Resolves all ids in one lookup; unknown ids are simply absent from the map.
    async fn names_for(&self, doctor_ids: &[Uuid]) -> SchedulingResult<HashMap<Uuid, DoctorName>>;
}
