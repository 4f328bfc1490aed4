// libs/scheduling-cell/src/services/supabase.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentStatus, SchedulingError, Template, WeekWindow};
use crate::services::store::{DoctorDirectory, DoctorName, SchedulingResult, TemplateStore};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const DOCTORS: &str = "/rest/v1/doctors";

fn database_error(e: anyhow::Error) -> SchedulingError {
    error!("Appointment storage failure: {}", e);
    SchedulingError::DatabaseError(e.to_string())
}

fn parse_rows(rows: Vec<Value>) -> SchedulingResult<Vec<Template>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| {
                SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
            })
        })
        .collect()
}

fn first_row(rows: Vec<Value>, context: &str) -> SchedulingResult<Template> {
    parse_rows(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| SchedulingError::DatabaseError(format!("{} returned no rows", context)))
}

/// `appointments` table over PostgREST, acting with the caller's token so row-level
/// security applies.
pub struct SupabaseTemplateStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseTemplateStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    async fn fetch(&self, query: &str) -> SchedulingResult<Vec<Template>> {
        let path = format!("{}?{}", APPOINTMENTS, query);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(database_error)?;
        parse_rows(rows)
    }

    fn tenant_filter(tenant_id: &str, doctor_id: Option<Uuid>) -> String {
        let mut filter = format!("tenant_id=eq.{}", urlencoding::encode(tenant_id));
        if let Some(doctor_id) = doctor_id {
            filter.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        filter
    }
}

#[async_trait]
impl TemplateStore for SupabaseTemplateStore {
    async fn find_in_window(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        window: &WeekWindow,
    ) -> SchedulingResult<Vec<Template>> {
        debug!("Fetching stored appointments for {} in week of {}", tenant_id, window.start());

        let query = format!(
            "{}&appointment_date=gte.{}&appointment_date=lt.{}&order=day_index.asc,time_index.asc",
            Self::tenant_filter(tenant_id, doctor_id),
            window.start(),
            window.end_exclusive(),
        );
        self.fetch(&query).await
    }

    async fn find_recurring_active(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        from: NaiveDate,
    ) -> SchedulingResult<Vec<Template>> {
        debug!("Fetching recurring series for {} active from {}", tenant_id, from);

        let query = format!(
            "{}&is_recurring=eq.true&or=(end_date.is.null,end_date.gte.{})",
            Self::tenant_filter(tenant_id, doctor_id),
            from,
        );
        self.fetch(&query).await
    }

    async fn get(&self, id: Uuid) -> SchedulingResult<Option<Template>> {
        let templates = self.fetch(&format!("id=eq.{}", id)).await?;
        Ok(templates.into_iter().next())
    }

    async fn find_by_booking(&self, tenant_id: &str, booking_id: &str) -> SchedulingResult<Vec<Template>> {
        let query = format!(
            "{}&booking_id=eq.{}",
            Self::tenant_filter(tenant_id, None),
            urlencoding::encode(booking_id),
        );
        self.fetch(&query).await
    }

    async fn insert(&self, template: &Template) -> SchedulingResult<Template> {
        let body = serde_json::to_value(template)
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                APPOINTMENTS,
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(database_error)?;

        first_row(rows, "Appointment insert")
    }

    async fn replace(&self, template: &Template) -> SchedulingResult<Template> {
        let body = serde_json::to_value(template)
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
        let path = format!("{}?id=eq.{}", APPOINTMENTS, template.id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(database_error)?;

        if rows.is_empty() {
            return Err(SchedulingError::TemplateNotFound(template.id));
        }
        first_row(rows, "Appointment update")
    }

    async fn delete(&self, id: Uuid) -> SchedulingResult<()> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, id);
        let _: Value = self.supabase
            .request(Method::DELETE, &path, Some(&self.auth_token), None)
            .await
            .map_err(database_error)?;
        Ok(())
    }

    async fn set_booking_status(
        &self,
        tenant_id: &str,
        booking_id: &str,
        status: AppointmentStatus,
    ) -> SchedulingResult<Vec<Template>> {
        let actions = status.actions();
        let path = format!(
            "{}?{}&booking_id=eq.{}",
            APPOINTMENTS,
            Self::tenant_filter(tenant_id, None),
            urlencoding::encode(booking_id),
        );
        let body = json!({
            "status": status,
            "awaiting_payment": actions.awaiting_payment,
            "payment_completed": actions.payment_completed,
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(database_error)?;

        parse_rows(rows)
    }
}

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// `doctors` table lookup, batched with `id=in.(...)`.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn names_for(&self, doctor_ids: &[Uuid]) -> SchedulingResult<HashMap<Uuid, DoctorName>> {
        if doctor_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = doctor_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("{}?id=in.({})&select=id,first_name,last_name", DOCTORS, ids);

        let rows: Vec<DoctorRow> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(database_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (row.id, DoctorName {
                    first_name: row.first_name.unwrap_or_default(),
                    last_name: row.last_name.unwrap_or_default(),
                })
            })
            .collect())
    }
}
