//! In-memory stores for exercising the services without Supabase.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AppointmentStatus, SchedulingError, Template, WeekWindow};
use crate::services::store::{DoctorDirectory, DoctorName, SchedulingResult, TemplateStore};

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<Uuid, Template>>,
    fail_inserts: AtomicBool,
    status_writes: AtomicUsize,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_templates(templates: Vec<Template>) -> Self {
        let store = Self::new();
        for template in templates {
            store.put(template).await;
        }
        store
    }

    pub async fn put(&self, template: Template) {
        self.templates.write().await.insert(template.id, template);
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Template> {
        self.templates.read().await.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<Template> {
        self.templates.read().await.values().cloned().collect()
    }

    /// Makes every following `insert` fail with a storage error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of booking-wide status writes issued so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn scoped(template: &Template, tenant_id: &str, doctor_id: Option<Uuid>) -> bool {
        template.tenant_id == tenant_id && doctor_id.map_or(true, |doctor| template.doctor_id == doctor)
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find_in_window(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        window: &WeekWindow,
    ) -> SchedulingResult<Vec<Template>> {
        Ok(self.templates
            .read()
            .await
            .values()
            .filter(|t| Self::scoped(t, tenant_id, doctor_id) && window.contains(t.appointment_date))
            .cloned()
            .collect())
    }

    async fn find_recurring_active(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        from: NaiveDate,
    ) -> SchedulingResult<Vec<Template>> {
        Ok(self.templates
            .read()
            .await
            .values()
            .filter(|t| Self::scoped(t, tenant_id, doctor_id))
            .filter(|t| t.is_recurring && t.end_date.map_or(true, |end| end >= from))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> SchedulingResult<Option<Template>> {
        Ok(self.snapshot(id).await)
    }

    async fn find_by_booking(&self, tenant_id: &str, booking_id: &str) -> SchedulingResult<Vec<Template>> {
        Ok(self.templates
            .read()
            .await
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, template: &Template) -> SchedulingResult<Template> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SchedulingError::DatabaseError("insert rejected".to_string()));
        }
        self.put(template.clone()).await;
        Ok(template.clone())
    }

    async fn replace(&self, template: &Template) -> SchedulingResult<Template> {
        let mut templates = self.templates.write().await;
        match templates.get_mut(&template.id) {
            Some(stored) => {
                *stored = template.clone();
                Ok(template.clone())
            }
            None => Err(SchedulingError::TemplateNotFound(template.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> SchedulingResult<()> {
        self.templates.write().await.remove(&id);
        Ok(())
    }

    async fn set_booking_status(
        &self,
        tenant_id: &str,
        booking_id: &str,
        status: AppointmentStatus,
    ) -> SchedulingResult<Vec<Template>> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);

        let mut updated = Vec::new();
        for template in self.templates.write().await.values_mut() {
            if template.tenant_id == tenant_id && template.booking_id == booking_id {
                template.status = status;
                template.actions = status.actions();
                updated.push(template.clone());
            }
        }
        Ok(updated)
    }
}

/// Fixed doctor names; counts lookups so batching can be asserted.
#[derive(Default)]
pub struct StaticDoctorDirectory {
    names: HashMap<Uuid, DoctorName>,
    lookups: AtomicUsize,
}

impl StaticDoctorDirectory {
    pub fn new(entries: Vec<(Uuid, &str, &str)>) -> Self {
        let names = entries
            .into_iter()
            .map(|(id, first_name, last_name)| {
                (id, DoctorName {
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                })
            })
            .collect();
        Self { names, lookups: AtomicUsize::new(0) }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DoctorDirectory for StaticDoctorDirectory {
    async fn names_for(&self, doctor_ids: &[Uuid]) -> SchedulingResult<HashMap<Uuid, DoctorName>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(doctor_ids
            .iter()
            .filter_map(|id| self.names.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
