// libs/scheduling-cell/src/services/recurrence.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{Occurrence, OccurrenceId, SchedulingError, WeekWindow};
use crate::services::projection;
use crate::services::store::{DoctorDirectory, SchedulingResult, TemplateStore};

/// Read side of the calendar: turns stored documents and series templates into the
/// occurrences of one week.
pub struct RecurrenceExpander {
    store: Arc<dyn TemplateStore>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl RecurrenceExpander {
    pub fn new(store: Arc<dyn TemplateStore>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self { store, doctors }
    }

    /// Every occurrence of the tenant (optionally one doctor) in the week, stored and
    /// projected, sorted by day then slot.
    #[instrument(skip(self))]
    pub async fn list_week(
        &self,
        tenant_id: &str,
        doctor_id: Option<Uuid>,
        window: WeekWindow,
    ) -> SchedulingResult<Vec<Occurrence>> {
        debug!("Expanding week of {} for tenant {}", window.start(), tenant_id);

        let (concrete, recurring) = futures::try_join!(
            self.store.find_in_window(tenant_id, doctor_id, &window),
            self.store.find_recurring_active(tenant_id, doctor_id, window.start()),
        )?;

        let mut occurrences = projection::expand_week(&concrete, &recurring, &window);
        self.attach_doctor_names(&mut occurrences).await?;

        info!(
            "Week of {} for tenant {}: {} occurrences ({} projected)",
            window.start(),
            tenant_id,
            occurrences.len(),
            occurrences.iter().filter(|o| o.is_virtual_instance).count()
        );
        Ok(occurrences)
    }

    /// Resolves a single occurrence id. A virtual id only resolves when the series still
    /// produces that date.
    #[instrument(skip(self))]
    pub async fn get_occurrence(&self, tenant_id: &str, id: OccurrenceId) -> SchedulingResult<Occurrence> {
        let template = self.store
            .get(id.template_id())
            .await?
            .ok_or(SchedulingError::TemplateNotFound(id.template_id()))?;

        if template.tenant_id != tenant_id {
            return Err(SchedulingError::Forbidden(format!(
                "Appointment {} belongs to another clinic",
                template.id
            )));
        }

        let occurrence = match id {
            OccurrenceId::Concrete(_) => Occurrence::concrete(&template),
            OccurrenceId::Virtual { date, .. } => {
                if !projection::produces(&template, date) {
                    return Err(SchedulingError::OccurrenceNotFound(id.to_string()));
                }
                Occurrence::virtual_instance(&template, date)
            }
        };

        let mut occurrences = vec![occurrence];
        self.attach_doctor_names(&mut occurrences).await?;
        Ok(occurrences.remove(0))
    }

    /// One directory lookup for all distinct doctors of the batch.
    async fn attach_doctor_names(&self, occurrences: &mut [Occurrence]) -> SchedulingResult<()> {
        let doctor_ids: Vec<Uuid> = occurrences
            .iter()
            .map(|occurrence| occurrence.doctor_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if doctor_ids.is_empty() {
            return Ok(());
        }

        let names = self.doctors.names_for(&doctor_ids).await?;
        for occurrence in occurrences.iter_mut() {
            occurrence.doctor_name = names.get(&occurrence.doctor_id).map(|name| name.full_name());
        }
        Ok(())
    }
}
