// libs/scheduling-cell/src/services/series.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_utils::locks::KeyedLocks;

use crate::models::{
    day_index_of, AppointmentStatus, CreateTemplateRequest, DeleteMode, OccurrenceId,
    SchedulingError, Template, TemplatePatch,
};
use crate::services::projection;
use crate::services::store::{SchedulingResult, TemplateStore};
use crate::services::validation::validate_template;

/// Lock key shared by every writer touching a booking (series edits and payment fan-outs).
pub fn booking_lock_key(template: &Template) -> String {
    if template.booking_id.is_empty() {
        format!("booking:{}", template.id)
    } else {
        format!("booking:{}", template.booking_id)
    }
}

/// Write side of the calendar. Every command runs under the booking's lock and re-reads
/// its target before changing it.
pub struct SeriesMutationEngine {
    store: Arc<dyn TemplateStore>,
    locks: KeyedLocks,
}

impl SeriesMutationEngine {
    pub fn new(store: Arc<dyn TemplateStore>, locks: KeyedLocks) -> Self {
        Self { store, locks }
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn create(&self, tenant_id: &str, request: CreateTemplateRequest) -> SchedulingResult<Template> {
        let booking_id = request
            .booking_id
            .filter(|booking| !booking.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut template = Template {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            doctor_id: request.doctor_id,
            day_index: request.day_index.unwrap_or_else(|| day_index_of(request.appointment_date)),
            time_index: request.time_index,
            end_time_index: request.end_time_index,
            slot_count: request.slot_count,
            participants: request.participants,
            phones: request.phones,
            description: request.description,
            booking_id,
            appointment_date: request.appointment_date,
            appointment_type: request.appointment_type,
            is_recurring: request.is_recurring,
            end_date: request.end_date,
            recurring_parent_id: None,
            recurring_exceptions: Vec::new(),
            reminder_sent: false,
            confirmation_sent: false,
            status: AppointmentStatus::Open,
            actions: AppointmentStatus::Open.actions(),
        };
        validate_template(&mut template)?;

        let _guard = self.locks.acquire(&booking_lock_key(&template)).await;

        // joining an existing booking keeps the booking-wide status uniform
        let siblings = self.store.find_by_booking(tenant_id, &template.booking_id).await?;
        if let Some(sibling) = siblings.first() {
            debug!("Booking {} already has status {}", template.booking_id, sibling.status);
            template.status = sibling.status;
            template.actions = sibling.status.actions();
        }

        let created = self.store.insert(&template).await?;
        info!(
            "Created {} appointment {} for booking {}",
            if created.is_recurring { "recurring" } else { "one-off" },
            created.id,
            created.booking_id
        );
        Ok(created)
    }

    /// Applies `patch` to a stored document, a whole series, or a single projected date.
    ///
    /// A single projected date is split off: the parent skips that day and a standalone
    /// appointment carrying the patch takes its place. The standalone is returned.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        tenant_id: &str,
        id: OccurrenceId,
        patch: TemplatePatch,
        update_all_instances: bool,
    ) -> SchedulingResult<Template> {
        let (template, _guard) = self.load_locked(tenant_id, id).await?;

        match id {
            OccurrenceId::Concrete(_) => self.patch_in_place(template, &patch).await,
            // skipped, cut off or off-grid days, including a day already split off
            OccurrenceId::Virtual { date, .. } if !projection::produces(&template, date) => {
                debug!("Series {} does not produce {}", template.id, date);
                Err(SchedulingError::OccurrenceNotFound(id.to_string()))
            }
            OccurrenceId::Virtual { .. } if update_all_instances => self.patch_in_place(template, &patch).await,
            OccurrenceId::Virtual { date, .. } => self.split_instance(template, date, &patch).await,
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, tenant_id: &str, id: OccurrenceId, mode: DeleteMode) -> SchedulingResult<()> {
        let (mut template, _guard) = self.load_locked(tenant_id, id).await?;

        let date = match id {
            OccurrenceId::Concrete(template_id) => {
                self.store.delete(template_id).await?;
                info!("Deleted appointment {}", template_id);
                return Ok(());
            }
            OccurrenceId::Virtual { date, .. } => date,
        };

        // repeated deletes of a removed day are no-ops, days the series never had are not
        if !projection::on_series_grid(&template, date) {
            return Err(SchedulingError::OccurrenceNotFound(id.to_string()));
        }

        match mode {
            DeleteMode::AllSeries => {
                self.store.delete(template.id).await?;
                info!("Deleted series {}", template.id);
            }
            DeleteMode::AfterThis => {
                if projection::truncate_from(&mut template, date) {
                    self.store.replace(&template).await?;
                    info!("Series {} now ends on {:?}", template.id, template.end_date);
                } else {
                    debug!("Series {} already ends on {:?}", template.id, template.end_date);
                }
            }
            DeleteMode::Single => {
                if projection::add_exception(&mut template, date) {
                    self.store.replace(&template).await?;
                    info!("Series {} skips {}", template.id, date);
                } else {
                    debug!("Series {} already skips {}", template.id, date);
                }
            }
        }
        Ok(())
    }

    /// Reads the target, takes its booking lock, then reads it again so the caller works
    /// on the state no other writer can change.
    async fn load_locked(
        &self,
        tenant_id: &str,
        id: OccurrenceId,
    ) -> SchedulingResult<(Template, tokio::sync::OwnedMutexGuard<()>)> {
        let template_id = id.template_id();
        let unlocked = self.fetch_owned(tenant_id, template_id).await?;

        let guard = self.locks.acquire(&booking_lock_key(&unlocked)).await;
        let template = self.fetch_owned(tenant_id, template_id).await?;
        Ok((template, guard))
    }

    async fn fetch_owned(&self, tenant_id: &str, template_id: Uuid) -> SchedulingResult<Template> {
        let template = self.store
            .get(template_id)
            .await?
            .ok_or(SchedulingError::TemplateNotFound(template_id))?;

        if template.tenant_id != tenant_id {
            warn!("Tenant {} tried to modify appointment {} of another clinic", tenant_id, template_id);
            return Err(SchedulingError::Forbidden(format!(
                "Appointment {} belongs to another clinic",
                template_id
            )));
        }
        Ok(template)
    }

    async fn patch_in_place(&self, mut template: Template, patch: &TemplatePatch) -> SchedulingResult<Template> {
        patch.apply_to(&mut template);
        validate_template(&mut template)?;

        let updated = self.store.replace(&template).await?;
        info!("Updated appointment {}", updated.id);
        Ok(updated)
    }

    async fn split_instance(
        &self,
        mut parent: Template,
        instance_date: chrono::NaiveDate,
        patch: &TemplatePatch,
    ) -> SchedulingResult<Template> {
        let mut standalone = patch.materialize(&parent, instance_date);
        validate_template(&mut standalone)?;

        let previous_exceptions = parent.recurring_exceptions.clone();
        if projection::add_exception(&mut parent, instance_date) {
            self.store.replace(&parent).await?;
            debug!("Series {} skips {} ahead of split", parent.id, instance_date);
        }

        match self.store.insert(&standalone).await {
            Ok(created) => {
                info!(
                    "Split {} off series {} as appointment {}",
                    instance_date, parent.id, created.id
                );
                Ok(created)
            }
            Err(e) => {
                if parent.recurring_exceptions != previous_exceptions {
                    warn!(
                        "Restoring exceptions of series {} after failed split of {}: {}",
                        parent.id, instance_date, e
                    );
                    parent.recurring_exceptions = previous_exceptions;
                    if let Err(restore_error) = self.store.replace(&parent).await {
                        warn!("Could not restore series {}: {}", parent.id, restore_error);
                    }
                }
                Err(e)
            }
        }
    }
}
