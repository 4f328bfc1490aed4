// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_schedule_writer, require_tenant};

use crate::models::{
    CreateTemplateRequest, DeleteMode, OccurrenceId, SchedulingError, TemplatePatch, WeekWindow,
};
use crate::state::SchedulingState;

impl From<SchedulingError> for AppError {
    fn from(error: SchedulingError) -> Self {
        match error {
            SchedulingError::TemplateNotFound(_) | SchedulingError::OccurrenceNotFound(_) => {
                AppError::NotFound(error.to_string())
            }
            SchedulingError::Forbidden(message) => AppError::Forbidden(message),
            SchedulingError::ValidationError(message) => AppError::ValidationError(message),
            SchedulingError::InvalidOccurrenceId(_) => AppError::BadRequest(error.to_string()),
            SchedulingError::DatabaseError(message) => AppError::Database(message),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_start: String,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    #[serde(default)]
    pub update_all_instances: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub mode: Option<DeleteMode>,
}

fn parse_occurrence_id(raw: &str) -> Result<OccurrenceId, AppError> {
    raw.parse::<OccurrenceId>().map_err(AppError::from)
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_week(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    let window = WeekWindow::parse(&query.week_start)?;

    let occurrences = state
        .expander(auth.token())
        .list_week(tenant_id, query.doctor_id, window)
        .await?;

    Ok(Json(json!({
        "success": true,
        "week_start": window.start(),
        "total": occurrences.len(),
        "appointments": occurrences
    })))
}

#[axum::debug_handler]
pub async fn get_occurrence(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(occurrence_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    let id = parse_occurrence_id(&occurrence_id)?;

    let occurrence = state.expander(auth.token()).get_occurrence(tenant_id, id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": occurrence
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;

    let template = state.mutations(auth.token()).create(tenant_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": template,
        "message": "Appointment created"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(occurrence_id): Path<String>,
    Query(query): Query<UpdateQuery>,
    Json(patch): Json<TemplatePatch>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;
    let id = parse_occurrence_id(&occurrence_id)?;

    let template = state
        .mutations(auth.token())
        .update(tenant_id, id, patch, query.update_all_instances)
        .await?;

    let message = match (id.is_virtual(), query.update_all_instances) {
        (true, false) => "Occurrence moved to a standalone appointment",
        (true, true) => "Series updated",
        (false, _) => "Appointment updated",
    };

    Ok(Json(json!({
        "success": true,
        "appointment": template,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(occurrence_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let tenant_id = require_tenant(&user)?;
    require_schedule_writer(&user)?;
    let id = parse_occurrence_id(&occurrence_id)?;
    let mode = query.mode.unwrap_or(DeleteMode::Single);

    state.mutations(auth.token()).delete(tenant_id, id, mode).await?;

    Ok(Json(json!({
        "success": true,
        "id": id,
        "mode": mode,
        "message": "Appointment deleted"
    })))
}
