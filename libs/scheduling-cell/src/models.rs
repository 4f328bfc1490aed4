// libs/scheduling-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ==============================================================================
// SLOT GRID
// ==============================================================================

/// The clinic day is cut into 15-minute slots starting at 09:00.
pub const SLOT_MINUTES: i64 = 15;
pub const SLOTS_PER_DAY: u8 = 48;
pub const DAYS_PER_WEEK: u8 = 7;
pub const FIRST_SLOT_HOUR: u32 = 9;

/// Wall-clock start of a slot index. Index 48 is the end of the last slot (21:00).
pub fn slot_time(time_index: u8) -> NaiveTime {
    let first = NaiveTime::from_hms_opt(FIRST_SLOT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    first + Duration::minutes(SLOT_MINUTES * time_index as i64)
}

pub fn day_index_of(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

// ==============================================================================
// CALENDAR DAY PARSING
// ==============================================================================

/// Parses `yyyy-mm-dd`, also accepting full timestamps and keeping only their day.
pub fn parse_calendar_day(value: &str) -> Result<NaiveDate, SchedulingError> {
    let trimmed = value.trim();
    let day_part = trimmed
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .map_err(|_| SchedulingError::ValidationError(format!("Invalid date: {}", value)))
}

pub(crate) mod calendar_day {
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer};

    use super::parse_calendar_day;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where D: Deserializer<'de> {
        let raw = String::deserialize(deserializer)?;
        parse_calendar_day(&raw).map_err(D::Error::custom)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where D: Deserializer<'de> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_calendar_day(&raw).map_err(D::Error::custom))
            .transpose()
    }

    pub fn deserialize_vec<'de, D>(deserializer: D) -> Result<Vec<NaiveDate>, D::Error>
    where D: Deserializer<'de> {
        Option::<Vec<String>>::deserialize(deserializer)?
            .unwrap_or_default()
            .iter()
            .map(|raw| parse_calendar_day(raw).map_err(D::Error::custom))
            .collect()
    }
}

// ==============================================================================
// TEMPLATE (the persisted series record)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    #[serde(alias = "Open", alias = "new")]
    Open,
    #[serde(alias = "PaymentPending", alias = "pending", alias = "payment pending")]
    PaymentPending,
    #[serde(alias = "Completed", alias = "paid", alias = "complete")]
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Open => write!(f, "open"),
            AppointmentStatus::PaymentPending => write!(f, "payment_pending"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Flags the calendar uses to decide which payment actions to offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusActions {
    #[serde(default = "awaiting_by_default")]
    pub awaiting_payment: bool,
    #[serde(default)]
    pub payment_completed: bool,
}

fn awaiting_by_default() -> bool {
    true
}

impl Default for StatusActions {
    fn default() -> Self {
        AppointmentStatus::Open.actions()
    }
}

impl AppointmentStatus {
    pub fn actions(&self) -> StatusActions {
        match self {
            AppointmentStatus::Open | AppointmentStatus::PaymentPending => StatusActions {
                awaiting_payment: true,
                payment_completed: false,
            },
            AppointmentStatus::Completed => StatusActions {
                awaiting_payment: false,
                payment_completed: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: Uuid,
    pub tenant_id: String,
    pub doctor_id: Uuid,
    pub day_index: u8,
    pub time_index: u8,
    pub end_time_index: Option<u8>,
    pub slot_count: Option<u8>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub phones: Vec<String>,
    pub description: Option<String>,
    pub booking_id: String,
    #[serde(deserialize_with = "calendar_day::deserialize")]
    pub appointment_date: NaiveDate,
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, deserialize_with = "calendar_day::deserialize_option")]
    pub end_date: Option<NaiveDate>,
    pub recurring_parent_id: Option<Uuid>,
    #[serde(default, deserialize_with = "calendar_day::deserialize_vec")]
    pub recurring_exceptions: Vec<NaiveDate>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default)]
    pub confirmation_sent: bool,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(flatten)]
    pub actions: StatusActions,
}

impl Template {
    /// Exclusive end slot; a template without an explicit end occupies one slot.
    pub fn end_slot(&self) -> u8 {
        self.end_time_index
            .or_else(|| self.slot_count.map(|count| self.time_index.saturating_add(count)))
            .unwrap_or(self.time_index + 1)
            .min(SLOTS_PER_DAY)
    }

    pub fn has_exception_on(&self, date: NaiveDate) -> bool {
        self.recurring_exceptions.contains(&date)
    }

    /// Whether this record is the series root or a materialized child of `template_id`.
    pub fn belongs_to_series(&self, template_id: Uuid) -> bool {
        self.id == template_id || self.recurring_parent_id == Some(template_id)
    }
}

// ==============================================================================
// OCCURRENCE IDENTITY
// ==============================================================================

const VIRTUAL_SEPARATOR: &str = "_instance_";
const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Identity of a calendar slot: a stored template, or one projected date of a series.
///
/// On the wire a virtual id reads `{templateId}_instance_{yyyy-mm-dd}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccurrenceId {
    Concrete(Uuid),
    Virtual { parent_id: Uuid, date: NaiveDate },
}

impl OccurrenceId {
    /// The stored record behind this occurrence.
    pub fn template_id(&self) -> Uuid {
        match self {
            OccurrenceId::Concrete(id) => *id,
            OccurrenceId::Virtual { parent_id, .. } => *parent_id,
        }
    }

    pub fn instance_date(&self) -> Option<NaiveDate> {
        match self {
            OccurrenceId::Concrete(_) => None,
            OccurrenceId::Virtual { date, .. } => Some(*date),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, OccurrenceId::Virtual { .. })
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceId::Concrete(id) => write!(f, "{}", id),
            OccurrenceId::Virtual { parent_id, date } => {
                write!(f, "{}{}{}", parent_id, VIRTUAL_SEPARATOR, date.format(WIRE_DATE_FORMAT))
            }
        }
    }
}

impl FromStr for OccurrenceId {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulingError::InvalidOccurrenceId(value.to_string());

        match value.split_once(VIRTUAL_SEPARATOR) {
            Some((parent, date)) => {
                let parent_id = Uuid::parse_str(parent).map_err(|_| invalid())?;
                let date = NaiveDate::parse_from_str(date, WIRE_DATE_FORMAT).map_err(|_| invalid())?;
                Ok(OccurrenceId::Virtual { parent_id, date })
            }
            None => Uuid::parse_str(value)
                .map(OccurrenceId::Concrete)
                .map_err(|_| invalid()),
        }
    }
}

impl Serialize for OccurrenceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OccurrenceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// OCCURRENCE (never persisted)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantContact {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub template_id: Uuid,
    pub tenant_id: String,
    pub date: NaiveDate,
    pub day_index: u8,
    pub time_index: u8,
    pub end_time_index: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub doctor_id: Uuid,
    pub doctor_name: Option<String>,
    pub participants: Vec<ParticipantContact>,
    pub description: Option<String>,
    pub booking_id: String,
    pub appointment_type: Option<String>,
    pub is_recurring: bool,
    pub recurring_parent_id: Option<Uuid>,
    pub is_virtual_instance: bool,
    pub status: AppointmentStatus,
    #[serde(flatten)]
    pub actions: StatusActions,
}

impl Occurrence {
    /// A stored document shown on its own date.
    pub fn concrete(template: &Template) -> Self {
        Self::build(template, OccurrenceId::Concrete(template.id), template.appointment_date)
    }

    /// A projected date of a recurring template.
    pub fn virtual_instance(template: &Template, date: NaiveDate) -> Self {
        Self::build(
            template,
            OccurrenceId::Virtual { parent_id: template.id, date },
            date,
        )
    }

    fn build(template: &Template, id: OccurrenceId, date: NaiveDate) -> Self {
        let end_slot = template.end_slot();
        let participants = template.participants
            .iter()
            .enumerate()
            .map(|(index, participant)| ParticipantContact {
                name: participant.name.clone(),
                phone: template.phones.get(index).cloned(),
            })
            .collect();

        Self {
            id,
            template_id: template.id,
            tenant_id: template.tenant_id.clone(),
            date,
            day_index: template.day_index,
            time_index: template.time_index,
            end_time_index: end_slot,
            start_time: slot_time(template.time_index),
            end_time: slot_time(end_slot),
            doctor_id: template.doctor_id,
            doctor_name: None,
            participants,
            description: template.description.clone(),
            booking_id: template.booking_id.clone(),
            appointment_type: template.appointment_type.clone(),
            is_recurring: template.is_recurring,
            recurring_parent_id: template.recurring_parent_id,
            is_virtual_instance: id.is_virtual(),
            status: template.status,
            actions: template.actions,
        }
    }
}

// ==============================================================================
// WEEK WINDOW
// ==============================================================================

/// The half-open window `[start, start + 7 days)`; `start` is always a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    start: NaiveDate,
}

impl WeekWindow {
    pub fn starting(start: NaiveDate) -> Result<Self, SchedulingError> {
        if start.weekday() != chrono::Weekday::Mon {
            return Err(SchedulingError::ValidationError(format!(
                "Week start {} is a {}, expected a Monday",
                start,
                start.weekday()
            )));
        }
        Ok(Self { start })
    }

    pub fn parse(value: &str) -> Result<Self, SchedulingError> {
        Self::starting(parse_calendar_day(value)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end_exclusive(&self) -> NaiveDate {
        self.start + Duration::days(DAYS_PER_WEEK as i64)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end_exclusive()
    }

    pub fn date_for(&self, day_index: u8) -> NaiveDate {
        self.start + Duration::days(day_index as i64)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub doctor_id: Uuid,
    /// Defaults to the weekday of `appointment_date`.
    pub day_index: Option<u8>,
    pub time_index: u8,
    pub end_time_index: Option<u8>,
    pub slot_count: Option<u8>,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub phones: Vec<String>,
    pub description: Option<String>,
    pub booking_id: Option<String>,
    #[serde(deserialize_with = "calendar_day::deserialize")]
    pub appointment_date: NaiveDate,
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, deserialize_with = "calendar_day::deserialize_option")]
    pub end_date: Option<NaiveDate>,
}

/// Partial update. `end_date` distinguishes "absent" from an explicit `null` (unbounded).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatePatch {
    pub doctor_id: Option<Uuid>,
    pub day_index: Option<u8>,
    pub time_index: Option<u8>,
    pub end_time_index: Option<u8>,
    pub slot_count: Option<u8>,
    pub participants: Option<Vec<Participant>>,
    pub phones: Option<Vec<String>>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "calendar_day::deserialize_option")]
    pub appointment_date: Option<NaiveDate>,
    pub appointment_type: Option<String>,
    pub is_recurring: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub end_date: Option<Option<NaiveDate>>,
    pub reminder_sent: Option<bool>,
    pub confirmation_sent: Option<bool>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where D: Deserializer<'de> {
    calendar_day::deserialize_option(deserializer).map(Some)
}

impl TemplatePatch {
    pub fn apply_to(&self, template: &mut Template) {
        if let Some(doctor_id) = self.doctor_id {
            template.doctor_id = doctor_id;
        }
        if let Some(day_index) = self.day_index {
            template.day_index = day_index;
        }
        if let Some(time_index) = self.time_index {
            template.time_index = time_index;
        }
        if let Some(end_time_index) = self.end_time_index {
            template.end_time_index = Some(end_time_index);
        }
        if let Some(slot_count) = self.slot_count {
            template.slot_count = Some(slot_count);
        }
        if let Some(participants) = &self.participants {
            template.participants = participants.clone();
        }
        if let Some(phones) = &self.phones {
            template.phones = phones.clone();
        }
        if let Some(description) = &self.description {
            template.description = Some(description.clone());
        }
        if let Some(appointment_date) = self.appointment_date {
            template.appointment_date = appointment_date;
        }
        if let Some(appointment_type) = &self.appointment_type {
            template.appointment_type = Some(appointment_type.clone());
        }
        if let Some(is_recurring) = self.is_recurring {
            template.is_recurring = is_recurring;
        }
        if let Some(end_date) = self.end_date {
            template.end_date = end_date;
        }
        if let Some(reminder_sent) = self.reminder_sent {
            template.reminder_sent = reminder_sent;
        }
        if let Some(confirmation_sent) = self.confirmation_sent {
            template.confirmation_sent = confirmation_sent;
        }
    }

    /// Standalone one-off that replaces `parent` on `instance_date`.
    pub fn materialize(&self, parent: &Template, instance_date: NaiveDate) -> Template {
        let mut standalone = parent.clone();
        self.apply_to(&mut standalone);

        standalone.id = Uuid::new_v4();
        standalone.appointment_date = self.appointment_date.unwrap_or(instance_date);
        standalone.day_index = self.day_index.unwrap_or_else(|| day_index_of(standalone.appointment_date));
        standalone.is_recurring = false;
        standalone.recurring_parent_id = Some(parent.id);
        standalone.end_date = None;
        standalone.recurring_exceptions = Vec::new();
        standalone
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    Single,
    #[serde(alias = "afterThis")]
    AfterThis,
    #[serde(alias = "allSeries")]
    AllSeries,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum SchedulingError {
    #[error("Appointment {0} not found")]
    TemplateNotFound(Uuid),

    #[error("Occurrence {0} not found")]
    OccurrenceNotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid occurrence id: {0}")]
    InvalidOccurrenceId(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
