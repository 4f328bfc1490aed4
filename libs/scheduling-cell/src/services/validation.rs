use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use tracing::warn;

use crate::models::{day_index_of, SchedulingError, Template, DAYS_PER_WEEK, SLOTS_PER_DAY};

/// Local mobile numbers: `05` followed by 8 or 9 digits.
static LOCAL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^05\d{8,9}$").expect("local phone pattern compiles"));

/// Strips the separators people type into phone fields.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub fn is_valid_phone(phone: &str) -> bool {
    LOCAL_PHONE.is_match(phone)
}

/// Normalizes phone numbers in place and checks every field invariant of a template
/// that is about to be written.
pub fn validate_template(template: &mut Template) -> Result<(), SchedulingError> {
    template.phones = template.phones.iter().map(|phone| normalize_phone(phone)).collect();

    let result = check_template(template);
    if let Err(e) = &result {
        warn!("Rejected appointment {}: {}", template.id, e);
    }
    result
}

fn check_template(template: &Template) -> Result<(), SchedulingError> {
    if template.day_index >= DAYS_PER_WEEK {
        return Err(invalid(format!("day_index must be between 0 and 6, got {}", template.day_index)));
    }
    if template.time_index >= SLOTS_PER_DAY {
        return Err(invalid(format!("time_index must be between 0 and 47, got {}", template.time_index)));
    }

    if let Some(end) = template.end_time_index {
        if end <= template.time_index || end > SLOTS_PER_DAY {
            return Err(invalid(format!(
                "end_time_index must be after time_index {} and at most {}, got {}",
                template.time_index, SLOTS_PER_DAY, end
            )));
        }
    }

    if let Some(count) = template.slot_count {
        if count == 0 || template.time_index as u16 + count as u16 > SLOTS_PER_DAY as u16 {
            return Err(invalid(format!("slot_count {} does not fit the clinic day", count)));
        }
    }

    if template.participants.is_empty() {
        return Err(invalid("At least one participant is required".to_string()));
    }
    if template.participants.iter().any(|participant| participant.name.trim().is_empty()) {
        return Err(invalid("Participant name cannot be empty".to_string()));
    }

    if template.phones.len() > template.participants.len() {
        return Err(invalid(format!(
            "{} phone numbers given for {} participants",
            template.phones.len(),
            template.participants.len()
        )));
    }
    if let Some(phone) = template.phones.iter().find(|phone| !is_valid_phone(phone)) {
        return Err(invalid(format!("Invalid phone number: {}", phone)));
    }

    if template.is_recurring && day_index_of(template.appointment_date) != template.day_index {
        return Err(invalid(format!(
            "day_index {} does not match the weekday of appointment_date {}",
            template.day_index, template.appointment_date
        )));
    }

    if let Some(end_date) = template.end_date {
        // a series cut off at its anchor ends the day before it and skips the anchor
        let cut_at_anchor = template.is_recurring
            && template.has_exception_on(template.appointment_date)
            && end_date == template.appointment_date - Duration::days(1);
        if end_date < template.appointment_date && !cut_at_anchor {
            return Err(invalid(format!(
                "end_date {} is before appointment_date {}",
                end_date, template.appointment_date
            )));
        }
    }

    Ok(())
}

fn invalid(message: String) -> SchedulingError {
    SchedulingError::ValidationError(message)
}
