// libs/scheduling-cell/src/services/projection.rs
//
// Pure series arithmetic: no storage, no clocks. Everything the expander and the
// mutation engine decide about "does this series produce a slot on this date" lives here.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::{day_index_of, Occurrence, Template, WeekWindow, DAYS_PER_WEEK};

/// Whether a recurring template produces an occurrence on `date`.
///
/// `date` must lie in `[appointment_date, end_date]` and must not be an exception day.
pub fn covers(template: &Template, date: NaiveDate) -> bool {
    date >= template.appointment_date
        && template.end_date.map_or(true, |end| date <= end)
        && !template.has_exception_on(date)
}

/// `date` is a weekday of the series on or after its anchor, whether or not it was
/// skipped or cut off since.
pub fn on_series_grid(template: &Template, date: NaiveDate) -> bool {
    template.is_recurring
        && day_index_of(date) == template.day_index
        && date >= template.appointment_date
}

/// The series still produces an occurrence on `date`.
pub fn produces(template: &Template, date: NaiveDate) -> bool {
    on_series_grid(template, date) && covers(template, date)
}

/// The date a recurring template lands on inside `window`, if any.
pub fn projected_date(template: &Template, window: &WeekWindow) -> Option<NaiveDate> {
    if !template.is_recurring || template.day_index >= DAYS_PER_WEEK {
        return None;
    }

    let date = window.date_for(template.day_index);
    covers(template, date).then_some(date)
}

/// Projects one template into `window` as a virtual occurrence.
pub fn project(template: &Template, window: &WeekWindow) -> Option<Occurrence> {
    projected_date(template, window).map(|date| Occurrence::virtual_instance(template, date))
}

/// A stored document already stands for `template` on `date` in the same slot.
pub fn is_represented(template: &Template, date: NaiveDate, concrete: &[Template]) -> bool {
    concrete.iter().any(|document| {
        document.belongs_to_series(template.id)
            && document.appointment_date == date
            && document.day_index == template.day_index
            && document.time_index == template.time_index
    })
}

/// Merges stored documents of a week with the projections of every active series,
/// ordered by `(day_index, time_index)`.
pub fn expand_week(concrete: &[Template], recurring: &[Template], window: &WeekWindow) -> Vec<Occurrence> {
    let in_window: Vec<Template> = concrete
        .iter()
        .filter(|document| window.contains(document.appointment_date))
        // a recurring root whose own day was split off or skipped is not shown on it
        .filter(|document| !(document.is_recurring && document.has_exception_on(document.appointment_date)))
        .cloned()
        .collect();

    let mut occurrences: Vec<Occurrence> = in_window.iter().map(Occurrence::concrete).collect();

    let mut seen: HashSet<Uuid> = HashSet::new();
    for template in recurring {
        if !seen.insert(template.id) {
            continue;
        }
        let Some(date) = projected_date(template, window) else {
            continue;
        };
        if is_represented(template, date, &in_window) {
            continue;
        }
        occurrences.push(Occurrence::virtual_instance(template, date));
    }

    occurrences.sort_by_key(|occurrence| (occurrence.day_index, occurrence.time_index));
    occurrences
}

/// Adds `date` to the exception list unless that day is already there.
/// Returns whether the list changed.
pub fn add_exception(template: &mut Template, date: NaiveDate) -> bool {
    if template.has_exception_on(date) {
        return false;
    }
    template.recurring_exceptions.push(date);
    true
}

/// Ends the series the day before `date` and skips `date` itself. A series that
/// already ends earlier keeps its end. Returns whether anything changed.
pub fn truncate_from(template: &mut Template, date: NaiveDate) -> bool {
    let cutoff = date - Duration::days(1);
    if template.end_date.is_some_and(|end| end <= cutoff) {
        return false;
    }

    add_exception(template, date);
    template.end_date = Some(cutoff);
    true
}
