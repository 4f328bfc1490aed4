// libs/payment-cell/src/services/period.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::PaymentPeriod;

/// Last representable instant of the clinic day.
pub fn end_of_day(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_milli_opt(23, 59, 59, 999)
}

/// Adds calendar months keeping the day of month; days past the end of the target month
/// roll into the next one (Jan 31 + 1 month = Mar 3 in a common year).
pub fn add_months_rolling(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let total = date.month0() + months;
    let year = date.year() + (total / 12) as i32;
    let month = total % 12 + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_signed(Duration::days(date.day0() as i64))
}

/// Last instant a payment covers.
///
/// The period is measured from `occurrence_date` when known, else from the payment day.
/// A single payment without a known occurrence has no end and stays valid.
pub fn calculate_period_end(
    period: PaymentPeriod,
    payment_date: NaiveDateTime,
    occurrence_date: Option<NaiveDate>,
) -> Option<NaiveDateTime> {
    match period.months() {
        None => occurrence_date.and_then(end_of_day),
        Some(months) => {
            let reference = occurrence_date.unwrap_or_else(|| payment_date.date());
            add_months_rolling(reference, months).and_then(end_of_day)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    #[test]
    fn test_monthly_ends_one_month_after_occurrence() {
        let end = calculate_period_end(PaymentPeriod::Monthly, at("2025-01-10T10:00:00"), Some(day("2025-01-14")));
        assert_eq!(end, Some(at("2025-02-14T23:59:59.999")));
    }

    #[test]
    fn test_monthly_on_same_day() {
        let paid = day("2025-03-05");
        let end = calculate_period_end(PaymentPeriod::Monthly, paid.and_hms_opt(8, 30, 0).unwrap(), Some(paid));
        assert_eq!(end, end_of_day(day("2025-04-05")));
    }

    #[test]
    fn test_falls_back_to_payment_day() {
        let end = calculate_period_end(PaymentPeriod::Quarterly, at("2025-01-10T10:00:00"), None);
        assert_eq!(end, Some(at("2025-04-10T23:59:59.999")));

        let end = calculate_period_end(PaymentPeriod::Biannual, at("2025-09-15T10:00:00"), None);
        assert_eq!(end, Some(at("2026-03-15T23:59:59.999")));
    }

    #[test]
    fn test_single_covers_its_occurrence_day() {
        let paid = day("2025-01-14");
        let end = calculate_period_end(PaymentPeriod::Single, paid.and_hms_opt(9, 0, 0).unwrap(), Some(paid));
        assert_eq!(end, Some(at("2025-01-14T23:59:59.999")));
    }

    #[test]
    fn test_single_without_occurrence_has_no_end() {
        assert_eq!(calculate_period_end(PaymentPeriod::Single, at("2025-01-10T10:00:00"), None), None);
    }

    #[test]
    fn test_month_end_rolls_forward() {
        assert_eq!(add_months_rolling(day("2025-01-31"), 1), Some(day("2025-03-03")));
        assert_eq!(add_months_rolling(day("2024-01-31"), 1), Some(day("2024-03-02")));
        assert_eq!(add_months_rolling(day("2025-08-31"), 6), Some(day("2026-03-03")));
        assert_eq!(add_months_rolling(day("2025-11-30"), 3), Some(day("2026-03-02")));
        assert_eq!(add_months_rolling(day("2025-12-15"), 1), Some(day("2026-01-15")));
    }
}
