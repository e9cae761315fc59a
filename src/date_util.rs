use chrono::{Datelike, Months, NaiveDate};

/// Get the last day of a given month.
///
/// Panics if `month` is not in `1..=12`.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    end_of_month(NaiveDate::from_ymd_opt(year, month, 1).unwrap())
}

/// Last day of the month containing `date`.
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        // Only December of the last representable year has no successor month
        .unwrap_or(NaiveDate::MAX)
}

/// Total calendar days in the month containing `date` ("day 0" of the next month).
pub fn days_in_month(date: NaiveDate) -> u32 {
    end_of_month(date).day()
}

/// 1-based day number within the month.
pub fn day_of_month(date: NaiveDate) -> u32 {
    date.day()
}

/// Linearly paced spend expected by `date` if the retainer were consumed
/// uniformly across the month. Rounds half-up to the nearest cent.
pub fn ideal_target_spend_to_date(retainer_cents: i64, date: NaiveDate) -> i64 {
    let days = days_in_month(date) as i128;
    let day = day_of_month(date) as i128;
    // round(r * day / days) == floor((2 * r * day + days) / (2 * days)) for r >= 0
    let target = (2 * retainer_cents as i128 * day + days).div_euclid(2 * days);
    // |target| <= |r|, so this never saturates
    i64::try_from(target).unwrap_or(retainer_cents)
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Inclusive first and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (first_day_of_month(date), end_of_month(date))
}

/// Step back `months` calendar months. The day is clamped to the length of
/// the target month (May 31 minus 3 months is Feb 28/29).
pub fn months_back(as_of: NaiveDate, months: u32) -> NaiveDate {
    as_of
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Format a date as the `YYYY-MM-DD` key used throughout the warehouse.
pub fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
