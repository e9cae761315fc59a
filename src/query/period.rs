use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::date_util::{first_day_of_month, last_day_of_month, months_back};
use crate::error::{Error, Result};

static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());
static RE_TRAILING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,3})[mM]$").unwrap());

/// A reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// A whole calendar month.
    Month(i32, u32),
    /// First of the month through the given day.
    MonthToDate(NaiveDate),
    /// `n` calendar months back from the given day, inclusive at both ends.
    Trailing(u32, NaiveDate),
}

impl Period {
    /// Parse a period string relative to `as_of`.
    ///
    /// Supported formats:
    /// - `2025-06`: calendar month
    /// - `mtd` or `current`: month to date
    /// - `3m`: trailing three months
    pub fn parse(s: &str, as_of: NaiveDate) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "mtd" | "current" => return Ok(Period::MonthToDate(as_of)),
            _ => {}
        }

        if let Some(caps) = RE_TRAILING.captures(s) {
            let n: u32 = caps[1].parse().unwrap();
            if n == 0 {
                return Err(Error::PeriodParse(format!("window must be at least 1 month: {s}")));
            }
            return Ok(Period::Trailing(n, as_of));
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u32 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Parse an optional `YYYY-MM` argument, defaulting to `as_of`'s month.
    /// Relative forms are rejected.
    pub fn parse_month(s: Option<&str>, as_of: NaiveDate) -> Result<Self> {
        let Some(s) = s else {
            return Ok(Period::month_of(as_of));
        };
        match Period::parse(s, as_of)? {
            month @ Period::Month(..) => Ok(month),
            other => Err(Error::PeriodParse(format!(
                "expected a calendar month (YYYY-MM), got {other}"
            ))),
        }
    }

    /// The whole calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        Period::Month(date.year(), date.month())
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::MonthToDate(d) => format!("{}-{:02}-td", d.year(), d.month()),
            Period::Trailing(n, _) => format!("{n}m"),
        }
    }

    /// Inclusive start and end dates.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Month(y, m) => (
                NaiveDate::from_ymd_opt(*y, *m, 1).unwrap(),
                last_day_of_month(*y, *m),
            ),
            Period::MonthToDate(d) => (first_day_of_month(*d), *d),
            Period::Trailing(n, as_of) => (months_back(*as_of, *n), *as_of),
        }
    }

    /// Inclusive range as `YYYY-MM-DD` keys, ready to bind against date-key columns.
    pub fn key_range(&self) -> (String, String) {
        let (start, end) = self.date_range();
        (
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
        )
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    let caps = RE_DATE
        .captures(s)
        .ok_or_else(|| Error::PeriodParse(format!("expected YYYY-MM-DD: {s}")))?;
    let year: i32 = caps[1].parse().unwrap();
    let month: u32 = caps[2].parse().unwrap();
    let day: u32 = caps[3].parse().unwrap();
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::PeriodParse(format!("no such date: {s}")))
}
