use std::fmt;

use serde::Serialize;

use crate::metrics::types::{OverservingClient, OverservingEmployee};

/// Blended hourly rate in dollars, as stored in the `hourly_rate` setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyRate(pub f64);

impl HourlyRate {
    pub const DEFAULT_DOLLARS: f64 = 150.0;
    pub const SETTING_KEY: &'static str = "hourly_rate";

    pub fn to_cents(&self) -> i64 {
        (self.0 * 100.0).round() as i64
    }
}

impl Default for HourlyRate {
    fn default() -> Self {
        HourlyRate(Self::DEFAULT_DOLLARS)
    }
}

impl fmt::Display for HourlyRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}/h", self.0)
    }
}

/// Estimated revenue lost to overserving.
///
/// Client-side and employee-side hours are two views of the same work, so
/// the larger of the two totals is priced rather than their sum.
pub fn lost_revenue_cents(
    clients: &[OverservingClient],
    employees: &[OverservingEmployee],
    rate: HourlyRate,
) -> i64 {
    let client_hours: f64 = clients
        .iter()
        .map(|c| c.average_overserving_hours.max(0.0))
        .sum();
    let employee_hours: f64 = employees
        .iter()
        .map(|e| e.average_overserving_hours.max(0.0))
        .sum();
    (client_hours.max(employee_hours) * rate.to_cents() as f64).round() as i64
}
