use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::storage::models::{Client, ClientStatus};

/// Three-way classification of month-to-date burn against a ±10% band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    Over,
    OnTrack,
    Under,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Over => "OVER",
            Health::OnTrack => "ON_TRACK",
            Health::Under => "UNDER",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Health {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "OVER" => Ok(Health::Over),
            "ON_TRACK" => Ok(Health::OnTrack),
            "UNDER" => Ok(Health::Under),
            other => Err(Error::InvalidPayload(format!("unknown health: {other}"))),
        }
    }
}

/// Spend minus ideal target, in cents and as a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variance {
    pub variance_cents: i64,
    pub variance_pct: f64,
}

/// Burn figures for one client as of a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnMetrics {
    #[serde(rename = "burnPctMTD")]
    pub burn_pct_mtd: f64,
    pub ideal_target_spend_to_date_cents: i64,
    pub variance_cents: i64,
    pub variance_pct: f64,
    pub health: Health,
}

/// Month-to-date time-entry sums for one client.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MtdTotals {
    pub spend_cents: i64,
    pub hours: f64,
}

/// A client decorated with its month-to-date burn metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWithMetrics {
    #[serde(flatten)]
    pub client: Client,
    pub mtd_spend_cents: i64,
    pub mtd_hours: f64,
    #[serde(flatten)]
    pub metrics: BurnMetrics,
}

/// Per-client totals over an overserving window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientUsage {
    pub client_id: i64,
    pub client_name: String,
    pub account_manager: String,
    pub status: ClientStatus,
    pub monthly_retainer_amount_cents: i64,
    pub total_cost_cents: i64,
    pub total_hours: f64,
    pub entry_count: u64,
}

/// One time entry as seen by the employee overserving analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeEntry {
    pub member_id: i64,
    pub member_name: String,
    pub department: String,
    pub client_status: ClientStatus,
    pub client_retainer_cents: i64,
    pub hours: f64,
    pub cost_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverservingClient {
    pub client_id: i64,
    pub client_name: String,
    pub account_manager: String,
    pub average_overserving_hours: f64,
    pub average_overserving_cents: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverservingEmployee {
    pub member_id: i64,
    pub member_name: String,
    pub department: String,
    pub average_overserving_hours: f64,
    pub average_overserving_cents: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub top_overserving_clients: Vec<OverservingClient>,
    pub top_overserving_employees: Vec<OverservingEmployee>,
    pub total_lost_revenue_cents: i64,
    pub hourly_rate_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub active_clients: u64,
    /// Whole-number percentage of active clients that are ON_TRACK.
    pub on_track_percentage: u32,
    pub total_retainer_cents: i64,
    pub mtd_spend_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_parse_and_display() {
        assert_eq!("on_track".parse::<Health>().unwrap(), Health::OnTrack);
        assert_eq!("on-track".parse::<Health>().unwrap(), Health::OnTrack);
        assert_eq!("OVER".parse::<Health>().unwrap(), Health::Over);
        assert!("fine".parse::<Health>().is_err());
        assert_eq!(Health::Under.to_string(), "UNDER");
    }

    #[test]
    fn test_health_serializes_screaming_snake() {
        assert_eq!(serde_json::to_string(&Health::OnTrack).unwrap(), "\"ON_TRACK\"");
    }
}
