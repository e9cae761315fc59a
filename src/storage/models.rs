use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Whether a client is currently under retainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientStatus {
    Active,
    Inactive,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "ACTIVE",
            ClientStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(ClientStatus::Active),
            "INACTIVE" => Ok(ClientStatus::Inactive),
            other => Err(Error::InvalidPayload(format!("unknown client status: {other}"))),
        }
    }
}

impl ToSql for ClientStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ClientStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

/// A client account and its retainer terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub external_id: Option<String>,
    pub name: String,
    pub status: ClientStatus,
    pub start_date: NaiveDate,
    pub monthly_retainer_amount_cents: i64,
    pub planned_hours: Option<f64>,
    pub hourly_blended_rate_cents: Option<i64>,
    pub account_manager: String,
}

/// Fields accepted when creating or updating a client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub external_id: Option<String>,
    pub name: String,
    pub status: ClientStatus,
    pub start_date: NaiveDate,
    pub monthly_retainer_amount_cents: i64,
    pub planned_hours: Option<f64>,
    pub hourly_blended_rate_cents: Option<i64>,
    pub account_manager: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub department_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewTeamMember {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: i64,
    pub client_id: i64,
    pub member_id: i64,
    pub department_id: i64,
    pub start: String,
    pub end: String,
    pub hours: f64,
    pub cost_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub client_id: i64,
    pub member_id: i64,
    pub department_id: i64,
    /// ISO-8601 timestamp; its first ten characters are the entry's date key.
    pub start: String,
    pub end: String,
    pub hours: f64,
    pub cost_cents: i64,
}

/// Daily cumulative rollup for one client, as reported by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnSnapshot {
    pub client_id: i64,
    pub date: NaiveDate,
    pub spend_to_date_cents: i64,
    pub hours_to_date: f64,
    pub target_spend_to_date_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub client_id: i64,
    pub year: i32,
    pub month: u32,
    pub total_hours: f64,
    pub total_spend_cents: i64,
    pub variance_cents: i64,
    pub variance_pct: f64,
}

/// A key/value row from `app_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub updated_at: String,
}

/// Hours and spend one department logged against a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentTime {
    pub department_id: i64,
    pub department_name: String,
    pub hours: f64,
    pub spend_cents: i64,
    pub member_count: u64,
}

/// Row counts shown by `burnwatch status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarehouseCounts {
    pub clients: u64,
    pub active_clients: u64,
    pub departments: u64,
    pub team_members: u64,
    pub time_entries: u64,
    pub burn_snapshots: u64,
    pub last_entry_date: Option<String>,
}
