pub mod seed;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::period::parse_date;
use crate::storage::models::{
    BurnSnapshot, ClientStatus, NewClient, NewTeamMember, NewTimeEntry,
};
use crate::storage::repository;
use crate::storage::Database;

/// Daily cumulative burn for one client, keyed by the external company id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub client_id: String,
    #[serde(default)]
    pub period_id: Option<String>,
    pub date: String,
    pub spend_to_date_cents: i64,
    pub hours_to_date: f64,
    #[serde(default)]
    pub target_spend_to_date_cents: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryData {
    pub client_external_id: String,
    pub member_email: String,
    pub member_name: String,
    #[serde(default)]
    pub role: String,
    pub department: String,
    pub start: String,
    pub end: String,
    pub hours: f64,
    pub cost_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<ClientStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum TypedPayload {
    TimeEntry(SnapshotData),
    TimeEntries(Vec<TimeEntryData>),
}

#[derive(Debug, Clone, Deserialize)]
struct ClientsPayload {
    clients: Vec<ClientData>,
}

/// A validated ingestion payload.
#[derive(Debug, Clone)]
pub enum Payload {
    Snapshot(SnapshotData),
    TimeEntries(Vec<TimeEntryData>),
    Clients(Vec<ClientData>),
}

impl Payload {
    /// Parse and validate a JSON payload.
    pub fn parse(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let payload = if value.get("type").is_some() {
            match serde_json::from_value::<TypedPayload>(value)? {
                TypedPayload::TimeEntry(d) => Payload::Snapshot(d),
                TypedPayload::TimeEntries(d) => Payload::TimeEntries(d),
            }
        } else if value.get("clients").is_some() {
            Payload::Clients(serde_json::from_value::<ClientsPayload>(value)?.clients)
        } else {
            return Err(Error::InvalidPayload(
                "expected a \"type\" or \"clients\" field".into(),
            ));
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Snapshot(_) => "time_entry",
            Payload::TimeEntries(_) => "time_entries",
            Payload::Clients(_) => "clients",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Payload::Snapshot(d) => {
                require_non_empty("clientId", &d.client_id)?;
                parse_date(&d.date).map_err(|e| Error::InvalidPayload(e.to_string()))?;
                require_non_negative("spendToDateCents", d.spend_to_date_cents)?;
                require_non_negative_f64("hoursToDate", d.hours_to_date)?;
                if let Some(t) = d.target_spend_to_date_cents {
                    require_non_negative("targetSpendToDateCents", t)?;
                }
            }
            Payload::TimeEntries(entries) => {
                for e in entries {
                    require_non_empty("clientExternalId", &e.client_external_id)?;
                    require_non_empty("memberEmail", &e.member_email)?;
                    require_non_empty("department", &e.department)?;
                    parse_date(e.start.get(..10).unwrap_or(&e.start))
                        .map_err(|err| Error::InvalidPayload(format!("start: {err}")))?;
                    require_non_negative_f64("hours", e.hours)?;
                    require_non_negative("costCents", e.cost_cents)?;
                }
            }
            Payload::Clients(clients) => {
                for c in clients {
                    require_non_empty("id", &c.id)?;
                    require_non_empty("name", &c.name)?;
                }
            }
        }
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidPayload(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::InvalidPayload(format!("{field} must be >= 0, got {value}")));
    }
    Ok(())
}

fn require_non_negative_f64(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidPayload(format!("{field} must be >= 0, got {value}")));
    }
    Ok(())
}

/// Report returned after a payload is stored.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub kind: String,
    pub status: IngestStatus,
    pub items_ingested: u64,
    pub items_failed: u64,
    pub error: Option<String>,
}

impl IngestReport {
    pub fn from_counts(kind: &str, items_ingested: u64, items_failed: u64) -> Self {
        let status = if items_failed == 0 {
            IngestStatus::Success
        } else if items_ingested > 0 {
            IngestStatus::PartialFailure
        } else {
            IngestStatus::Failed
        };
        let error = if items_failed > 0 {
            Some(format!("{items_failed} items skipped"))
        } else {
            None
        };
        Self {
            kind: kind.to_string(),
            status,
            items_ingested,
            items_failed,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IngestStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Store a validated payload in one transaction. `as_of` is the start date
/// given to clients first seen through the clients list.
pub async fn ingest(db: &Database, payload: Payload, as_of: NaiveDate) -> Result<IngestReport> {
    let kind = payload.kind();
    let (ingested, failed) = db
        .writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let counts = match payload {
                Payload::Snapshot(d) => (store_snapshot(&tx, &d)?, 0),
                Payload::Clients(clients) => (store_clients(&tx, &clients, as_of)?, 0),
                Payload::TimeEntries(entries) => store_time_entries(&tx, &entries)?,
            };
            tx.commit()?;
            Ok::<(u64, u64), rusqlite::Error>(counts)
        })
        .await?;

    let report = IngestReport::from_counts(kind, ingested, failed);
    log::info!(
        "ingested {kind}: {} stored, {} skipped",
        report.items_ingested,
        report.items_failed
    );
    Ok(report)
}

fn store_snapshot(conn: &rusqlite::Connection, d: &SnapshotData) -> rusqlite::Result<u64> {
    // Validated by Payload::parse
    let date = NaiveDate::parse_from_str(&d.date, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let client_id = match repository::find_client_by_external_id(conn, &d.client_id)? {
        Some(c) => c.id,
        None => {
            log::info!("creating placeholder client for external id {}", d.client_id);
            repository::upsert_client(
                conn,
                &NewClient {
                    external_id: Some(d.client_id.clone()),
                    name: format!("Client {}", d.client_id),
                    status: ClientStatus::Active,
                    start_date: date,
                    monthly_retainer_amount_cents: d.target_spend_to_date_cents.unwrap_or(0),
                    planned_hours: None,
                    hourly_blended_rate_cents: None,
                    account_manager: String::new(),
                },
            )?
        }
    };

    repository::upsert_burn_snapshot(
        conn,
        &BurnSnapshot {
            client_id,
            date,
            spend_to_date_cents: d.spend_to_date_cents,
            hours_to_date: d.hours_to_date,
            target_spend_to_date_cents: d.target_spend_to_date_cents.unwrap_or(0),
        },
    )?;
    Ok(1)
}

fn store_clients(
    conn: &rusqlite::Connection,
    clients: &[ClientData],
    as_of: NaiveDate,
) -> rusqlite::Result<u64> {
    for c in clients {
        repository::upsert_client_identity(
            conn,
            &c.id,
            &c.name,
            c.status.unwrap_or(ClientStatus::Active),
            as_of,
        )?;
    }
    Ok(clients.len() as u64)
}

/// Entries for unknown clients are skipped and counted as failed.
fn store_time_entries(
    conn: &rusqlite::Connection,
    entries: &[TimeEntryData],
) -> rusqlite::Result<(u64, u64)> {
    let mut stored = 0;
    let mut skipped = 0;
    for e in entries {
        let Some(client) = repository::find_client_by_external_id(conn, &e.client_external_id)?
        else {
            log::warn!("skipping time entry for unknown client {}", e.client_external_id);
            skipped += 1;
            continue;
        };
        let department_id = repository::upsert_department(conn, &e.department)?;
        let member_id = repository::upsert_team_member(
            conn,
            &NewTeamMember {
                name: e.member_name.clone(),
                email: e.member_email.clone(),
                role: e.role.clone(),
                department_id,
            },
        )?;
        repository::add_client_team_member(conn, client.id, member_id)?;
        repository::insert_time_entry(
            conn,
            &NewTimeEntry {
                client_id: client.id,
                member_id,
                department_id,
                start: e.start.clone(),
                end: e.end.clone(),
                hours: e.hours,
                cost_cents: e.cost_cents,
            },
        )?;
        stored += 1;
    }
    Ok((stored, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SNAPSHOT: &str = r#"{
        "type": "time_entry",
        "data": {
            "clientId": "4521",
            "date": "2025-06-15",
            "spendToDateCents": 820000,
            "hoursToDate": 61.5,
            "targetSpendToDateCents": 750000
        }
    }"#;

    #[test]
    fn test_parse_snapshot() {
        match Payload::parse(SNAPSHOT).unwrap() {
            Payload::Snapshot(d) => {
                assert_eq!(d.client_id, "4521");
                assert_eq!(d.spend_to_date_cents, 820_000);
                assert_eq!(d.target_spend_to_date_cents, Some(750_000));
                assert!(d.period_id.is_none());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = [
            "not json",
            r#"{"something": 1}"#,
            r#"{"type": "unknown", "data": {}}"#,
            r#"{"type": "time_entry", "data": {"clientId": "", "date": "2025-06-15", "spendToDateCents": 1, "hoursToDate": 1}}"#,
            r#"{"type": "time_entry", "data": {"clientId": "1", "date": "06/15/2025", "spendToDateCents": 1, "hoursToDate": 1}}"#,
            r#"{"type": "time_entry", "data": {"clientId": "1", "date": "2025-06-15", "spendToDateCents": -5, "hoursToDate": 1}}"#,
            r#"{"type": "time_entry", "data": {"clientId": "1", "date": "2025-06-15", "spendToDateCents": 1, "hoursToDate": -1}}"#,
            r#"{"type": "time_entry", "data": {"clientId": "1", "date": "2025-06-15", "spendToDateCents": 1.5, "hoursToDate": 1}}"#,
            r#"{"clients": [{"id": "1", "name": "A", "status": "PAUSED"}]}"#,
            r#"{"clients": [{"id": "1", "name": ""}]}"#,
        ];
        for case in cases {
            match Payload::parse(case) {
                Err(Error::InvalidPayload(_)) => {}
                other => panic!("expected InvalidPayload for {case}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_creates_placeholder_client_and_upserts() {
        let db = Database::open_memory().await.unwrap();
        let report = ingest(&db, Payload::parse(SNAPSHOT).unwrap(), ymd(2025, 6, 15))
            .await
            .unwrap();
        assert_eq!(report.status, IngestStatus::Success);
        assert_eq!(report.items_ingested, 1);

        let again = SNAPSHOT.replace("820000", "830000");
        ingest(&db, Payload::parse(&again).unwrap(), ymd(2025, 6, 15))
            .await
            .unwrap();

        let (client, snaps) = db
            .reader()
            .call(|conn| {
                let client = repository::find_client_by_external_id(conn, "4521")?.unwrap();
                let snaps =
                    repository::list_burn_snapshots(conn, client.id, "2025-06-01", "2025-06-30")?;
                Ok::<_, rusqlite::Error>((client, snaps))
            })
            .await
            .unwrap();

        assert_eq!(client.name, "Client 4521");
        assert_eq!(client.status, ClientStatus::Active);
        assert_eq!(client.start_date, ymd(2025, 6, 15));
        assert_eq!(client.monthly_retainer_amount_cents, 750_000);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].spend_to_date_cents, 830_000);
    }

    #[tokio::test]
    async fn test_clients_payload_upserts_by_external_id() {
        let db = Database::open_memory().await.unwrap();
        let as_of = ymd(2025, 6, 15);
        let first = r#"{"clients": [{"id": "A1", "name": "Acme"}, {"id": "B2", "name": "Beta", "status": "INACTIVE"}]}"#;
        let report = ingest(&db, Payload::parse(first).unwrap(), as_of).await.unwrap();
        assert_eq!(report.items_ingested, 2);

        let rename = r#"{"clients": [{"id": "A1", "name": "Acme Corp"}]}"#;
        ingest(&db, Payload::parse(rename).unwrap(), as_of).await.unwrap();

        let counts = db
            .reader()
            .call(|conn| repository::warehouse_counts(conn))
            .await
            .unwrap();
        assert_eq!(counts.clients, 2);
        assert_eq!(counts.active_clients, 1);

        let acme = db
            .reader()
            .call(|conn| repository::find_client_by_external_id(conn, "A1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acme.name, "Acme Corp");
        assert_eq!(acme.start_date, as_of);
    }

    #[tokio::test]
    async fn test_time_entries_build_roster_and_skip_unknown() {
        let db = Database::open_memory().await.unwrap();
        let as_of = ymd(2025, 6, 15);
        ingest(
            &db,
            Payload::parse(r#"{"clients": [{"id": "A1", "name": "Acme"}]}"#).unwrap(),
            as_of,
        )
        .await
        .unwrap();

        let entries = r#"{"type": "time_entries", "data": [
            {"clientExternalId": "A1", "memberEmail": "dana@example.com", "memberName": "Dana",
             "role": "Strategist", "department": "SEO",
             "start": "2025-06-10T09:00:00Z", "end": "2025-06-10T12:00:00Z", "hours": 3, "costCents": 37500},
            {"clientExternalId": "A1", "memberEmail": "dana@example.com", "memberName": "Dana",
             "role": "Strategist", "department": "SEO",
             "start": "2025-06-11T09:00:00Z", "end": "2025-06-11T10:00:00Z", "hours": 1, "costCents": 12500},
            {"clientExternalId": "ZZ", "memberEmail": "lee@example.com", "memberName": "Lee",
             "department": "Content",
             "start": "2025-06-11T09:00:00Z", "end": "2025-06-11T10:00:00Z", "hours": 1, "costCents": 9000}
        ]}"#;
        let report = ingest(&db, Payload::parse(entries).unwrap(), as_of).await.unwrap();
        assert_eq!(report.status, IngestStatus::PartialFailure);
        assert_eq!(report.items_ingested, 2);
        assert_eq!(report.items_failed, 1);

        let (roster, counts) = db
            .reader()
            .call(|conn| {
                let client = repository::find_client_by_external_id(conn, "A1")?.unwrap();
                let roster = repository::list_team_members_by_client(conn, client.id)?;
                let counts = repository::warehouse_counts(conn)?;
                Ok::<_, rusqlite::Error>((roster, counts))
            })
            .await
            .unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Dana");
        assert_eq!(counts.time_entries, 2);
        assert_eq!(counts.departments, 1);
    }

    #[test]
    fn test_report_status_from_counts() {
        assert_eq!(IngestReport::from_counts("clients", 3, 0).status, IngestStatus::Success);
        assert_eq!(IngestReport::from_counts("clients", 0, 2).status, IngestStatus::Failed);
        assert!(IngestReport::from_counts("clients", 0, 0).error.is_none());
    }
}
