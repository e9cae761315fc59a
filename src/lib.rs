pub mod date_util;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod storage;

pub use error::{Error, Result};
pub use ingest::{IngestReport, IngestStatus, Payload};
pub use metrics::{
    BurnMetrics, ClientWithMetrics, DashboardAnalytics, DashboardSummary, Health, HourlyRate,
    OverservingClient, OverservingEmployee,
};
pub use query::builder::ClientQuery;
pub use query::period::Period;
pub use storage::models::{
    BurnSnapshot, Client, ClientStatus, Department, DepartmentTime, MonthlySummary, Setting,
    TeamMember, TimeEntry, WarehouseCounts,
};
pub use storage::Database;

use chrono::NaiveDate;
use serde::Serialize;

use date_util::{date_key, ideal_target_spend_to_date, month_bounds};
use metrics::burn::{calculate_client_metrics, variance};
use storage::repository;

/// Number of time entries shown on a client's detail view.
const RECENT_ENTRY_LIMIT: u32 = 10;

/// Everything shown for a single client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetail {
    pub client: ClientWithMetrics,
    pub team: Vec<TeamMember>,
    /// Current-month snapshots, with targets recomputed from the retainer.
    pub burn_snapshots: Vec<BurnSnapshot>,
    /// Most recent current-month entries, newest first.
    pub recent_time_entries: Vec<TimeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHistory {
    pub client_id: i64,
    /// Newest month first.
    pub monthly_summaries: Vec<MonthlySummary>,
    pub current_month_snapshots: Vec<BurnSnapshot>,
}

/// Main entry point for the burn-rate warehouse.
pub struct BurnWatch {
    db: Database,
}

impl BurnWatch {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Clients ────────────────────────────────────────────────────

    pub async fn clients(
        &self,
        query: ClientQuery,
        as_of: NaiveDate,
    ) -> Result<Vec<ClientWithMetrics>> {
        query.clients_with_metrics(&self.db, as_of).await
    }

    /// Client record, team roster, this month's snapshots and recent entries.
    pub async fn client_detail(&self, client_id: i64, as_of: NaiveDate) -> Result<ClientDetail> {
        let (first, last) = month_bounds(as_of);
        let start = date_key(first);
        let end = date_key(last);

        let found = self
            .db
            .reader()
            .call(move |conn| {
                let Some(client) = repository::get_client(conn, client_id)? else {
                    return Ok(None);
                };
                let mtd = repository::period_totals_by_client(conn, &start, &end)?
                    .remove(&client_id)
                    .unwrap_or_default();
                let team = repository::list_team_members_by_client(conn, client_id)?;
                let snapshots = repository::list_burn_snapshots(conn, client_id, &start, &end)?;
                let entries = repository::list_time_entries(
                    conn,
                    client_id,
                    &start,
                    &end,
                    RECENT_ENTRY_LIMIT,
                )?;
                Ok::<_, rusqlite::Error>(Some((client, mtd, team, snapshots, entries)))
            })
            .await?;

        let (client, mtd, team, snapshots, entries) =
            found.ok_or_else(|| Error::NotFound(format!("client {client_id}")))?;

        let retainer = client.monthly_retainer_amount_cents;
        let metrics = calculate_client_metrics(mtd.spend_cents, retainer, as_of);
        Ok(ClientDetail {
            client: ClientWithMetrics {
                client,
                mtd_spend_cents: mtd.spend_cents,
                mtd_hours: mtd.hours,
                metrics,
            },
            team,
            burn_snapshots: snapshots
                .into_iter()
                .map(|s| with_recomputed_target(s, retainer))
                .collect(),
            recent_time_entries: entries,
        })
    }

    pub async fn client_history(&self, client_id: i64, as_of: NaiveDate) -> Result<ClientHistory> {
        let (first, last) = month_bounds(as_of);
        let start = date_key(first);
        let end = date_key(last);

        let found = self
            .db
            .reader()
            .call(move |conn| {
                let Some(client) = repository::get_client(conn, client_id)? else {
                    return Ok(None);
                };
                let summaries = repository::list_monthly_summaries(conn, client_id)?;
                let snapshots = repository::list_burn_snapshots(conn, client_id, &start, &end)?;
                Ok::<_, rusqlite::Error>(Some((client, summaries, snapshots)))
            })
            .await?;

        let (client, summaries, snapshots) =
            found.ok_or_else(|| Error::NotFound(format!("client {client_id}")))?;
        let retainer = client.monthly_retainer_amount_cents;
        Ok(ClientHistory {
            client_id,
            monthly_summaries: summaries,
            current_month_snapshots: snapshots
                .into_iter()
                .map(|s| with_recomputed_target(s, retainer))
                .collect(),
        })
    }

    /// Roll a calendar month's time entries up into per-client summaries.
    /// Variance is measured against the full monthly retainer.
    pub async fn rollup_month(&self, year: i32, month: u32) -> Result<u64> {
        if !(1..=12).contains(&month) {
            return Err(Error::PeriodParse(format!("invalid month: {year}-{month}")));
        }
        let period = Period::Month(year, month);
        let (start, end) = period.key_range();

        let written = self
            .db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let totals = repository::period_totals_by_client(&tx, &start, &end)?;
                let mut written = 0u64;
                for (client_id, t) in totals {
                    let Some(client) = repository::get_client(&tx, client_id)? else {
                        continue;
                    };
                    let v = variance(t.spend_cents, client.monthly_retainer_amount_cents);
                    repository::upsert_monthly_summary(
                        &tx,
                        &MonthlySummary {
                            client_id,
                            year,
                            month,
                            total_hours: t.hours,
                            total_spend_cents: t.spend_cents,
                            variance_cents: v.variance_cents,
                            variance_pct: v.variance_pct,
                        },
                    )?;
                    written += 1;
                }
                tx.commit()?;
                Ok::<u64, rusqlite::Error>(written)
            })
            .await?;

        log::info!("rolled up {period}: {written} client summaries");
        Ok(written)
    }

    // ── Departments ────────────────────────────────────────────────

    pub async fn departments(&self) -> Result<Vec<Department>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_departments(conn))
            .await?)
    }

    /// Hours and spend per department for one client over `period`.
    pub async fn time_by_department(
        &self,
        client_id: i64,
        period: Period,
    ) -> Result<Vec<DepartmentTime>> {
        let (start, end) = period.key_range();
        let found = self
            .db
            .reader()
            .call(move |conn| {
                if repository::get_client(conn, client_id)?.is_none() {
                    return Ok(None);
                }
                Ok::<_, rusqlite::Error>(Some(repository::time_by_department(
                    conn, client_id, &start, &end,
                )?))
            })
            .await?;
        found.ok_or_else(|| Error::NotFound(format!("client {client_id}")))
    }

    // ── Dashboard ──────────────────────────────────────────────────

    pub async fn dashboard_summary(&self, as_of: NaiveDate) -> Result<DashboardSummary> {
        metrics::compute_dashboard_summary(&self.db, as_of).await
    }

    /// Overserving lists and lost revenue, priced at the configured hourly rate.
    pub async fn dashboard_analytics(&self, as_of: NaiveDate) -> Result<DashboardAnalytics> {
        let rate = self.hourly_rate().await?;
        metrics::compute_dashboard_analytics(&self.db, as_of, rate).await
    }

    pub async fn overserving_clients(
        &self,
        as_of: NaiveDate,
        months: u32,
    ) -> Result<Vec<OverservingClient>> {
        metrics::compute_overserving_clients(&self.db, as_of, months).await
    }

    pub async fn overserving_employees(
        &self,
        as_of: NaiveDate,
        months: u32,
    ) -> Result<Vec<OverservingEmployee>> {
        metrics::compute_overserving_employees(&self.db, as_of, months).await
    }

    // ── Ingestion ──────────────────────────────────────────────────

    /// Validate and store a JSON payload.
    pub async fn ingest_json(&self, json: &str, as_of: NaiveDate) -> Result<IngestReport> {
        let payload = Payload::parse(json)?;
        ingest::ingest(&self.db, payload, as_of).await
    }

    /// Replace all clients, rosters and facts with the demo data set.
    pub async fn seed_demo(&self, as_of: NaiveDate) -> Result<WarehouseCounts> {
        ingest::seed::seed_demo(&self.db, as_of).await
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<Setting>> {
        Ok(self
            .db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_setting(conn, &key)
            })
            .await?)
    }

    pub async fn config_set(&self, key: &str, value: &str, value_type: &str) -> Result<Setting> {
        if key == HourlyRate::SETTING_KEY {
            match value.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {}
                _ => {
                    return Err(Error::Config(format!(
                        "{key} must be a non-negative number, got {value:?}"
                    )))
                }
            }
        }
        Ok(self
            .db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                let value_type = value_type.to_string();
                move |conn| repository::set_config(conn, &key, &value, &value_type)
            })
            .await?)
    }

    pub async fn config_list(&self) -> Result<Vec<Setting>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?)
    }

    /// The configured hourly rate, or the default when unset or unparsable.
    pub async fn hourly_rate(&self) -> Result<HourlyRate> {
        let raw = self
            .db
            .reader()
            .call(|conn| repository::get_config(conn, HourlyRate::SETTING_KEY))
            .await?;
        Ok(match raw {
            None => HourlyRate::default(),
            Some(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => HourlyRate(v),
                _ => {
                    log::warn!(
                        "ignoring unparsable {} {s:?}, using {}",
                        HourlyRate::SETTING_KEY,
                        HourlyRate::default()
                    );
                    HourlyRate::default()
                }
            },
        })
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<WarehouseCounts> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::warehouse_counts(conn))
            .await?)
    }
}

/// Replace a snapshot's stored target with the linear ideal for its day.
fn with_recomputed_target(snapshot: BurnSnapshot, retainer_cents: i64) -> BurnSnapshot {
    BurnSnapshot {
        target_spend_to_date_cents: ideal_target_spend_to_date(retainer_cents, snapshot.date),
        ..snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn burnwatch() -> BurnWatch {
        BurnWatch::new(Database::open_memory().await.unwrap())
    }

    const CLIENTS: &str = r#"{"clients": [{"id": "A1", "name": "Acme"}]}"#;

    const ENTRIES: &str = r#"{"type": "time_entries", "data": [
        {"clientExternalId": "A1", "memberEmail": "dana@example.com", "memberName": "Dana",
         "role": "Strategist", "department": "SEO",
         "start": "2025-05-20T09:00:00Z", "end": "2025-05-20T17:00:00Z", "hours": 8, "costCents": 100000},
        {"clientExternalId": "A1", "memberEmail": "dana@example.com", "memberName": "Dana",
         "role": "Strategist", "department": "SEO",
         "start": "2025-06-10T09:00:00Z", "end": "2025-06-10T17:00:00Z", "hours": 8, "costCents": 100000},
        {"clientExternalId": "A1", "memberEmail": "lee@example.com", "memberName": "Lee",
         "role": "Writer", "department": "Content",
         "start": "2025-06-12T09:00:00Z", "end": "2025-06-12T13:00:00Z", "hours": 4, "costCents": 40000}
    ]}"#;

    async fn seeded() -> (BurnWatch, i64) {
        let bw = burnwatch().await;
        let as_of = ymd(2025, 6, 15);
        bw.ingest_json(CLIENTS, as_of).await.unwrap();
        bw.ingest_json(ENTRIES, as_of).await.unwrap();
        let snapshot = r#"{"type": "time_entry", "data": {"clientId": "A1", "date": "2025-06-12",
            "spendToDateCents": 140000, "hoursToDate": 12, "targetSpendToDateCents": 1}}"#;
        bw.ingest_json(snapshot, as_of).await.unwrap();
        let id = bw
            .clients(ClientQuery::new().search("Acme"), as_of)
            .await
            .unwrap()[0]
            .client
            .id;
        (bw, id)
    }

    #[tokio::test]
    async fn test_client_detail() {
        let (bw, id) = seeded().await;
        let detail = bw.client_detail(id, ymd(2025, 6, 15)).await.unwrap();

        assert_eq!(detail.client.client.name, "Acme");
        assert_eq!(detail.client.mtd_spend_cents, 140_000);
        assert_eq!(detail.team.len(), 2);
        assert_eq!(detail.recent_time_entries.len(), 2);
        assert!(detail.recent_time_entries[0].start.starts_with("2025-06-12"));
        assert_eq!(detail.burn_snapshots.len(), 1);
        // Retainer is 0 for clients created from the clients list
        assert_eq!(detail.burn_snapshots[0].target_spend_to_date_cents, 0);
    }

    #[tokio::test]
    async fn test_client_detail_not_found() {
        let bw = burnwatch().await;
        match bw.client_detail(42, ymd(2025, 6, 15)).await {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rollup_and_history() {
        let (bw, id) = seeded().await;
        assert_eq!(bw.rollup_month(2025, 5).await.unwrap(), 1);
        assert_eq!(bw.rollup_month(2025, 6).await.unwrap(), 1);

        let history = bw.client_history(id, ymd(2025, 6, 15)).await.unwrap();
        assert_eq!(history.monthly_summaries.len(), 2);
        assert_eq!(history.monthly_summaries[0].month, 6);
        assert_eq!(history.monthly_summaries[0].total_spend_cents, 140_000);
        assert_eq!(history.monthly_summaries[1].total_hours, 8.0);
        assert_eq!(history.current_month_snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_time_by_department() {
        let (bw, id) = seeded().await;
        let june = bw
            .time_by_department(id, Period::month_of(ymd(2025, 6, 15)))
            .await
            .unwrap();
        let names: Vec<&str> = june.iter().map(|d| d.department_name.as_str()).collect();
        assert_eq!(names, vec!["Content", "SEO"]);
        assert_eq!(june[1].spend_cents, 100_000);

        let departments = bw.departments().await.unwrap();
        assert_eq!(departments.len(), 2);

        assert!(matches!(
            bw.time_by_department(999, Period::Month(2025, 6)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hourly_rate_setting() {
        let bw = burnwatch().await;
        assert_eq!(bw.hourly_rate().await.unwrap(), HourlyRate(150.0));

        bw.config_set("hourly_rate", "175.50", "number").await.unwrap();
        assert_eq!(bw.hourly_rate().await.unwrap(), HourlyRate(175.5));
        let analytics = bw.dashboard_analytics(ymd(2025, 6, 15)).await.unwrap();
        assert_eq!(analytics.hourly_rate_cents, 17_550);

        assert!(bw.config_set("hourly_rate", "lots", "number").await.is_err());

        let setting = bw.config_get("hourly_rate").await.unwrap().unwrap();
        assert_eq!(setting.value_type, "number");
        assert_eq!(bw.config_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_stored_rate_falls_back() {
        let bw = burnwatch().await;
        bw.db()
            .writer()
            .call(|conn| repository::set_config(conn, "hourly_rate", "n/a", "string"))
            .await
            .unwrap();
        assert_eq!(bw.hourly_rate().await.unwrap(), HourlyRate::default());
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (bw, _) = seeded().await;
        let counts = bw.status().await.unwrap();
        assert_eq!(counts.clients, 1);
        assert_eq!(counts.team_members, 2);
        assert_eq!(counts.time_entries, 3);
        assert_eq!(counts.burn_snapshots, 1);
        assert_eq!(counts.last_entry_date.as_deref(), Some("2025-06-12"));
    }

    #[tokio::test]
    async fn test_demo_data_drives_every_view() {
        let bw = burnwatch().await;
        let as_of = ymd(2025, 6, 15);
        bw.seed_demo(as_of).await.unwrap();

        let active = bw
            .clients(ClientQuery::new().status(ClientStatus::Active), as_of)
            .await
            .unwrap();
        assert_eq!(active.len(), 8);
        assert_eq!(active[0].client.name, "Acme Corporation");

        let detail = bw.client_detail(active[0].client.id, as_of).await.unwrap();
        assert_eq!(detail.team.len(), 2);
        assert_eq!(detail.burn_snapshots.len(), 15);
        assert!(detail.recent_time_entries.len() <= 10);

        let history = bw.client_history(active[0].client.id, as_of).await.unwrap();
        assert_eq!(history.monthly_summaries.len(), 12);

        assert_eq!(bw.departments().await.unwrap().len(), 6);
        assert_eq!(bw.dashboard_summary(as_of).await.unwrap().active_clients, 8);
        bw.dashboard_analytics(as_of).await.unwrap();
    }
}
