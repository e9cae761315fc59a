use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::date_key;
use crate::metrics::{ClientUsage, EmployeeEntry, MtdTotals};
use crate::storage::models::{
    BurnSnapshot, Client, Department, DepartmentTime, MonthlySummary, NewClient, NewTeamMember,
    NewTimeEntry, Setting, TeamMember, TimeEntry, WarehouseCounts,
};

// ── Clients ────────────────────────────────────────────────────────

/// Column list matching [`client_from_row`].
pub(crate) const CLIENT_COLUMNS: &str = "c.client_id, c.external_id, c.name, c.status, c.start_date,
    c.monthly_retainer_amount_cents, c.planned_hours, c.hourly_blended_rate_cents,
    c.account_manager";

pub(crate) fn client_from_row(row: &Row<'_>) -> Result<Client, rusqlite::Error> {
    Ok(Client {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        start_date: date_from_row(row, 4)?,
        monthly_retainer_amount_cents: row.get(5)?,
        planned_hours: row.get(6)?,
        hourly_blended_rate_cents: row.get(7)?,
        account_manager: row.get(8)?,
    })
}

/// Insert a client, or update it in place when `external_id` already exists.
/// Returns the client id.
pub fn upsert_client(conn: &Connection, client: &NewClient) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO dim_clients (
            external_id, name, status, start_date, monthly_retainer_amount_cents,
            planned_hours, hourly_blended_rate_cents, account_manager, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'), datetime('now'))
        ON CONFLICT(external_id) DO UPDATE SET
            name=excluded.name, status=excluded.status, start_date=excluded.start_date,
            monthly_retainer_amount_cents=excluded.monthly_retainer_amount_cents,
            planned_hours=excluded.planned_hours,
            hourly_blended_rate_cents=excluded.hourly_blended_rate_cents,
            account_manager=excluded.account_manager, updated_at=excluded.updated_at
        RETURNING client_id",
        params![
            client.external_id,
            client.name,
            client.status,
            client.start_date.format("%Y-%m-%d").to_string(),
            client.monthly_retainer_amount_cents,
            client.planned_hours,
            client.hourly_blended_rate_cents,
            client.account_manager,
        ],
        |row| row.get(0),
    )
}

/// Update only the name and status of a client known by external id,
/// creating a placeholder when it does not exist yet.
pub fn upsert_client_identity(
    conn: &Connection,
    external_id: &str,
    name: &str,
    status: crate::storage::models::ClientStatus,
    start_date: NaiveDate,
) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO dim_clients (
            external_id, name, status, start_date, monthly_retainer_amount_cents,
            account_manager, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, '', datetime('now'), datetime('now'))
        ON CONFLICT(external_id) DO UPDATE SET
            name=excluded.name, status=excluded.status, updated_at=excluded.updated_at
        RETURNING client_id",
        params![
            external_id,
            name,
            status,
            start_date.format("%Y-%m-%d").to_string()
        ],
        |row| row.get(0),
    )
}

pub fn get_client(conn: &Connection, client_id: i64) -> Result<Option<Client>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLUMNS} FROM dim_clients c WHERE c.client_id = ?1"),
        params![client_id],
        client_from_row,
    )
    .optional()
}

pub fn find_client_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<Client>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLUMNS} FROM dim_clients c WHERE c.external_id = ?1"),
        params![external_id],
        client_from_row,
    )
    .optional()
}

// ── Departments ────────────────────────────────────────────────────

pub fn upsert_department(conn: &Connection, name: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO dim_departments (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name=excluded.name
         RETURNING department_id",
        params![name],
        |row| row.get(0),
    )
}

pub fn list_departments(conn: &Connection) -> Result<Vec<Department>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT department_id, name FROM dim_departments ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Department {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

// ── Team Members ───────────────────────────────────────────────────

/// Insert a team member, or update name/role/department when the email exists.
pub fn upsert_team_member(
    conn: &Connection,
    member: &NewTeamMember,
) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO dim_team_members (name, email, role, department_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'), datetime('now'))
         ON CONFLICT(email) DO UPDATE SET
            name=excluded.name, role=excluded.role,
            department_id=excluded.department_id, updated_at=excluded.updated_at
         RETURNING member_id",
        params![member.name, member.email, member.role, member.department_id],
        |row| row.get(0),
    )
}

pub fn add_client_team_member(
    conn: &Connection,
    client_id: i64,
    member_id: i64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO bridge_client_team (client_id, member_id) VALUES (?1, ?2)",
        params![client_id, member_id],
    )?;
    Ok(())
}

pub fn list_team_members_by_client(
    conn: &Connection,
    client_id: i64,
) -> Result<Vec<TeamMember>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT m.member_id, m.name, m.email, m.role, m.department_id
         FROM dim_team_members m
         JOIN bridge_client_team bct ON bct.member_id = m.member_id
         WHERE bct.client_id = ?1
         ORDER BY m.name",
    )?;
    let rows = stmt.query_map(params![client_id], |row| {
        Ok(TeamMember {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            department_id: row.get(4)?,
        })
    })?;
    rows.collect()
}

// ── Time Entries ───────────────────────────────────────────────────

/// Fails with a conversion error unless `entry.start` begins with a `YYYY-MM-DD` date.
pub fn insert_time_entry(conn: &Connection, entry: &NewTimeEntry) -> Result<i64, rusqlite::Error> {
    let start_date = NaiveDate::parse_from_str(&date_key_from_iso(&entry.start), "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO fact_time_entries (
            client_id, member_id, department_id, start_at, end_at, start_date_key,
            hours, cost_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
        params![
            entry.client_id,
            entry.member_id,
            entry.department_id,
            entry.start,
            entry.end,
            date_key(start_date),
            entry.hours,
            entry.cost_cents,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Time entries for a client whose start date falls in `[start, end]`, newest first.
pub fn list_time_entries(
    conn: &Connection,
    client_id: i64,
    start: &str,
    end: &str,
    limit: u32,
) -> Result<Vec<TimeEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, client_id, member_id, department_id, start_at, end_at, hours, cost_cents
         FROM fact_time_entries
         WHERE client_id = ?1 AND start_date_key >= ?2 AND start_date_key <= ?3
         ORDER BY start_at DESC, entry_id DESC
         LIMIT ?4",
    )?;
    let rows = stmt.query_map(params![client_id, start, end, limit], |row| {
        Ok(TimeEntry {
            id: row.get(0)?,
            client_id: row.get(1)?,
            member_id: row.get(2)?,
            department_id: row.get(3)?,
            start: row.get(4)?,
            end: row.get(5)?,
            hours: row.get(6)?,
            cost_cents: row.get(7)?,
        })
    })?;
    rows.collect()
}

// ── Aggregates ─────────────────────────────────────────────────────

/// Cost and hours per client for entries starting within `[start, end]`,
/// computed in a single grouped pass.
pub fn period_totals_by_client(
    conn: &Connection,
    start: &str,
    end: &str,
) -> Result<HashMap<i64, MtdTotals>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT client_id, COALESCE(SUM(cost_cents), 0), COALESCE(SUM(hours), 0.0)
         FROM fact_time_entries
         WHERE start_date_key >= ?1 AND start_date_key <= ?2
         GROUP BY client_id",
    )?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            MtdTotals {
                spend_cents: row.get(1)?,
                hours: row.get(2)?,
            },
        ))
    })?;
    rows.collect()
}

/// Ids of clients with at least one entry in `[start, end]` logged by a
/// member of the named department.
pub fn clients_with_department_time(
    conn: &Connection,
    department: &str,
    start: &str,
    end: &str,
) -> Result<HashSet<i64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT te.client_id
         FROM fact_time_entries te
         JOIN dim_team_members m ON m.member_id = te.member_id
         JOIN dim_departments d ON d.department_id = m.department_id
         WHERE d.name = ?1 AND te.start_date_key >= ?2 AND te.start_date_key <= ?3",
    )?;
    let rows = stmt.query_map(params![department, start, end], |row| row.get(0))?;
    rows.collect()
}

/// Totals per ACTIVE client over `[start, end]`. Clients without entries in
/// the window produce no row.
pub fn client_usage_in_window(
    conn: &Connection,
    start: &str,
    end: &str,
) -> Result<Vec<ClientUsage>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.client_id, c.name, c.account_manager, c.status,
                c.monthly_retainer_amount_cents,
                SUM(te.cost_cents), SUM(te.hours), COUNT(*)
         FROM fact_time_entries te
         JOIN dim_clients c ON c.client_id = te.client_id
         WHERE c.status = 'ACTIVE'
           AND te.start_date_key >= ?1 AND te.start_date_key <= ?2
         GROUP BY c.client_id
         ORDER BY c.client_id",
    )?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok(ClientUsage {
            client_id: row.get(0)?,
            client_name: row.get(1)?,
            account_manager: row.get(2)?,
            status: row.get(3)?,
            monthly_retainer_amount_cents: row.get(4)?,
            total_cost_cents: row.get(5)?,
            total_hours: row.get(6)?,
            entry_count: row.get::<_, i64>(7)? as u64,
        })
    })?;
    rows.collect()
}

/// Every entry against an ACTIVE client in `[start, end]`, joined with the
/// member, the member's department and the client's retainer.
pub fn employee_entries_in_window(
    conn: &Connection,
    start: &str,
    end: &str,
) -> Result<Vec<EmployeeEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT m.member_id, m.name, d.name, c.status, c.monthly_retainer_amount_cents,
                te.hours, te.cost_cents
         FROM fact_time_entries te
         JOIN dim_team_members m ON m.member_id = te.member_id
         JOIN dim_departments d ON d.department_id = m.department_id
         JOIN dim_clients c ON c.client_id = te.client_id
         WHERE c.status = 'ACTIVE'
           AND te.start_date_key >= ?1 AND te.start_date_key <= ?2
         ORDER BY te.entry_id",
    )?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok(EmployeeEntry {
            member_id: row.get(0)?,
            member_name: row.get(1)?,
            department: row.get(2)?,
            client_status: row.get(3)?,
            client_retainer_cents: row.get(4)?,
            hours: row.get(5)?,
            cost_cents: row.get(6)?,
        })
    })?;
    rows.collect()
}

pub fn time_by_department(
    conn: &Connection,
    client_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<DepartmentTime>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT d.department_id, d.name, SUM(te.hours), SUM(te.cost_cents),
                COUNT(DISTINCT te.member_id)
         FROM fact_time_entries te
         JOIN dim_departments d ON d.department_id = te.department_id
         WHERE te.client_id = ?1 AND te.start_date_key >= ?2 AND te.start_date_key <= ?3
         GROUP BY d.department_id, d.name
         ORDER BY d.name",
    )?;
    let rows = stmt.query_map(params![client_id, start, end], |row| {
        Ok(DepartmentTime {
            department_id: row.get(0)?,
            department_name: row.get(1)?,
            hours: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            spend_cents: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            member_count: row.get::<_, i64>(4)? as u64,
        })
    })?;
    rows.collect()
}

// ── Burn Snapshots ─────────────────────────────────────────────────

/// Insert or replace the snapshot for `(client_id, date)`.
pub fn upsert_burn_snapshot(
    conn: &Connection,
    snapshot: &BurnSnapshot,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_burn_snapshots (
            client_id, date_key, spend_to_date_cents, hours_to_date, target_spend_to_date_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(client_id, date_key) DO UPDATE SET
            spend_to_date_cents=excluded.spend_to_date_cents,
            hours_to_date=excluded.hours_to_date,
            target_spend_to_date_cents=excluded.target_spend_to_date_cents",
        params![
            snapshot.client_id,
            snapshot.date.format("%Y-%m-%d").to_string(),
            snapshot.spend_to_date_cents,
            snapshot.hours_to_date,
            snapshot.target_spend_to_date_cents,
        ],
    )?;
    Ok(())
}

pub fn list_burn_snapshots(
    conn: &Connection,
    client_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<BurnSnapshot>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT client_id, date_key, spend_to_date_cents, hours_to_date, target_spend_to_date_cents
         FROM fact_burn_snapshots
         WHERE client_id = ?1 AND date_key >= ?2 AND date_key <= ?3
         ORDER BY date_key",
    )?;
    let rows = stmt.query_map(params![client_id, start, end], |row| {
        Ok(BurnSnapshot {
            client_id: row.get(0)?,
            date: date_from_row(row, 1)?,
            spend_to_date_cents: row.get(2)?,
            hours_to_date: row.get(3)?,
            target_spend_to_date_cents: row.get(4)?,
        })
    })?;
    rows.collect()
}

// ── Monthly Summaries ──────────────────────────────────────────────

pub fn upsert_monthly_summary(
    conn: &Connection,
    summary: &MonthlySummary,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO fact_monthly_summaries (
            client_id, year, month, total_hours, total_spend_cents, variance_cents, variance_pct
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(client_id, year, month) DO UPDATE SET
            total_hours=excluded.total_hours, total_spend_cents=excluded.total_spend_cents,
            variance_cents=excluded.variance_cents, variance_pct=excluded.variance_pct",
        params![
            summary.client_id,
            summary.year,
            summary.month,
            summary.total_hours,
            summary.total_spend_cents,
            summary.variance_cents,
            summary.variance_pct,
        ],
    )?;
    Ok(())
}

/// Monthly summaries for a client, newest first.
pub fn list_monthly_summaries(
    conn: &Connection,
    client_id: i64,
) -> Result<Vec<MonthlySummary>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT client_id, year, month, total_hours, total_spend_cents, variance_cents, variance_pct
         FROM fact_monthly_summaries
         WHERE client_id = ?1
         ORDER BY year DESC, month DESC",
    )?;
    let rows = stmt.query_map(params![client_id], |row| {
        Ok(MonthlySummary {
            client_id: row.get(0)?,
            year: row.get(1)?,
            month: row.get(2)?,
            total_hours: row.get(3)?,
            total_spend_cents: row.get(4)?,
            variance_cents: row.get(5)?,
            variance_pct: row.get(6)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<Setting>, rusqlite::Error> {
    conn.query_row(
        "SELECT key, value, value_type, updated_at FROM app_config WHERE key = ?1",
        params![key],
        setting_from_row,
    )
    .optional()
}

pub fn set_config(
    conn: &Connection,
    key: &str,
    value: &str,
    value_type: &str,
) -> Result<Setting, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO app_config (key, value, value_type, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value=excluded.value, value_type=excluded.value_type, updated_at=excluded.updated_at
         RETURNING key, value, value_type, updated_at",
        params![key, value, value_type],
        setting_from_row,
    )
}

pub fn list_config(conn: &Connection) -> Result<Vec<Setting>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT key, value, value_type, updated_at FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], setting_from_row)?;
    rows.collect()
}

fn setting_from_row(row: &Row<'_>) -> Result<Setting, rusqlite::Error> {
    Ok(Setting {
        key: row.get(0)?,
        value: row.get(1)?,
        value_type: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

// ── Status ─────────────────────────────────────────────────────────

pub fn warehouse_counts(conn: &Connection) -> Result<WarehouseCounts, rusqlite::Error> {
    let count = |sql: &str| -> Result<u64, rusqlite::Error> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };
    Ok(WarehouseCounts {
        clients: count("SELECT COUNT(*) FROM dim_clients")?,
        active_clients: count("SELECT COUNT(*) FROM dim_clients WHERE status = 'ACTIVE'")?,
        departments: count("SELECT COUNT(*) FROM dim_departments")?,
        team_members: count("SELECT COUNT(*) FROM dim_team_members")?,
        time_entries: count("SELECT COUNT(*) FROM fact_time_entries")?,
        burn_snapshots: count("SELECT COUNT(*) FROM fact_burn_snapshots")?,
        last_entry_date: conn.query_row(
            "SELECT MAX(start_date_key) FROM fact_time_entries",
            [],
            |row| row.get(0),
        )?,
    })
}

/// Delete every client, roster, and fact row. Settings are kept.
pub fn clear_warehouse(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "DELETE FROM fact_burn_snapshots;
         DELETE FROM fact_monthly_summaries;
         DELETE FROM fact_time_entries;
         DELETE FROM bridge_client_team;
         DELETE FROM dim_team_members;
         DELETE FROM dim_departments;
         DELETE FROM dim_clients;",
    )
}

// ── Helpers ────────────────────────────────────────────────────────

/// Extract YYYY-MM-DD from an ISO datetime string.
fn date_key_from_iso(iso: &str) -> String {
    iso.get(..10).unwrap_or(iso).to_string()
}

fn date_from_row(row: &Row<'_>, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&date_key_from_iso(&s), "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::ClientStatus;
    use crate::storage::Database;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_client(external_id: &str, name: &str, retainer: i64) -> NewClient {
        NewClient {
            external_id: Some(external_id.to_string()),
            name: name.to_string(),
            status: ClientStatus::Active,
            start_date: ymd(2024, 1, 15),
            monthly_retainer_amount_cents: retainer,
            planned_hours: Some(120.0),
            hourly_blended_rate_cents: Some(12_500),
            account_manager: "Sarah Johnson".to_string(),
        }
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "hourly_rate", "175", "number")?;
                let val = get_config(conn, "hourly_rate")?;
                assert_eq!(val, Some("175".to_string()));

                let setting = get_setting(conn, "hourly_rate")?.unwrap();
                assert_eq!(setting.value_type, "number");

                let updated = set_config(conn, "hourly_rate", "180", "number")?;
                assert_eq!(updated.value, "180");
                assert_eq!(list_config(conn)?.len(), 1);

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_client_upsert_by_external_id() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let id = upsert_client(conn, &new_client("ACC001", "Acme", 1_500_000))?;
                let again = upsert_client(conn, &new_client("ACC001", "Acme Corp", 1_600_000))?;
                assert_eq!(id, again);

                let client = get_client(conn, id)?.unwrap();
                assert_eq!(client.name, "Acme Corp");
                assert_eq!(client.monthly_retainer_amount_cents, 1_600_000);
                assert_eq!(client.start_date, ymd(2024, 1, 15));
                assert_eq!(client.status, ClientStatus::Active);

                let by_ext = find_client_by_external_id(conn, "ACC001")?.unwrap();
                assert_eq!(by_ext.id, id);
                assert!(find_client_by_external_id(conn, "nope")?.is_none());
                assert!(get_client(conn, id + 100)?.is_none());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_client_identity_upsert_keeps_retainer() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let id = upsert_client(conn, &new_client("ACC002", "TechFlow", 800_000))?;
                let same = upsert_client_identity(
                    conn,
                    "ACC002",
                    "TechFlow Solutions",
                    ClientStatus::Inactive,
                    ymd(2025, 1, 1),
                )?;
                assert_eq!(id, same);
                let client = get_client(conn, id)?.unwrap();
                assert_eq!(client.name, "TechFlow Solutions");
                assert_eq!(client.status, ClientStatus::Inactive);
                assert_eq!(client.monthly_retainer_amount_cents, 800_000);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_team_roster_and_time_entries() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let client_id = upsert_client(conn, &new_client("ACC001", "Acme", 1_500_000))?;
                let seo = upsert_department(conn, "SEO")?;
                assert_eq!(upsert_department(conn, "SEO")?, seo);

                let member_id = upsert_team_member(
                    conn,
                    &NewTeamMember {
                        name: "Dana".to_string(),
                        email: "dana@example.com".to_string(),
                        role: "Strategist".to_string(),
                        department_id: seo,
                    },
                )?;
                add_client_team_member(conn, client_id, member_id)?;
                add_client_team_member(conn, client_id, member_id)?;

                let roster = list_team_members_by_client(conn, client_id)?;
                assert_eq!(roster.len(), 1);
                assert_eq!(roster[0].email, "dana@example.com");

                for (start, cost) in [
                    ("2025-06-02T09:00:00", 10_000),
                    ("2025-06-30T23:30:00", 20_000),
                    ("2025-07-01T08:00:00", 40_000),
                ] {
                    insert_time_entry(
                        conn,
                        &NewTimeEntry {
                            client_id,
                            member_id,
                            department_id: seo,
                            start: start.to_string(),
                            end: start.to_string(),
                            hours: 2.0,
                            cost_cents: cost,
                        },
                    )?;
                }

                // Last day of the month is inclusive
                let totals = period_totals_by_client(conn, "2025-06-01", "2025-06-30")?;
                assert_eq!(totals[&client_id].spend_cents, 30_000);
                assert_eq!(totals[&client_id].hours, 4.0);

                let june = list_time_entries(conn, client_id, "2025-06-01", "2025-06-30", 10)?;
                assert_eq!(june.len(), 2);
                assert_eq!(june[0].cost_cents, 20_000, "newest first");

                let by_dept = time_by_department(conn, client_id, "2025-06-01", "2025-06-30")?;
                assert_eq!(by_dept.len(), 1);
                assert_eq!(by_dept[0].department_name, "SEO");
                assert_eq!(by_dept[0].spend_cents, 30_000);
                assert_eq!(by_dept[0].member_count, 1);

                let seo_clients =
                    clients_with_department_time(conn, "SEO", "2025-06-01", "2025-06-30")?;
                assert!(seo_clients.contains(&client_id));
                let none =
                    clients_with_department_time(conn, "Paid Media", "2025-06-01", "2025-06-30")?;
                assert!(none.is_empty());

                let counts = warehouse_counts(conn)?;
                assert_eq!(counts.time_entries, 3);
                assert_eq!(counts.last_entry_date.as_deref(), Some("2025-07-01"));
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_burn_snapshot_upsert_by_client_and_date() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let client_id = upsert_client(conn, &new_client("ACC001", "Acme", 1_500_000))?;
                let mut snap = BurnSnapshot {
                    client_id,
                    date: ymd(2025, 6, 10),
                    spend_to_date_cents: 100_000,
                    hours_to_date: 8.0,
                    target_spend_to_date_cents: 500_000,
                };
                upsert_burn_snapshot(conn, &snap)?;
                snap.spend_to_date_cents = 150_000;
                upsert_burn_snapshot(conn, &snap)?;

                let snaps = list_burn_snapshots(conn, client_id, "2025-06-01", "2025-06-30")?;
                assert_eq!(snaps.len(), 1);
                assert_eq!(snaps[0].spend_to_date_cents, 150_000);
                assert_eq!(snaps[0].date, ymd(2025, 6, 10));
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_monthly_summaries_newest_first() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let client_id = upsert_client(conn, &new_client("ACC001", "Acme", 1_500_000))?;
                for (year, month) in [(2024, 12), (2025, 2), (2025, 1)] {
                    upsert_monthly_summary(
                        conn,
                        &MonthlySummary {
                            client_id,
                            year,
                            month,
                            total_hours: 100.0,
                            total_spend_cents: 1_400_000,
                            variance_cents: -100_000,
                            variance_pct: -0.0667,
                        },
                    )?;
                }
                let summaries = list_monthly_summaries(conn, client_id)?;
                let keys: Vec<(i32, u32)> = summaries.iter().map(|s| (s.year, s.month)).collect();
                assert_eq!(keys, vec![(2025, 2), (2025, 1), (2024, 12)]);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_date_key_from_iso() {
        assert_eq!(date_key_from_iso("2025-01-15T10:30:00.000Z"), "2025-01-15");
        assert_eq!(date_key_from_iso("2025-01-15"), "2025-01-15");
        assert_eq!(date_key_from_iso("2025-06-1é"), "2025-06-1é");
        assert_eq!(date_key_from_iso("é"), "é");
    }

    #[tokio::test]
    async fn test_time_entry_requires_leading_date() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let client_id = upsert_client(conn, &new_client("ACC001", "Acme", 1_500_000))?;
                let seo = upsert_department(conn, "SEO")?;
                let member_id = upsert_team_member(
                    conn,
                    &NewTeamMember {
                        name: "Dana".to_string(),
                        email: "dana@example.com".to_string(),
                        role: "Strategist".to_string(),
                        department_id: seo,
                    },
                )?;
                let entry = |start: &str| NewTimeEntry {
                    client_id,
                    member_id,
                    department_id: seo,
                    start: start.to_string(),
                    end: start.to_string(),
                    hours: 1.0,
                    cost_cents: 100,
                };

                for bad in ["2025-06-1é", "2025-06-1éT09:00:00", "06/15/2025", ""] {
                    assert!(
                        matches!(
                            insert_time_entry(conn, &entry(bad)),
                            Err(rusqlite::Error::ToSqlConversionFailure(_))
                        ),
                        "{bad:?}"
                    );
                }
                insert_time_entry(conn, &entry("2025-06-15T09:00:00Z"))?;

                let counts = warehouse_counts(conn)?;
                assert_eq!(counts.time_entries, 1);
                assert_eq!(counts.last_entry_date.as_deref(), Some("2025-06-15"));
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
