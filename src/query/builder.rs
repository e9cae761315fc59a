use std::collections::HashSet;

use chrono::NaiveDate;

use crate::date_util::{date_key, month_bounds};
use crate::error::Result;
use crate::metrics::clients::aggregate_clients;
use crate::metrics::{ClientWithMetrics, Health};
use crate::storage::models::ClientStatus;
use crate::storage::repository::{self, client_from_row, CLIENT_COLUMNS};
use crate::storage::Database;

/// Builder for client listings with optional filters.
///
/// Status, account manager and name search narrow the SQL query. Department
/// and health are resolved after the month-to-date totals are known.
#[derive(Debug, Clone, Default)]
pub struct ClientQuery {
    status: Option<ClientStatus>,
    account_manager: Option<String>,
    search: Option<String>,
    department: Option<String>,
    health: Option<Health>,
}

impl ClientQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ClientStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn account_manager(mut self, name: &str) -> Self {
        self.account_manager = Some(name.to_string());
        self
    }

    /// Case-insensitive substring match on the client name.
    pub fn search(mut self, text: &str) -> Self {
        self.search = Some(text.to_string());
        self
    }

    pub fn department(mut self, name: &str) -> Self {
        self.department = Some(name.to_string());
        self
    }

    pub fn health(mut self, health: Health) -> Self {
        self.health = Some(health);
        self
    }

    /// Execute the query and decorate every matching client with its burn
    /// metrics for the month containing `as_of`.
    pub async fn clients_with_metrics(
        self,
        db: &Database,
        as_of: NaiveDate,
    ) -> Result<Vec<ClientWithMetrics>> {
        let (first, last) = month_bounds(as_of);
        let start = date_key(first);
        let end = date_key(last);
        let builder = self;

        let result = db
            .reader()
            .call(move |conn| {
                let (sql, params) = builder.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let clients = stmt
                    .query_map(param_refs.as_slice(), client_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                let totals = repository::period_totals_by_client(conn, &start, &end)?;
                let department_clients: Option<HashSet<i64>> = match builder.department {
                    Some(ref dept) => Some(repository::clients_with_department_time(
                        conn, dept, &start, &end,
                    )?),
                    None => None,
                };

                Ok::<_, rusqlite::Error>(aggregate_clients(
                    clients,
                    &totals,
                    department_clients.as_ref(),
                    builder.health,
                    as_of,
                ))
            })
            .await?;

        log::debug!("client query matched {} clients", result.len());
        Ok(result)
    }

    /// Execute the query, returning results as JSON.
    pub async fn to_json(self, db: &Database, as_of: NaiveDate) -> Result<String> {
        let rows = self.clients_with_metrics(db, as_of).await?;
        Ok(serde_json::to_string_pretty(&rows)?)
    }

    /// Execute the query, returning results as CSV.
    pub async fn to_csv(self, db: &Database, as_of: NaiveDate) -> Result<String> {
        let rows = self.clients_with_metrics(db, as_of).await?;
        Ok(rows_to_csv(&rows))
    }

    fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = Vec::new();
        let mut param_idx = 1;

        if let Some(status) = self.status {
            wheres.push(format!("c.status = ?{param_idx}"));
            params.push(Box::new(status));
            param_idx += 1;
        }

        if let Some(ref am) = self.account_manager {
            wheres.push(format!("c.account_manager = ?{param_idx}"));
            params.push(Box::new(am.clone()));
            param_idx += 1;
        }

        // LIKE is case-insensitive for ASCII in SQLite
        if let Some(ref text) = self.search {
            wheres.push(format!("c.name LIKE ?{param_idx} ESCAPE '\\'"));
            params.push(Box::new(format!("%{}%", escape_like(text))));
        }

        let mut sql = format!("SELECT {CLIENT_COLUMNS} FROM dim_clients c");
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }
        sql.push_str(" ORDER BY c.name ASC, c.client_id ASC");

        (sql, params)
    }
}

pub fn rows_to_csv(rows: &[ClientWithMetrics]) -> String {
    let mut out = String::new();
    out.push_str("client_id,name,status,account_manager,monthly_retainer_cents,mtd_spend_cents,mtd_hours,burn_pct_mtd,ideal_target_cents,variance_cents,variance_pct,health\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{:.2},{:.4},{},{},{:.4},{}\n",
            row.client.id,
            csv_escape(&row.client.name),
            row.client.status,
            csv_escape(&row.client.account_manager),
            row.client.monthly_retainer_amount_cents,
            row.mtd_spend_cents,
            row.mtd_hours,
            row.metrics.burn_pct_mtd,
            row.metrics.ideal_target_spend_to_date_cents,
            row.metrics.variance_cents,
            row.metrics.variance_pct,
            row.metrics.health,
        ));
    }
    out
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
