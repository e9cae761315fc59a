pub mod burn;
pub mod clients;
pub mod dashboard;
pub mod overserving;
pub mod revenue;
pub mod types;

pub use revenue::HourlyRate;
pub use types::*;

use chrono::NaiveDate;

use crate::error::Result;
use crate::query::builder::ClientQuery;
use crate::query::period::Period;
use crate::storage::models::ClientStatus;
use crate::storage::repository;
use crate::storage::Database;

/// Top overserving clients over the `months` trailing `as_of`.
pub async fn compute_overserving_clients(
    db: &Database,
    as_of: NaiveDate,
    months: u32,
) -> Result<Vec<OverservingClient>> {
    let months = months.max(1);
    let (start, end) = Period::Trailing(months, as_of).key_range();

    let usage = db
        .reader()
        .call(move |conn| repository::client_usage_in_window(conn, &start, &end))
        .await?;

    let top = overserving::top_overserving_clients(&usage, months);
    log::debug!(
        "{} of {} clients overserving over {months}m",
        top.len(),
        usage.len()
    );
    Ok(top)
}

/// Top overserving team members over the `months` trailing `as_of`.
pub async fn compute_overserving_employees(
    db: &Database,
    as_of: NaiveDate,
    months: u32,
) -> Result<Vec<OverservingEmployee>> {
    let months = months.max(1);
    let (start, end) = Period::Trailing(months, as_of).key_range();

    let entries = db
        .reader()
        .call(move |conn| repository::employee_entries_in_window(conn, &start, &end))
        .await?;

    let top = overserving::top_overserving_employees(&entries, months);
    log::debug!(
        "{} members overserving over {months}m ({} entries)",
        top.len(),
        entries.len()
    );
    Ok(top)
}

/// Lost revenue from the most recent single month of overserving.
pub async fn compute_lost_revenue(
    db: &Database,
    as_of: NaiveDate,
    rate: HourlyRate,
) -> Result<i64> {
    let (clients, employees) = tokio::try_join!(
        compute_overserving_clients(db, as_of, 1),
        compute_overserving_employees(db, as_of, 1),
    )?;
    Ok(revenue::lost_revenue_cents(&clients, &employees, rate))
}

/// Overserving lists and lost revenue, fetched concurrently.
pub async fn compute_dashboard_analytics(
    db: &Database,
    as_of: NaiveDate,
    rate: HourlyRate,
) -> Result<DashboardAnalytics> {
    let (clients, employees, lost) = tokio::try_join!(
        compute_overserving_clients(db, as_of, overserving::DEFAULT_WINDOW_MONTHS),
        compute_overserving_employees(db, as_of, overserving::DEFAULT_WINDOW_MONTHS),
        compute_lost_revenue(db, as_of, rate),
    )?;
    Ok(dashboard::compose(clients, employees, lost, rate))
}

/// Headline counts over ACTIVE clients for the month containing `as_of`.
pub async fn compute_dashboard_summary(
    db: &Database,
    as_of: NaiveDate,
) -> Result<DashboardSummary> {
    let active = ClientQuery::new()
        .status(ClientStatus::Active)
        .clients_with_metrics(db, as_of)
        .await?;
    Ok(clients::summarize(&active))
}
