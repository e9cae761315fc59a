use crate::metrics::revenue::HourlyRate;
use crate::metrics::types::{DashboardAnalytics, OverservingClient, OverservingEmployee};

pub fn compose(
    top_clients: Vec<OverservingClient>,
    top_employees: Vec<OverservingEmployee>,
    lost_revenue_cents: i64,
    rate: HourlyRate,
) -> DashboardAnalytics {
    DashboardAnalytics {
        top_overserving_clients: top_clients,
        top_overserving_employees: top_employees,
        total_lost_revenue_cents: lost_revenue_cents,
        hourly_rate_cents: rate.to_cents(),
    }
}
