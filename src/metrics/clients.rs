use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::metrics::burn::calculate_client_metrics;
use crate::metrics::types::{ClientWithMetrics, DashboardSummary, Health, MtdTotals};
use crate::storage::models::{Client, ClientStatus};

/// Decorate each client with its month-to-date burn metrics.
///
/// `totals` holds the pre-aggregated month sums keyed by client id; a client
/// missing from it has zero spend. When `department_clients` is given, only
/// clients in that set survive. The `health` filter runs after computation
/// since health is derived. Output is ordered by name, then id.
pub fn aggregate_clients(
    clients: Vec<Client>,
    totals: &HashMap<i64, MtdTotals>,
    department_clients: Option<&HashSet<i64>>,
    health: Option<Health>,
    as_of: NaiveDate,
) -> Vec<ClientWithMetrics> {
    let mut out: Vec<ClientWithMetrics> = clients
        .into_iter()
        .filter(|c| department_clients.is_none_or(|set| set.contains(&c.id)))
        .map(|client| {
            let mtd = totals.get(&client.id).copied().unwrap_or_default();
            let metrics =
                calculate_client_metrics(mtd.spend_cents, client.monthly_retainer_amount_cents, as_of);
            ClientWithMetrics {
                client,
                mtd_spend_cents: mtd.spend_cents,
                mtd_hours: mtd.hours,
                metrics,
            }
        })
        .filter(|c| health.is_none_or(|h| c.metrics.health == h))
        .collect();

    out.sort_by(|a, b| {
        a.client
            .name
            .cmp(&b.client.name)
            .then(a.client.id.cmp(&b.client.id))
    });
    out
}

/// Headline figures over the ACTIVE clients in `clients`.
pub fn summarize(clients: &[ClientWithMetrics]) -> DashboardSummary {
    let active: Vec<&ClientWithMetrics> = clients
        .iter()
        .filter(|c| c.client.status == ClientStatus::Active)
        .collect();

    let active_clients = active.len() as u64;
    let on_track = active
        .iter()
        .filter(|c| c.metrics.health == Health::OnTrack)
        .count() as f64;
    let on_track_percentage = if active_clients > 0 {
        (on_track / active_clients as f64 * 100.0).round() as u32
    } else {
        0
    };

    DashboardSummary {
        active_clients,
        on_track_percentage,
        total_retainer_cents: active
            .iter()
            .map(|c| c.client.monthly_retainer_amount_cents)
            .sum(),
        mtd_spend_cents: active.iter().map(|c| c.mtd_spend_cents).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client(id: i64, name: &str, retainer: i64, status: ClientStatus) -> Client {
        Client {
            id,
            external_id: None,
            name: name.to_string(),
            status,
            start_date: ymd(2024, 1, 1),
            monthly_retainer_amount_cents: retainer,
            planned_hours: None,
            hourly_blended_rate_cents: None,
            account_manager: "Mike Chen".to_string(),
        }
    }

    fn totals(pairs: &[(i64, i64)]) -> HashMap<i64, MtdTotals> {
        pairs
            .iter()
            .map(|&(id, spend)| {
                (
                    id,
                    MtdTotals {
                        spend_cents: spend,
                        hours: spend as f64 / 10_000.0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_aggregate_orders_by_name_and_defaults_to_zero() {
        let clients = vec![
            client(1, "Zenith", 1_000_000, ClientStatus::Active),
            client(2, "Acme", 1_500_000, ClientStatus::Active),
            client(3, "Acme", 500_000, ClientStatus::Active),
        ];
        let out = aggregate_clients(clients, &totals(&[(2, 900_000)]), None, None, ymd(2025, 6, 15));

        let ids: Vec<i64> = out.iter().map(|c| c.client.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        assert_eq!(out[0].mtd_spend_cents, 900_000);
        assert_eq!(out[0].metrics.health, Health::Under);
        assert_eq!(out[0].metrics.ideal_target_spend_to_date_cents, 750_000);

        // No entries this month: still listed, with zero spend
        assert_eq!(out[2].mtd_spend_cents, 0);
        assert_eq!(out[2].mtd_hours, 0.0);
    }

    #[test]
    fn test_aggregate_health_filter_after_compute() {
        let clients = vec![
            client(1, "Over Co", 1_000_000, ClientStatus::Active),
            client(2, "Track Co", 1_000_000, ClientStatus::Active),
        ];
        let t = totals(&[(1, 1_200_000), (2, 1_000_000)]);
        let over = aggregate_clients(clients.clone(), &t, None, Some(Health::Over), ymd(2025, 6, 30));
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].client.id, 1);

        let under = aggregate_clients(clients, &t, None, Some(Health::Under), ymd(2025, 6, 30));
        assert!(under.is_empty());
    }

    #[test]
    fn test_aggregate_department_filter() {
        let clients = vec![
            client(1, "A", 1_000_000, ClientStatus::Active),
            client(2, "B", 1_000_000, ClientStatus::Active),
        ];
        let set: HashSet<i64> = [2].into_iter().collect();
        let out = aggregate_clients(clients.clone(), &HashMap::new(), Some(&set), None, ymd(2025, 6, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].client.id, 2);

        let empty = HashSet::new();
        assert!(aggregate_clients(clients, &HashMap::new(), Some(&empty), None, ymd(2025, 6, 1))
            .is_empty());
    }

    #[test]
    fn test_summarize_active_only() {
        let clients = vec![
            client(1, "A", 1_000_000, ClientStatus::Active),
            client(2, "B", 2_000_000, ClientStatus::Active),
            client(3, "C", 3_000_000, ClientStatus::Active),
            client(4, "D", 9_000_000, ClientStatus::Inactive),
        ];
        // As of the last day, ON_TRACK means spend within 90%..110% of retainer
        let t = totals(&[(1, 1_000_000), (2, 500_000), (3, 3_000_000), (4, 9_000_000)]);
        let out = aggregate_clients(clients, &t, None, None, ymd(2025, 6, 30));
        let summary = summarize(&out);

        assert_eq!(summary.active_clients, 3);
        assert_eq!(summary.on_track_percentage, 67);
        assert_eq!(summary.total_retainer_cents, 6_000_000);
        assert_eq!(summary.mtd_spend_cents, 4_500_000);
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), DashboardSummary::default());
    }
}
