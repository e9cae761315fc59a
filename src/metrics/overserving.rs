use std::collections::HashMap;

use crate::metrics::types::{ClientUsage, EmployeeEntry, OverservingClient, OverservingEmployee};
use crate::storage::models::ClientStatus;

/// Share of a client's retainer a single entry may cost before the member
/// counts as overserving.
pub const EMPLOYEE_BASELINE_RATIO: f64 = 0.20;
/// Length of each ranked list.
pub const TOP_N: usize = 5;
pub const DEFAULT_WINDOW_MONTHS: u32 = 3;

/// Clients whose spend across the window exceeds `retainer * months`,
/// largest excess first (ties by client id).
pub fn top_overserving_clients(usage: &[ClientUsage], months: u32) -> Vec<OverservingClient> {
    let months = months.max(1);
    let mut ranked: Vec<(i64, OverservingClient)> = usage
        .iter()
        .filter(|u| u.status == ClientStatus::Active && u.entry_count > 0)
        .filter_map(|u| {
            let allowance = u.monthly_retainer_amount_cents * months as i64;
            if u.total_cost_cents <= allowance {
                return None;
            }
            let overserving_cents = u.total_cost_cents - allowance;
            let overserving_hours = if u.total_cost_cents == 0 {
                0.0
            } else {
                overserving_cents as f64 / u.total_cost_cents as f64 * u.total_hours
            };
            Some((
                overserving_cents,
                OverservingClient {
                    client_id: u.client_id,
                    client_name: u.client_name.clone(),
                    account_manager: u.account_manager.clone(),
                    average_overserving_hours: overserving_hours / months as f64,
                    average_overserving_cents: overserving_cents as f64 / months as f64,
                },
            ))
        })
        .collect();

    ranked.sort_by(|(a_cents, a), (b_cents, b)| {
        b_cents.cmp(a_cents).then(a.client_id.cmp(&b.client_id))
    });
    ranked.into_iter().take(TOP_N).map(|(_, c)| c).collect()
}

#[derive(Default)]
struct MemberTally<'a> {
    name: &'a str,
    department: &'a str,
    total_hours: f64,
    total_cost_cents: i64,
    ratio_sum: f64,
    ratio_count: u32,
}

/// Members whose average per-entry cost/retainer ratio exceeds the baseline,
/// highest total cost first (ties by member id).
///
/// Entries against zero-retainer clients carry no ratio. They still count
/// towards the member's hours and cost.
pub fn top_overserving_employees(
    entries: &[EmployeeEntry],
    months: u32,
) -> Vec<OverservingEmployee> {
    let months = months.max(1);
    let mut tallies: HashMap<i64, MemberTally<'_>> = HashMap::new();

    for e in entries
        .iter()
        .filter(|e| e.client_status == ClientStatus::Active)
    {
        let t = tallies.entry(e.member_id).or_default();
        t.name = &e.member_name;
        t.department = &e.department;
        t.total_hours += e.hours;
        t.total_cost_cents += e.cost_cents;
        if e.client_retainer_cents > 0 {
            t.ratio_sum += e.cost_cents as f64 / e.client_retainer_cents as f64;
            t.ratio_count += 1;
        }
    }

    let mut ranked: Vec<(i64, OverservingEmployee)> = tallies
        .into_iter()
        .filter(|(_, t)| t.ratio_count > 0)
        .filter_map(|(member_id, t)| {
            let avg_ratio = t.ratio_sum / t.ratio_count as f64;
            if avg_ratio <= EMPLOYEE_BASELINE_RATIO {
                return None;
            }
            let overserving_hours = (avg_ratio - EMPLOYEE_BASELINE_RATIO) * t.total_hours;
            Some((
                t.total_cost_cents,
                OverservingEmployee {
                    member_id,
                    member_name: t.name.to_string(),
                    department: t.department.to_string(),
                    average_overserving_hours: overserving_hours / months as f64,
                    average_overserving_cents: t.total_cost_cents as f64 / months as f64,
                },
            ))
        })
        .collect();

    ranked.sort_by(|(a_cost, a), (b_cost, b)| {
        b_cost.cmp(a_cost).then(a.member_id.cmp(&b.member_id))
    });
    ranked.into_iter().take(TOP_N).map(|(_, e)| e).collect()
}
