//! Demo warehouse: six departments, a twenty-person roster, ten clients,
//! current-month time entries and snapshots, and a year of monthly summaries.
//!
//! Generated hours follow a fixed arithmetic pattern, so seeding twice with
//! the same `as_of` produces the same rows.

use chrono::{Datelike, Months, NaiveDate};

use crate::date_util::{date_key, first_day_of_month, ideal_target_spend_to_date};
use crate::error::Result;
use crate::metrics::burn::variance;
use crate::query::period::parse_date;
use crate::storage::models::{
    BurnSnapshot, ClientStatus, MonthlySummary, NewClient, NewTeamMember, NewTimeEntry,
    WarehouseCounts,
};
use crate::storage::repository;
use crate::storage::Database;

const BLENDED_RATE_CENTS: i64 = 12_500;
const SUMMARY_MONTHS: u32 = 12;

const DEPARTMENTS: [&str; 6] = [
    "SEO",
    "Paid Media",
    "Content",
    "Web Development",
    "Analytics",
    "Customer Experience",
];

struct DemoClient {
    external_id: &'static str,
    name: &'static str,
    status: ClientStatus,
    start_date: &'static str,
    retainer_cents: i64,
    planned_hours: f64,
    account_manager: &'static str,
}

const CLIENTS: [DemoClient; 10] = [
    DemoClient {
        external_id: "ACC001",
        name: "Acme Corporation",
        status: ClientStatus::Active,
        start_date: "2024-01-15",
        retainer_cents: 1_500_000,
        planned_hours: 120.0,
        account_manager: "Sarah Johnson",
    },
    DemoClient {
        external_id: "ACC002",
        name: "TechFlow Solutions",
        status: ClientStatus::Active,
        start_date: "2024-02-01",
        retainer_cents: 2_500_000,
        planned_hours: 200.0,
        account_manager: "Mike Chen",
    },
    DemoClient {
        external_id: "ACC003",
        name: "Global Dynamics",
        status: ClientStatus::Active,
        start_date: "2024-03-10",
        retainer_cents: 800_000,
        planned_hours: 64.0,
        account_manager: "Emma Davis",
    },
    DemoClient {
        external_id: "ACC004",
        name: "Innovate Labs",
        status: ClientStatus::Active,
        start_date: "2024-01-05",
        retainer_cents: 3_200_000,
        planned_hours: 256.0,
        account_manager: "Sarah Johnson",
    },
    DemoClient {
        external_id: "ACC005",
        name: "Digital Pioneers",
        status: ClientStatus::Active,
        start_date: "2024-02-20",
        retainer_cents: 1_200_000,
        planned_hours: 96.0,
        account_manager: "Mike Chen",
    },
    DemoClient {
        external_id: "ACC006",
        name: "Future Systems",
        status: ClientStatus::Active,
        start_date: "2024-04-01",
        retainer_cents: 1_800_000,
        planned_hours: 144.0,
        account_manager: "Emma Davis",
    },
    DemoClient {
        external_id: "ACC007",
        name: "NextGen Commerce",
        status: ClientStatus::Active,
        start_date: "2024-03-15",
        retainer_cents: 2_200_000,
        planned_hours: 176.0,
        account_manager: "Sarah Johnson",
    },
    DemoClient {
        external_id: "ACC008",
        name: "Quantum Technologies",
        status: ClientStatus::Active,
        start_date: "2024-01-30",
        retainer_cents: 2_800_000,
        planned_hours: 224.0,
        account_manager: "Mike Chen",
    },
    DemoClient {
        external_id: "ACC009",
        name: "Legacy Corp",
        status: ClientStatus::Inactive,
        start_date: "2023-06-01",
        retainer_cents: 1_000_000,
        planned_hours: 80.0,
        account_manager: "Emma Davis",
    },
    DemoClient {
        external_id: "ACC010",
        name: "Old School Industries",
        status: ClientStatus::Inactive,
        start_date: "2023-03-15",
        retainer_cents: 600_000,
        planned_hours: 48.0,
        account_manager: "Sarah Johnson",
    },
];

/// (name, email, role, index into DEPARTMENTS)
const ROSTER: [(&str, &str, &str, usize); 20] = [
    ("Alex Rodriguez", "alex@agency.com", "SEO Specialist", 0),
    ("Maria Garcia", "maria@agency.com", "SEO Manager", 0),
    ("James Wilson", "james@agency.com", "PPC Specialist", 1),
    ("Lisa Zhang", "lisa@agency.com", "Paid Media Manager", 1),
    ("David Kim", "david@agency.com", "Content Writer", 2),
    ("Rachel Brown", "rachel@agency.com", "Content Strategist", 2),
    ("Tom Anderson", "tom@agency.com", "Frontend Developer", 3),
    ("Sophie Taylor", "sophie@agency.com", "Backend Developer", 3),
    ("Kevin Lee", "kevin@agency.com", "UX Designer", 3),
    ("Emily Chen", "emily@agency.com", "Data Analyst", 4),
    ("Michael Foster", "michael@agency.com", "Analytics Manager", 4),
    ("Jessica Liu", "jessica@agency.com", "CX Specialist", 5),
    ("Daniel Park", "daniel@agency.com", "CX Manager", 5),
    ("Amy Thompson", "amy@agency.com", "Junior SEO Specialist", 0),
    ("Ryan Miller", "ryan@agency.com", "Junior Developer", 3),
    ("Grace Wong", "grace@agency.com", "Content Editor", 2),
    ("Noah Davis", "noah@agency.com", "PPC Analyst", 1),
    ("Olivia Johnson", "olivia@agency.com", "Social Media Manager", 2),
    ("Lucas Martinez", "lucas@agency.com", "Technical SEO", 0),
    ("Chloe White", "chloe@agency.com", "UX Researcher", 3),
];

/// Whether a team member logs time on `day`, and for how many hours (1.0 to 8.0).
fn logged_hours(client_idx: usize, member_pos: usize, day: u32) -> Option<f64> {
    let day = day as usize;
    if (client_idx * 7 + member_pos * 3 + day * 5) % 10 >= 7 {
        return None;
    }
    Some(1.0 + ((client_idx * 13 + member_pos * 7 + day * 3) % 71) as f64 / 10.0)
}

/// Monthly hours as a share of plan, between 0.7 and 1.3.
fn summary_factor(client_idx: usize, months_ago: u32) -> f64 {
    0.7 + 0.06 * ((client_idx * 5 + months_ago as usize * 3) % 11) as f64
}

fn cost_cents(hours: f64) -> i64 {
    (hours * BLENDED_RATE_CENTS as f64).round() as i64
}

/// Replace the warehouse contents with demo data for the month of `as_of`.
///
/// Time entries and snapshots run from the first of the month through
/// `as_of`; summaries cover the twelve months before it. Settings are kept.
pub async fn seed_demo(db: &Database, as_of: NaiveDate) -> Result<WarehouseCounts> {
    let clients = CLIENTS
        .iter()
        .map(|c| {
            Ok(NewClient {
                external_id: Some(c.external_id.to_string()),
                name: c.name.to_string(),
                status: c.status,
                start_date: parse_date(c.start_date)?,
                monthly_retainer_amount_cents: c.retainer_cents,
                planned_hours: Some(c.planned_hours),
                hourly_blended_rate_cents: Some(BLENDED_RATE_CENTS),
                account_manager: c.account_manager.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let counts = db
        .writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            repository::clear_warehouse(&tx)?;

            let dept_ids = DEPARTMENTS
                .iter()
                .map(|name| repository::upsert_department(&tx, name))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut members = Vec::with_capacity(ROSTER.len());
            for (name, email, role, dept) in ROSTER {
                let member = NewTeamMember {
                    name: name.to_string(),
                    email: email.to_string(),
                    role: role.to_string(),
                    department_id: dept_ids[dept],
                };
                members.push((repository::upsert_team_member(&tx, &member)?, dept_ids[dept]));
            }

            let first = first_day_of_month(as_of);
            let mut active_idx = 0;
            for (client_idx, client) in clients.iter().enumerate() {
                let client_id = repository::upsert_client(&tx, client)?;
                let retainer = client.monthly_retainer_amount_cents;
                let planned = client.planned_hours.unwrap_or_default();

                for months_ago in 1..=SUMMARY_MONTHS {
                    let Some(month) = first.checked_sub_months(Months::new(months_ago)) else {
                        break;
                    };
                    let hours = (planned * summary_factor(client_idx, months_ago) * 10.0).round()
                        / 10.0;
                    let spend = cost_cents(hours);
                    let v = variance(spend, retainer);
                    repository::upsert_monthly_summary(
                        &tx,
                        &MonthlySummary {
                            client_id,
                            year: month.year(),
                            month: month.month(),
                            total_hours: hours,
                            total_spend_cents: spend,
                            variance_cents: v.variance_cents,
                            variance_pct: v.variance_pct,
                        },
                    )?;
                }

                if client.status != ClientStatus::Active {
                    continue;
                }

                // Two to four consecutive roster members per active client
                let team_size = 2 + active_idx % 3;
                let team: Vec<(i64, i64)> =
                    members.iter().skip(active_idx * 2).take(team_size).copied().collect();
                for (member_id, _) in &team {
                    repository::add_client_team_member(&tx, client_id, *member_id)?;
                }

                let mut spend_to_date = 0;
                let mut hours_to_date = 0.0;
                for date in first.iter_days().take(as_of.day() as usize) {
                    let key = date_key(date);
                    for (pos, (member_id, department_id)) in team.iter().enumerate() {
                        let Some(hours) = logged_hours(client_idx, pos, date.day()) else {
                            continue;
                        };
                        let end_minutes = 9 * 60 + (hours * 60.0).round() as i64;
                        let entry = NewTimeEntry {
                            client_id,
                            member_id: *member_id,
                            department_id: *department_id,
                            start: format!("{key}T09:00:00"),
                            end: format!("{key}T{:02}:{:02}:00", end_minutes / 60, end_minutes % 60),
                            hours,
                            cost_cents: cost_cents(hours),
                        };
                        repository::insert_time_entry(&tx, &entry)?;
                        spend_to_date += entry.cost_cents;
                        hours_to_date += hours;
                    }

                    repository::upsert_burn_snapshot(
                        &tx,
                        &BurnSnapshot {
                            client_id,
                            date,
                            spend_to_date_cents: spend_to_date,
                            hours_to_date,
                            target_spend_to_date_cents: ideal_target_spend_to_date(retainer, date),
                        },
                    )?;
                }
                active_idx += 1;
            }

            let counts = repository::warehouse_counts(&tx)?;
            tx.commit()?;
            Ok::<_, rusqlite::Error>(counts)
        })
        .await?;

    log::info!(
        "seeded demo warehouse as of {as_of}: {} clients, {} team members, {} time entries",
        counts.clients,
        counts.team_members,
        counts.time_entries
    );
    Ok(counts)
}
