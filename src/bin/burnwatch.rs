use std::io::Read;

use clap::{Parser, Subcommand};

use burnwatch::query::period::parse_date;
use burnwatch::{BurnWatch, ClientQuery, ClientStatus, Health, Period};

#[derive(Parser)]
#[command(name = "burnwatch", about = "Client retainer burn-rate warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.burnwatch/burnwatch.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Compute as of this date (YYYY-MM-DD, default: today)
    #[arg(long, global = true)]
    as_of: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List clients with month-to-date burn metrics
    Clients {
        /// ACTIVE, INACTIVE or all
        #[arg(long, default_value = "ACTIVE")]
        status: String,
        /// Filter by account manager
        #[arg(long)]
        am: Option<String>,
        /// Filter by health: OVER, ON_TRACK, UNDER
        #[arg(long)]
        health: Option<String>,
        /// Only clients with time logged by this department this month
        #[arg(long)]
        dept: Option<String>,
        /// Case-insensitive name search
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Show one client's burn, team, snapshots and recent entries
    Client {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Show monthly summaries and this month's snapshots for a client
    History {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Hours and spend per department for a client
    TimeByDept {
        id: i64,
        /// Month (YYYY-MM, default: the as-of month)
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List departments
    Departments,
    /// Active-client headline figures
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Overserving lists and estimated lost revenue
    Analytics {
        #[arg(long)]
        json: bool,
    },
    /// Ranked overserving report
    Overserving {
        #[command(subcommand)]
        target: OverservingTarget,
    },
    /// Roll a month's time entries up into monthly summaries
    Rollup {
        /// Month (YYYY-MM, default: the as-of month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Ingest a JSON payload from a file, or stdin with "-"
    Ingest { file: String },
    /// Replace the warehouse contents with demo data
    Seed {
        /// Seed even when the warehouse already holds clients
        #[arg(long)]
        force: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum OverservingTarget {
    /// Clients spending beyond their retainer
    Clients {
        #[arg(long, default_value = "3")]
        months: u32,
        #[arg(long)]
        json: bool,
    },
    /// Team members above the per-entry baseline
    Employees {
        #[arg(long, default_value = "3")]
        months: u32,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set {
        key: String,
        value: String,
        /// Value type tag stored alongside the value
        #[arg(long = "type", default_value = "string")]
        value_type: String,
    },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let as_of = match &cli.as_of {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };

    let db = match &cli.db {
        Some(path) => burnwatch::Database::open_at(path).await?,
        None => burnwatch::Database::open().await?,
    };
    let bw = BurnWatch::new(db);

    match cli.command {
        Commands::Clients {
            status,
            am,
            health,
            dept,
            search,
            json,
            csv,
        } => {
            let mut query = ClientQuery::new();
            if !status.eq_ignore_ascii_case("all") {
                query = query.status(status.parse::<ClientStatus>()?);
            }
            if let Some(ref am) = am {
                query = query.account_manager(am);
            }
            if let Some(ref h) = health {
                query = query.health(h.parse::<Health>()?);
            }
            if let Some(ref d) = dept {
                query = query.department(d);
            }
            if let Some(ref s) = search {
                query = query.search(s);
            }

            if json {
                println!("{}", query.to_json(bw.db(), as_of).await?);
            } else if csv {
                print!("{}", query.to_csv(bw.db(), as_of).await?);
            } else {
                let rows = bw.clients(query, as_of).await?;
                if rows.is_empty() {
                    println!("No clients found.");
                } else {
                    println!(
                        "{:<6} {:<30} {:<10} {:>12} {:>12} {:>7} {:>12}  HEALTH",
                        "ID", "NAME", "STATUS", "RETAINER", "MTD SPEND", "BURN", "VARIANCE"
                    );
                    for r in &rows {
                        println!(
                            "{:<6} {:<30} {:<10} {:>12} {:>12} {:>6.1}% {:>12}  {}",
                            r.client.id,
                            truncate(&r.client.name, 30),
                            r.client.status,
                            fmt_cents(r.client.monthly_retainer_amount_cents),
                            fmt_cents(r.mtd_spend_cents),
                            r.metrics.burn_pct_mtd * 100.0,
                            fmt_cents(r.metrics.variance_cents),
                            r.metrics.health,
                        );
                    }
                    println!("\n{} clients as of {as_of}", rows.len());
                }
            }
        }
        Commands::Client { id, json } => {
            let detail = bw.client_detail(id, as_of).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                let c = &detail.client;
                println!("{} ({})", c.client.name, c.client.status);
                if !c.client.account_manager.is_empty() {
                    println!("  Account manager: {}", c.client.account_manager);
                }
                println!("  Retainer:     {}", fmt_cents(c.client.monthly_retainer_amount_cents));
                println!("  MTD spend:    {} ({:.1}h)", fmt_cents(c.mtd_spend_cents), c.mtd_hours);
                println!("  Ideal target: {}", fmt_cents(c.metrics.ideal_target_spend_to_date_cents));
                println!(
                    "  Variance:     {} ({:+.1}%)",
                    fmt_cents(c.metrics.variance_cents),
                    c.metrics.variance_pct * 100.0
                );
                println!("  Burn:         {:.1}%  {}", c.metrics.burn_pct_mtd * 100.0, c.metrics.health);

                if !detail.team.is_empty() {
                    println!("\nTeam:");
                    for m in &detail.team {
                        println!("  {:<24} {:<20} {}", m.name, m.role, m.email);
                    }
                }
                if !detail.burn_snapshots.is_empty() {
                    println!("\nSnapshots:");
                    for s in &detail.burn_snapshots {
                        println!(
                            "  {}  spend {:>12}  target {:>12}  {:.1}h",
                            s.date,
                            fmt_cents(s.spend_to_date_cents),
                            fmt_cents(s.target_spend_to_date_cents),
                            s.hours_to_date
                        );
                    }
                }
                if !detail.recent_time_entries.is_empty() {
                    println!("\nRecent entries:");
                    for e in &detail.recent_time_entries {
                        println!("  {}  {:>6.2}h  {:>10}", e.start, e.hours, fmt_cents(e.cost_cents));
                    }
                }
            }
        }
        Commands::History { id, json } => {
            let history = bw.client_history(id, as_of).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.monthly_summaries.is_empty() {
                println!("No monthly summaries. Run: burnwatch rollup --month YYYY-MM");
            } else {
                println!("{:<8} {:>10} {:>12} {:>12} {:>8}", "MONTH", "HOURS", "SPEND", "VARIANCE", "VAR %");
                for s in &history.monthly_summaries {
                    println!(
                        "{}-{:02} {:>10.1} {:>12} {:>12} {:>7.1}%",
                        s.year,
                        s.month,
                        s.total_hours,
                        fmt_cents(s.total_spend_cents),
                        fmt_cents(s.variance_cents),
                        s.variance_pct * 100.0
                    );
                }
            }
        }
        Commands::TimeByDept { id, month, json } => {
            let period = Period::parse_month(month.as_deref(), as_of)?;
            let rows = bw.time_by_department(id, period).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No time logged in {period}.");
            } else {
                for d in &rows {
                    println!(
                        "  {:<24} {:>8.1}h {:>12}  {} members",
                        d.department_name,
                        d.hours,
                        fmt_cents(d.spend_cents),
                        d.member_count
                    );
                }
            }
        }
        Commands::Departments => {
            for d in bw.departments().await? {
                println!("  {:<6} {}", d.id, d.name);
            }
        }
        Commands::Summary { json } => {
            let summary = bw.dashboard_summary(as_of).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Dashboard ({as_of})");
                println!("  Active clients:  {}", summary.active_clients);
                println!("  On track:        {}%", summary.on_track_percentage);
                println!("  Total retainers: {}", fmt_cents(summary.total_retainer_cents));
                println!("  MTD spend:       {}", fmt_cents(summary.mtd_spend_cents));
            }
        }
        Commands::Analytics { json } => {
            let analytics = bw.dashboard_analytics(as_of).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                println!(
                    "Estimated lost revenue (last month): {} at {}/h",
                    fmt_cents(analytics.total_lost_revenue_cents),
                    fmt_cents(analytics.hourly_rate_cents)
                );
                println!("\nTop overserving clients (3 months):");
                print_overserving_clients(&analytics.top_overserving_clients);
                println!("\nTop overserving team members (3 months):");
                print_overserving_employees(&analytics.top_overserving_employees);
            }
        }
        Commands::Overserving { target } => match target {
            OverservingTarget::Clients { months, json } => {
                let rows = bw.overserving_clients(as_of, months).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    print_overserving_clients(&rows);
                }
            }
            OverservingTarget::Employees { months, json } => {
                let rows = bw.overserving_employees(as_of, months).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                } else {
                    print_overserving_employees(&rows);
                }
            }
        },
        Commands::Rollup { month } => {
            let period = Period::parse_month(month.as_deref(), as_of)?;
            let Period::Month(year, month) = period else {
                anyhow::bail!("rollup needs a calendar month (YYYY-MM), got {period}");
            };
            let written = bw.rollup_month(year, month).await?;
            println!("Rolled up {period}: {written} client summaries.");
        }
        Commands::Ingest { file } => {
            let json = if file == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)?
            };
            let report = bw.ingest_json(&json, as_of).await?;
            println!(
                "{:?}: {} {} stored, {} skipped",
                report.status, report.kind, report.items_ingested, report.items_failed
            );
        }
        Commands::Seed { force } => {
            if !force && bw.status().await?.clients > 0 {
                anyhow::bail!("warehouse already holds clients; pass --force to replace them");
            }
            let counts = bw.seed_demo(as_of).await?;
            println!(
                "Seeded {} clients, {} team members, {} time entries, {} snapshots.",
                counts.clients, counts.team_members, counts.time_entries, counts.burn_snapshots
            );
        }
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => match bw.config_get(&key).await? {
                Some(s) => println!("{key} = {} ({})", s.value, s.value_type),
                None => println!("{key} is not set"),
            },
            ConfigAction::Set {
                key,
                value,
                value_type,
            } => {
                bw.config_set(&key, &value, &value_type).await?;
                println!("Config updated.");
            }
            ConfigAction::List => {
                let settings = bw.config_list().await?;
                if settings.is_empty() {
                    println!("No config values set.");
                }
                for s in settings {
                    println!("{} = {} ({})", s.key, s.value, s.value_type);
                }
            }
        },
        Commands::Status => {
            let counts = bw.status().await?;
            println!("Warehouse Status");
            println!("  Clients:      {} ({} active)", counts.clients, counts.active_clients);
            println!("  Departments:  {}", counts.departments);
            println!("  Team members: {}", counts.team_members);
            println!("  Time entries: {}", counts.time_entries);
            println!("  Snapshots:    {}", counts.burn_snapshots);
            println!(
                "  Last entry:   {}",
                counts.last_entry_date.unwrap_or_else(|| "never".to_string())
            );
        }
    }

    Ok(())
}

fn print_overserving_clients(rows: &[burnwatch::OverservingClient]) {
    if rows.is_empty() {
        println!("  None.");
        return;
    }
    for c in rows {
        println!(
            "  {:<30} {:<20} {:>8.1}h/mo {:>12}/mo",
            truncate(&c.client_name, 30),
            c.account_manager,
            c.average_overserving_hours,
            fmt_cents(c.average_overserving_cents.round() as i64)
        );
    }
}

fn print_overserving_employees(rows: &[burnwatch::OverservingEmployee]) {
    if rows.is_empty() {
        println!("  None.");
        return;
    }
    for e in rows {
        println!(
            "  {:<24} {:<16} {:>8.1}h/mo {:>12}/mo",
            truncate(&e.member_name, 24),
            e.department,
            e.average_overserving_hours,
            fmt_cents(e.average_overserving_cents.round() as i64)
        );
    }
}

fn fmt_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
