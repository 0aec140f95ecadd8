use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

mod aggregate;
mod config;
mod currency;
mod db;
mod error;
mod logging;
mod models;
mod report;

use db::Gateway;
use error::DashboardError;
use models::{FinancialSnapshot, LeadSnapshot, Record, Task, TaskStatus};

#[derive(Parser)]
#[command(name = "ceo-dashboard")]
#[command(about = "Track tasks, finances and leads", long_about = None)]
struct Cli {
    /// Dashboard database file (defaults to $DASHBOARD_DB, then ceo_dashboard.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dashboard tables if they do not exist
    InitDb,
    /// Load a small sample of tasks and snapshots
    Seed,
    /// Record a new task
    AddTask {
        #[arg(long)]
        name: String,
        #[arg(long)]
        client: String,
        #[arg(long, default_value = "Not Started")]
        status: TaskStatus,
        /// Task length in days
        #[arg(long, default_value_t = 0)]
        length: i64,
        /// Start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// List tasks with the status distribution
    Tasks {
        #[arg(long)]
        json: bool,
    },
    /// Overwrite fields of an existing task; its length is recomputed from the dates
    EditTask {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Remove a task
    DeleteTask {
        #[arg(long)]
        id: i64,
    },
    /// Tasks whose date range overlaps a month
    Calendar {
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Record a new financial snapshot
    AddFinances(FinanceFields),
    /// Show the current financial snapshot
    Finances {
        #[arg(long)]
        json: bool,
    },
    /// Overwrite fields of an existing financial snapshot
    EditFinances {
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        fields: FinanceFields,
    },
    /// Record a new lead snapshot
    AddLeads(LeadFields),
    /// Show the current lead snapshot
    Leads {
        #[arg(long)]
        json: bool,
    },
    /// Overwrite fields of an existing lead snapshot
    EditLeads {
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        fields: LeadFields,
    },
    /// Render tasks, finances and leads as markdown
    Overview {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import tasks from a CSV file
    ImportTasks {
        #[arg(long)]
        csv: PathBuf,
    },
}

/// Rejects `inf` and `NaN`, which `f64::from_str` otherwise accepts.
fn parse_amount(value: &str) -> Result<f64, String> {
    let amount: f64 = value.trim().parse().map_err(|err| format!("{err}"))?;
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(format!("`{value}` is not a finite amount"))
    }
}

#[derive(Args, Default)]
struct FinanceFields {
    #[arg(long, value_parser = parse_amount)]
    current_balance: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    invoices_issued_30: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    invoices_issued_quarter: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    invoices_issued_ytd: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    quotes_generated_30: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    quotes_generated_quarter: Option<f64>,
    #[arg(long, value_parser = parse_amount)]
    quotes_generated_ytd: Option<f64>,
}

impl FinanceFields {
    fn apply_to(self, s: &mut FinancialSnapshot) {
        let FinanceFields {
            current_balance,
            invoices_issued_30,
            invoices_issued_quarter,
            invoices_issued_ytd,
            quotes_generated_30,
            quotes_generated_quarter,
            quotes_generated_ytd,
        } = self;
        let targets = [
            (current_balance, &mut s.current_balance),
            (invoices_issued_30, &mut s.invoices_issued_30),
            (invoices_issued_quarter, &mut s.invoices_issued_quarter),
            (invoices_issued_ytd, &mut s.invoices_issued_ytd),
            (quotes_generated_30, &mut s.quotes_generated_30),
            (quotes_generated_quarter, &mut s.quotes_generated_quarter),
            (quotes_generated_ytd, &mut s.quotes_generated_ytd),
        ];
        for (value, target) in targets {
            if let Some(value) = value {
                *target = value;
            }
        }
    }

    /// Unset amounts are recorded as zero.
    fn into_snapshot(self) -> FinancialSnapshot {
        let mut snapshot = FinancialSnapshot {
            id: None,
            current_balance: 0.0,
            invoices_issued_30: 0.0,
            invoices_issued_quarter: 0.0,
            invoices_issued_ytd: 0.0,
            quotes_generated_30: 0.0,
            quotes_generated_quarter: 0.0,
            quotes_generated_ytd: 0.0,
        };
        self.apply_to(&mut snapshot);
        snapshot
    }
}

#[derive(Args, Default)]
struct LeadFields {
    #[arg(long)]
    linkedin_leads: Option<i64>,
    #[arg(long)]
    web_leads: Option<i64>,
    #[arg(long)]
    briefs_not_started: Option<i64>,
    #[arg(long)]
    quotes_issued: Option<i64>,
    #[arg(long)]
    briefs_completed: Option<i64>,
    #[arg(long, value_parser = parse_amount)]
    invoices_issued_leads: Option<f64>,
}

impl LeadFields {
    fn apply_to(self, snapshot: &mut LeadSnapshot) {
        let counts = [
            (self.linkedin_leads, &mut snapshot.linkedin_leads),
            (self.web_leads, &mut snapshot.web_leads),
            (self.briefs_not_started, &mut snapshot.briefs_not_started),
            (self.quotes_issued, &mut snapshot.quotes_issued),
            (self.briefs_completed, &mut snapshot.briefs_completed),
        ];
        for (value, target) in counts {
            if let Some(value) = value {
                *target = value;
            }
        }
        if let Some(amount) = self.invoices_issued_leads {
            snapshot.invoices_issued_leads = amount;
        }
    }

    fn into_snapshot(self) -> LeadSnapshot {
        let mut snapshot = LeadSnapshot {
            id: None,
            linkedin_leads: 0,
            web_leads: 0,
            briefs_not_started: 0,
            quotes_issued: 0,
            briefs_completed: 0,
            invoices_issued_leads: 0.0,
        };
        self.apply_to(&mut snapshot);
        snapshot
    }
}

async fn load<R: Record>(gateway: &Gateway, id: i64) -> anyhow::Result<R> {
    let record = gateway
        .find::<R>(id)
        .await?
        .ok_or(DashboardError::NotFound {
            table: R::TABLE,
            id,
        })?;
    Ok(record)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let db_path = config::resolve_db_path(cli.db);
    let gateway = Gateway::new(&db_path);

    gateway
        .ensure_schema()
        .await
        .with_context(|| format!("failed to open dashboard store at {}", db_path.display()))?;

    match cli.command {
        Commands::InitDb => {
            println!("Schema ready at {}.", gateway.path().display());
        }
        Commands::Seed => {
            db::seed(&gateway).await?;
            println!("Seed data inserted.");
        }
        Commands::AddTask {
            name,
            client,
            status,
            length,
            start,
            end,
        } => {
            let today = Local::now().date_naive();
            let task = Task {
                id: None,
                name,
                client,
                status,
                length_days: length,
                start_date: start.unwrap_or(today),
                end_date: end.unwrap_or(today),
            };
            let id = gateway.insert(&task).await?;
            println!(
                "Task '{}' for client '{}' added successfully (id {id}).",
                task.name, task.client
            );
        }
        Commands::Tasks { json } => {
            let tasks = gateway.list_rows::<Task>().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print!("{}", report::tasks_section(&tasks)?);
            }
        }
        Commands::EditTask {
            id,
            name,
            client,
            status,
            start,
            end,
        } => {
            let mut task: Task = load(&gateway, id).await?;
            if let Some(name) = name {
                task.name = name;
            }
            if let Some(client) = client {
                task.client = client;
            }
            if let Some(status) = status {
                task.status = status;
            }
            task.start_date = start.unwrap_or(task.start_date);
            task.end_date = end.unwrap_or(task.end_date);
            task.length_days = aggregate::recompute_length(task.start_date, task.end_date);

            gateway.update(id, &task).await?;
            println!("Task {id} updated ({} days).", task.length_days);
        }
        Commands::DeleteTask { id } => {
            gateway.delete::<Task>(id).await?;
            println!("Task {id} deleted.");
        }
        Commands::Calendar { month } => {
            let Some((window_start, window_end)) = aggregate::parse_month(&month) else {
                bail!("month must be formatted as YYYY-MM, got `{month}`");
            };
            let tasks = gateway.list_rows::<Task>().await?;
            let active = aggregate::filter_overlapping(&tasks, window_start, window_end);
            let section = report::calendar_section(window_start, window_end, &active);
            print!("{section}");
        }
        Commands::AddFinances(fields) => {
            let id = gateway.insert(&fields.into_snapshot()).await?;
            println!("Financial data updated successfully (snapshot {id}).");
        }
        Commands::Finances { json } => {
            let latest = gateway.latest::<FinancialSnapshot>().await?;
            if json {
                let series = aggregate::melt_latest_snapshot(
                    latest.as_ref(),
                    FinancialSnapshot::id_field(),
                );
                let body = serde_json::json!({ "latest": latest, "series": series });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!("{}", report::finances_section(latest.as_ref()));
            }
        }
        Commands::EditFinances { id, fields } => {
            let mut snapshot: FinancialSnapshot = load(&gateway, id).await?;
            fields.apply_to(&mut snapshot);
            gateway.update(id, &snapshot).await?;
            println!("Financial snapshot {id} updated.");
        }
        Commands::AddLeads(fields) => {
            let id = gateway.insert(&fields.into_snapshot()).await?;
            println!("Leads data updated successfully (snapshot {id}).");
        }
        Commands::Leads { json } => {
            let latest = gateway.latest::<LeadSnapshot>().await?;
            if json {
                let series = aggregate::melt_latest_snapshot(
                    latest.as_ref(),
                    LeadSnapshot::id_field(),
                );
                let body = serde_json::json!({ "latest": latest, "series": series });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!("{}", report::leads_section(latest.as_ref()));
            }
        }
        Commands::EditLeads { id, fields } => {
            let mut snapshot: LeadSnapshot = load(&gateway, id).await?;
            fields.apply_to(&mut snapshot);
            gateway.update(id, &snapshot).await?;
            println!("Lead snapshot {id} updated.");
        }
        Commands::Overview { out } => {
            let tasks = gateway.list_rows::<Task>().await?;
            let finances = gateway.latest::<FinancialSnapshot>().await?;
            let leads = gateway.latest::<LeadSnapshot>().await?;
            let overview = report::build_overview(
                Local::now().date_naive(),
                &tasks,
                finances.as_ref(),
                leads.as_ref(),
            )?;

            match out {
                Some(path) => {
                    std::fs::write(&path, overview)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Overview written to {}.", path.display());
                }
                None => print!("{overview}"),
            }
        }
        Commands::ImportTasks { csv } => {
            let inserted = db::import_csv(&gateway, &csv)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!("Inserted {inserted} tasks from {}.", csv.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_task_form() {
        let cli = Cli::try_parse_from([
            "ceo-dashboard",
            "--db",
            "dash.db",
            "add-task",
            "--name",
            "Logo concepts",
            "--client",
            "Harbor Coffee",
            "--status",
            "in-progress",
            "--start",
            "2024-01-10",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("dash.db")));
        match cli.command {
            Commands::AddTask {
                status,
                length,
                start,
                end,
                ..
            } => {
                assert_eq!(status, TaskStatus::InProgress);
                assert_eq!(length, 0);
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 10));
                assert_eq!(end, None);
            }
            _ => panic!("expected add-task"),
        }
    }

    #[test]
    fn cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from([
            "ceo-dashboard",
            "add-task",
            "--name",
            "x",
            "--client",
            "y",
            "--status",
            "blocked",
        ])
        .is_err());
    }

    #[test]
    fn amounts_must_be_finite() {
        for bad in ["inf", "-inf", "NaN", "infinity"] {
            let parsed = Cli::try_parse_from([
                "ceo-dashboard",
                "add-finances",
                "--current-balance",
                bad,
            ]);
            assert!(parsed.is_err(), "{bad} should be rejected");
        }

        let parsed = Cli::try_parse_from([
            "ceo-dashboard",
            "add-leads",
            "--invoices-issued-leads",
            "NaN",
        ]);
        assert!(parsed.is_err());

        assert_eq!(parse_amount("1234.5"), Ok(1234.5));
        assert_eq!(parse_amount(" 0 "), Ok(0.0));
        assert!(parse_amount("ten").is_err());
    }

    #[test]
    fn finance_edits_only_touch_given_fields() {
        let mut snapshot = FinanceFields {
            current_balance: Some(500.0),
            ..FinanceFields::default()
        }
        .into_snapshot();
        assert_eq!(snapshot.current_balance, 500.0);
        assert_eq!(snapshot.invoices_issued_ytd, 0.0);

        FinanceFields {
            invoices_issued_ytd: Some(75.25),
            ..FinanceFields::default()
        }
        .apply_to(&mut snapshot);
        assert_eq!(snapshot.current_balance, 500.0);
        assert_eq!(snapshot.invoices_issued_ytd, 75.25);
    }

    #[test]
    fn lead_edits_only_touch_given_fields() {
        let mut snapshot = LeadFields {
            web_leads: Some(4),
            ..LeadFields::default()
        }
        .into_snapshot();

        LeadFields {
            invoices_issued_leads: Some(1200.0),
            linkedin_leads: Some(9),
            ..LeadFields::default()
        }
        .apply_to(&mut snapshot);

        assert_eq!(snapshot.web_leads, 4);
        assert_eq!(snapshot.linkedin_leads, 9);
        assert_eq!(snapshot.invoices_issued_leads, 1200.0);
    }
}
