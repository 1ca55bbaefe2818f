use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use work_allocation::completion::AxisProgress;
use work_allocation::config::{PolicySource, Settings};
use work_allocation::models::{MemberChange, Status};
use work_allocation::notify::PgNotifier;
use work_allocation::report::{self, ReportFilter};
use work_allocation::rework::ReworkOrder;
use work_allocation::scope::Scope;
use work_allocation::store::PgStore;
use work_allocation::Engine;

#[derive(Parser)]
#[command(name = "work-allocation")]
#[command(about = "Work allocation, completion tracking and scoring", long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error); RUST_LOG is used when unset
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Allocation and completion for a project
    Stats {
        #[arg(long)]
        project: Uuid,
    },
    /// Allocation and completion inside one group assignment
    GroupStats {
        #[arg(long)]
        group: Uuid,
    },
    /// Put a project on hold, or resume it
    Hold {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        resume: bool,
    },
    /// Re-issue defective scope as a rework project
    Rework {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        team: Uuid,
        /// Scope tree as JSON, e.g. '[{"division":"Civil","parts":[{"name":"P1","workTypes":["QC"]}]}]'
        #[arg(long)]
        scope: String,
        /// Deadline in RFC 3339
        #[arg(long)]
        eta: DateTime<Utc>,
        #[arg(long, default_value = "")]
        file_size: String,
    },
    /// Accept submitted member work and score it
    Acknowledge {
        #[arg(long)]
        member_assignment: Uuid,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        override_blackmark: bool,
    },
    /// Team standings, or member standings within a team
    Standings {
        #[arg(long)]
        team: Option<Uuid>,
    },
    /// Active projects, recent completions and open work per team
    Overview,
    /// Score trends and workload for one member
    Activity {
        #[arg(long)]
        member: Uuid,
    },
    /// Member assignments handed out between two dates (inclusive)
    Report {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        team: Option<Uuid>,
        #[arg(long)]
        member: Option<Uuid>,
    },
    /// Inspect or change scoring policy
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: f64 },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn axis_line(label: &str, axis: &[AxisProgress]) -> String {
    let items: Vec<String> = axis
        .iter()
        .map(|a| {
            let mark = if a.completed {
                "done"
            } else if a.allocated {
                "allocated"
            } else {
                "open"
            };
            format!("{} ({mark})", a.name)
        })
        .collect();
    format!("{label}: {}", items.join(", "))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let settings = Settings::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let engine = Engine::new(
        store.clone(),
        store.clone(),
        Arc::new(PgNotifier::new(pool)),
    );

    match cli.command {
        Commands::InitDb => {
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store.seed().await?;
            println!("Seed data inserted.");
        }
        Commands::Stats { project } => {
            let stats = engine.compute_project_stats(project).await?;
            println!(
                "Project {}: {}% allocated, {}% complete ({} of {} units done)",
                stats.project_id,
                stats.summary.allocation_percent,
                stats.summary.completion_percent,
                stats.summary.completed,
                stats.summary.total
            );
            println!("{}", axis_line("Divisions", &stats.divisions));
            println!("{}", axis_line("Parts", &stats.part_nos));
            println!("{}", axis_line("Work types", &stats.work_types));
        }
        Commands::GroupStats { group } => {
            let stats = engine.compute_group_stats(group).await?;
            println!(
                "Group {}: {}% allocated, {}% complete",
                stats.group_assignment_id,
                stats.summary.allocation_percent,
                stats.summary.completion_percent
            );
            if stats.missing.is_empty() {
                println!("Nothing missing.");
            } else {
                println!("Missing:");
                for unit in &stats.missing {
                    println!("- {unit}");
                }
            }
        }
        Commands::Hold { project, resume } => {
            let outcome = engine.toggle_hold(project, !resume).await?;
            println!(
                "Project {} is {}; {} assignments extended by {} minutes.",
                outcome.project_id,
                outcome.status,
                outcome.extended_assignments,
                outcome.extended_minutes
            );
        }
        Commands::Rework {
            project,
            team,
            scope,
            eta,
            file_size,
        } => {
            let scope: Scope =
                serde_json::from_str(&scope).context("scope must be a JSON scope tree")?;
            let outcome = engine
                .trigger_rework(ReworkOrder {
                    project_id: project,
                    team_id: team,
                    scope,
                    assigned_time: Utc::now(),
                    eta,
                    file_size,
                })
                .await?;
            println!(
                "Rework project {} created with assignment {}; {} members penalized.",
                outcome.new_project_id,
                outcome.assignment_id,
                outcome.penalized.len()
            );
        }
        Commands::Acknowledge {
            member_assignment,
            rating,
            override_blackmark,
        } => {
            let member = engine
                .update_member_assignment(
                    member_assignment,
                    MemberChange {
                        status: Some(Status::Completed),
                        rating: Some(rating),
                        override_blackmark,
                        ..MemberChange::default()
                    },
                )
                .await?;
            println!(
                "Accepted {}: +{} points, {} blackmarks.",
                member.id, member.bonus_awarded, member.blackmarks_awarded
            );
        }
        Commands::Standings { team } => match team {
            Some(team_id) => {
                let standings = engine.member_standings(Some(team_id)).await?;
                print!("{}", report::render_member_standings(&standings));
            }
            None => {
                let standings = engine.team_standings().await?;
                print!("{}", report::render_team_standings(&standings));
            }
        },
        Commands::Overview => {
            let overview = engine.overview().await?;
            print!("{}", report::render_overview(&overview));
        }
        Commands::Activity { member } => {
            let activity = engine.member_activity(member).await?;
            print!("{}", report::render_member_activity(&activity));
        }
        Commands::Report {
            from,
            to,
            team,
            member,
        } => {
            let from = from
                .and_hms_opt(0, 0, 0)
                .context("invalid start date")?
                .and_utc();
            let to = to
                .and_hms_opt(23, 59, 59)
                .context("invalid end date")?
                .and_utc();
            let rows = engine
                .assignment_report(ReportFilter {
                    from,
                    to,
                    team_id: team,
                    member_id: member,
                })
                .await?;
            print!("{}", report::render_assignment_report(&rows));
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let policy = store.policy().await?;
                for (key, value) in policy.entries() {
                    println!("{key} = {value}");
                }
            }
            ConfigAction::Set { key, value } => {
                store.set_policy_value(&key, value).await?;
                println!("{key} set to {value}.");
            }
        },
    }

    Ok(())
}
