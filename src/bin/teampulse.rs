use clap::{Args, Parser, Subcommand};

use teampulse::metrics::types::{ProjectTimeSummary, TaskTimeSummary};
use teampulse::{AnalyticsFilter, Period, ReportContext, TeamPulse};

#[derive(Parser)]
#[command(name = "teampulse", about = "Productivity and team analytics over a local record store")]
struct Cli {
    /// Database path (default: ~/.teampulse/teampulse.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl teampulse::ImportProgress for StderrProgress {
    fn on_section_start(&self, section: teampulse::Section, total: usize) {
        eprint!("  Importing {section}: {total}...");
    }

    fn on_section_complete(&self, _section: teampulse::Section, _written: usize) {
        eprintln!(" done");
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import users, projects, tasks and time entries from a JSON file
    Import {
        /// Path to the dataset
        file: String,
    },
    /// Compute a report
    Report {
        #[command(subcommand)]
        target: ReportTarget,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show record counts and the last import
    Status,
}

#[derive(Subcommand)]
enum ReportTarget {
    /// Task completion, punctuality and 14-day trends
    Productivity(ReportArgs),
    /// Logged hours by task and by project
    Time(ReportArgs),
    /// Velocity, burndown and member contributions (needs a date range)
    Team(ReportArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// Filter by user id (ignored by the team report)
    #[arg(long)]
    user: Option<String>,
    /// Filter by project id
    #[arg(long)]
    project: Option<String>,
    /// First day (YYYY-MM-DD)
    #[arg(long, conflicts_with = "period")]
    start: Option<String>,
    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long, conflicts_with = "period")]
    end: Option<String>,
    /// Named period: 2025, 2025-Q1, 2025-03, 2025-W05, 30d, ytd, qtd, mtd, A..B
    #[arg(long)]
    period: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    fn filter(&self, ctx: &ReportContext) -> anyhow::Result<AnalyticsFilter> {
        let mut filter = AnalyticsFilter::new();
        if let Some(ref user) = self.user {
            filter = filter.user(user);
        }
        if let Some(ref project) = self.project {
            filter = filter.project(project);
        }
        if let Some(ref period) = self.period {
            let (start, end) = Period::parse(period, ctx.today())?.date_range()?;
            return Ok(filter.between(start, end));
        }
        if let Some(ref start) = self.start {
            filter = filter.start(teampulse::date_util::parse_date(start)?);
        }
        if let Some(ref end) = self.end {
            filter = filter.end(teampulse::date_util::parse_date(end)?);
        }
        Ok(filter)
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value (done_statuses, utc_offset, ...)
    Set { key: String, value: String },
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

    let db = match &cli.db {
        Some(path) => teampulse::Database::open_at(path).await?,
        None => teampulse::Database::open().await?,
    };
    let tp = TeamPulse::new(db);

    match cli.command {
        Commands::Import { file } => {
            eprintln!("Importing {file}");
            let report = tp.import_file(&file, &StderrProgress).await?;
            print_import_report(&report);
        }
        Commands::Report { target } => {
            handle_report(&tp, target).await?;
        }
        Commands::Config { action } => {
            handle_config(&tp, action).await?;
        }
        Commands::Status => {
            print_status(&tp).await?;
        }
    }

    Ok(())
}

async fn handle_report(tp: &TeamPulse, target: ReportTarget) -> anyhow::Result<()> {
    let ctx = tp.report_context().await?;
    match target {
        ReportTarget::Productivity(args) => {
            let m = tp.productivity(&args.filter(&ctx)?, &ctx).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&m)?);
                return Ok(());
            }
            println!("Productivity");
            println!("  Tasks:       {}/{} completed ({}%)", m.completed_tasks, m.total_tasks, m.productivity_score);
            println!("  On time:     {}%", m.on_time_completion_rate);
            println!("  Overdue:     {}", m.overdue_tasks);
            println!("  Estimates:   {}% accurate", m.time_estimate_accuracy);
            println!(
                "  Priorities:  high {} / medium {} / low {}",
                m.priority_distribution.high, m.priority_distribution.medium, m.priority_distribution.low
            );
            println!("  Last 14 days (created/completed):");
            for day in &m.daily_trends {
                println!("    {}  {:>3} {:>3}", day.date, day.created, day.completed);
            }
        }
        ReportTarget::Time(args) => {
            let m = tp.time_tracking(&args.filter(&ctx)?, &ctx).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&m)?);
                return Ok(());
            }
            println!("Time Tracking");
            println!("  Total:         {:.2} h", m.total_hours);
            println!("  Daily average: {:.2} h", m.daily_average);
            print_by_task(&m.by_task);
            print_by_project(&m.by_project);
        }
        ReportTarget::Team(args) => {
            let m = tp.team_performance(&args.filter(&ctx)?, &ctx).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&m)?);
                return Ok(());
            }
            println!("Team Performance");
            println!("  Velocity:   {:.2} tasks/day", m.team_velocity);
            println!(
                "  Completion: {}/{} ({}%)",
                m.completion_rates.completed, m.completion_rates.total, m.completion_rates.percentage
            );
            println!("  Burndown (ideal/actual/remaining):");
            for p in &m.burndown {
                println!("    {}  {:>4} {:>4} {:>4}", p.date, p.ideal, p.actual, p.tasks_remaining);
            }
            println!("  Contributions:");
            if m.individual_contributions.is_empty() {
                println!("    No time logged");
            }
            for c in &m.individual_contributions {
                println!(
                    "    {:<24} {:>7.2} h {:>3} done {:>6.2}%",
                    c.user_name, c.hours_logged, c.tasks_completed, c.contribution_percentage
                );
            }
        }
    }
    Ok(())
}

fn print_by_task(groups: &[TaskTimeSummary]) {
    println!("  By task:");
    for g in groups {
        println!("    {:<32} {:>7.2} h ({} entries)", g.task_name, g.total_hours, g.entries.len());
    }
}

fn print_by_project(groups: &[ProjectTimeSummary]) {
    println!("  By project:");
    for g in groups {
        println!("    {:<32} {:>7.2} h", g.project_name, g.total_hours);
        for t in &g.tasks {
            println!("      {:<30} {:>7.2} h", t.task_name, t.total_hours);
        }
    }
}

async fn print_status(tp: &TeamPulse) -> anyhow::Result<()> {
    let s = tp.status().await?;
    println!("Store Status");
    println!("  Users:        {}", s.users);
    println!("  Projects:     {}", s.projects);
    println!("  Tasks:        {}", s.tasks);
    println!("  Time entries: {}", s.time_entries);
    match s.last_import {
        Some(job) => println!(
            "  Last import:  {} ({}, {} items, {})",
            job.source,
            job.status,
            job.imported_items,
            job.completed_at.unwrap_or(job.started_at)
        ),
        None => println!("  Last import:  never"),
    }
    Ok(())
}

async fn handle_config(tp: &TeamPulse, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match tp.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            tp.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = tp.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

fn print_import_report(report: &teampulse::ImportReport) {
    println!("Import: {}", report.source);
    println!("  Users:        {}", report.users);
    println!("  Projects:     {}", report.projects);
    println!("  Tasks:        {}", report.tasks);
    println!("  Time entries: {}", report.time_entries);
}
