use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use fitfusion::error::FitFusionError;
use fitfusion::insights::{context_for_snapshot, format_fixed, DailyInsights};
use fitfusion::{
    init_logging, AppConfig, GeminiClient, HealthAssistant, HealthSession, HealthSnapshot,
    InMemorySource, RefreshQuery, Topic, WorkoutRecord,
};

/// FitFusion - Personal Health Dashboard CLI
///
/// Aggregates a day of health records into metrics, workouts and weekly
/// totals, and asks a hosted model for advice grounded in that data.
#[derive(Parser)]
#[command(name = "fitfusion")]
#[command(author = "FitFusion Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Personal Health Dashboard CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON record export to read from
    #[arg(short, long, value_name = "FILE", global = true)]
    data: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the day's metrics and insights
    Summary {
        /// Day to summarize (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent workouts and the weekly totals
    Workouts {
        /// Reference day (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Number of workouts to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the context block sent to the assistant
    Context {
        /// Day to describe (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Ask the health assistant a question
    Ask {
        /// Question text
        question: Option<String>,

        /// Start from a topic (steps, walking distance, stair climbing, sleep, ...)
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Log water intake
    Water {
        /// Amount in milliliters
        #[arg(long, default_value = "250")]
        ml: f64,
    },

    /// Configure application settings
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        list: bool,

        /// Get a configuration value by dotted key
        #[arg(short, long)]
        get: Option<String>,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct WorkoutRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Workout")]
    name: String,
    #[tabled(rename = "Type")]
    workout_type: String,
    #[tabled(rename = "Minutes")]
    minutes: u32,
    #[tabled(rename = "kcal")]
    calories: u32,
    #[tabled(rename = "km")]
    distance: String,
}

impl From<&WorkoutRecord> for WorkoutRow {
    fn from(w: &WorkoutRecord) -> Self {
        WorkoutRow {
            date: w
                .start_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            name: w.name.clone(),
            workout_type: w.workout_type.clone(),
            minutes: w.duration_minutes,
            calories: w.calories_burned,
            distance: w
                .distance_km
                .map(|km| format_fixed(km, 2))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };
    let _log_guard = init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;

    let result = run(cli, config).await;
    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<FitFusionError>() {
            err.log("Command failed");
            if err.is_retryable() {
                eprintln!("{} This failure is temporary, try again shortly", "⚠".yellow());
            }
        }
    }
    result
}

async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    match cli.command {
        Commands::Summary { date, json } => {
            let snapshot = refresh(cli.data.as_deref(), &config, date).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
            } else {
                print_summary(&snapshot, &config);
            }
        }

        Commands::Workouts { date, limit } => {
            let snapshot = refresh(cli.data.as_deref(), &config, date).await?;
            let limit = limit.unwrap_or(config.fetch.recent_workout_limit);
            print_workouts(&snapshot, limit);
        }

        Commands::Context { date } => {
            let snapshot = refresh(cli.data.as_deref(), &config, date).await?;
            print!("{}", context_for_snapshot(&snapshot));
        }

        Commands::Ask { question, topic } => {
            let snapshot = match cli.data.as_deref() {
                Some(_) => Some(refresh(cli.data.as_deref(), &config, None).await?),
                None => None,
            };

            let question = match (question, topic) {
                (Some(q), _) => q,
                (None, Some(t)) => Topic::parse(&t).opening_question(snapshot.as_deref()),
                (None, None) => return Err(anyhow!("provide a question or --topic")),
            };

            let client = GeminiClient::new(&config.assistant).map_err(FitFusionError::from)?;
            let mut assistant = HealthAssistant::new(client, snapshot.is_some());

            println!("{} {}", "You:".cyan().bold(), question);
            match assistant.ask(&question, snapshot.as_deref()).await {
                Ok(reply) => println!("{} {}", "Assistant:".green().bold(), reply),
                Err(e) => {
                    eprintln!("{} {}", "Assistant:".red().bold(), e.user_message());
                    return Err(FitFusionError::from(e).into());
                }
            }
        }

        Commands::Water { ml } => {
            let path = data_path(cli.data.as_deref())?;
            let session = load_session(path, &config)?;

            session.log_water_intake(ml, Utc::now()).await?;
            session.source().save_json_file(path).await?;

            let report = session.refresh(RefreshQuery::today()).await;
            println!(
                "{} {} ml logged, {} of {} ml today",
                "✓".green(),
                format_fixed(ml, 0),
                format_fixed(report.snapshot.hydration_ml, 0),
                format_fixed(config.goals.water_ml, 0)
            );
        }

        Commands::Config { list, get, init } => {
            if init {
                match &cli.config {
                    Some(path) => config.save_to_file(path)?,
                    None => config.save_default()?,
                }
                println!("{}", "✓ Configuration written".green());
            } else if let Some(key) = get {
                match config.get_value(&key) {
                    Some(value) => println!("{} = {}", key, value),
                    None => return Err(anyhow!("unknown configuration key: {}", key)),
                }
            } else if list {
                print!("{}", toml::to_string_pretty(&config)?);
            } else {
                println!(
                    "Config file: {}",
                    cli.config
                        .unwrap_or_else(AppConfig::default_config_path)
                        .display()
                );
            }
        }
    }

    Ok(())
}

fn data_path(data: Option<&Path>) -> Result<&Path> {
    data.ok_or_else(|| anyhow!("no record export given (use --data FILE)"))
}

fn load_session(path: &Path, config: &AppConfig) -> Result<HealthSession<InMemorySource>> {
    let source = InMemorySource::from_json_file(path)
        .with_context(|| format!("Failed to load records from {}", path.display()))?;
    Ok(HealthSession::new(source, config))
}

/// Local "now", or the last second of a past day
fn reference_for(date: Option<NaiveDate>) -> DateTime<FixedOffset> {
    let now = Local::now();
    let now = now.with_timezone(now.offset());
    match date {
        Some(day) if day != now.date_naive() => {
            let end = day.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1);
            now.offset().from_local_datetime(&end).earliest().unwrap_or(now)
        }
        _ => now,
    }
}

async fn refresh(
    data: Option<&Path>,
    config: &AppConfig,
    date: Option<NaiveDate>,
) -> Result<std::sync::Arc<HealthSnapshot>> {
    let session = load_session(data_path(data)?, config)?;
    let report = session.refresh(RefreshQuery::day_of(reference_for(date))).await;

    for kind in &report.snapshot.failed_kinds {
        eprintln!("{} {} data unavailable, showing zero", "⚠".yellow(), kind);
    }
    Ok(report.snapshot)
}

fn print_summary(snapshot: &HealthSnapshot, config: &AppConfig) {
    let daily = &snapshot.daily;
    let insights = DailyInsights::from_snapshot(snapshot, &config.goals);
    let day = snapshot.window.start.with_timezone(&Local).format("%Y-%m-%d");

    println!("{}", format!("Daily summary for {}", day).blue().bold());
    println!(
        "  Steps:     {} ({}% of {})  {}",
        daily.steps, insights.steps_progress, config.goals.daily_steps, insights.estimated_calories
    );
    println!(
        "  Distance:  {} km",
        format_fixed(daily.distance_meters / 1000.0, 2)
    );
    println!("  Floors:    {}", daily.floors);
    println!("  Active:    {} kcal", daily.calories_burned);
    println!(
        "  Water:     {} ml ({}% of {} ml)",
        format_fixed(snapshot.hydration_ml, 0),
        insights.water_progress,
        format_fixed(config.goals.water_ml, 0)
    );

    println!("{}", "Sleep".cyan().bold());
    println!(
        "  {} h, quality {}, debt {} h",
        format_fixed(daily.sleep_hours, 1),
        insights.sleep_quality,
        format_fixed(insights.sleep_debt_hours, 1)
    );
    let stages = &daily.sleep_stages;
    let pct = &insights.stage_percentages;
    for (label, hours, share) in [
        ("REM", stages.rem, pct.rem),
        ("Deep", stages.deep, pct.deep),
        ("Light", stages.light, pct.light),
        ("Awake", stages.awake, pct.awake),
    ] {
        println!(
            "  {:<6} {} h ({}%)",
            label,
            format_fixed(hours, 1),
            format_fixed(share, 0)
        );
    }

    if snapshot.body.height_meters.is_some() || snapshot.body.weight_kg.is_some() {
        println!("{}", "Body".magenta().bold());
        if let Some(height) = snapshot.body.height_meters {
            println!("  Height: {} m", format_fixed(height, 2));
        }
        if let Some(weight) = snapshot.body.weight_kg {
            println!("  Weight: {} kg", format_fixed(weight, 1));
        }
        if let (Some(bmi), Some(category)) = (insights.bmi, insights.bmi_category) {
            println!("  BMI:    {} ({})", format_fixed(bmi, 1), category);
        }
    }

    let weekly = &snapshot.weekly;
    println!(
        "{} {} workouts, {} min, {} kcal",
        "This week:".yellow().bold(),
        weekly.total_workouts,
        weekly.total_minutes,
        weekly.total_calories
    );
}

fn print_workouts(snapshot: &HealthSnapshot, limit: usize) {
    if snapshot.workouts.is_empty() {
        println!("{}", "No workouts recorded".dimmed());
    } else {
        let rows: Vec<WorkoutRow> = snapshot
            .workouts
            .iter()
            .take(limit)
            .map(WorkoutRow::from)
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let weekly = &snapshot.weekly;
    println!(
        "{} {} workouts, {} min, {} kcal",
        "This week:".yellow().bold(),
        weekly.total_workouts,
        weekly.total_minutes,
        weekly.total_calories
    );
}
