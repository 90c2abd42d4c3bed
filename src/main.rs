use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod analytics;
mod catalog;
mod db;
mod import;
mod models;
mod predictor;
mod report;
mod sample;
mod store;

use models::{RiskStatus, Student, Subject};
use store::{JsonRosterStore, RosterStore};

#[derive(Parser)]
#[command(name = "student-risk-insights")]
#[command(about = "Predict academic risk from student mark sheets and summarize the cohort", long_about = None)]
struct Cli {
    /// Keep the roster in a JSON file instead of Postgres
    #[arg(long, global = true, env = "RISK_ROSTER")]
    roster: Option<PathBuf>,
    /// Postgres connection string used when no roster file is given
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    /// JSON subject catalog replacing the built-in one
    #[arg(long, global = true, env = "RISK_CATALOG")]
    catalog: Option<PathBuf>,
    /// Seed for the prediction noise, for reproducible runs
    #[arg(long, global = true, env = "RISK_SEED")]
    seed: Option<u64>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a generated demo cohort with predictions
    Seed {
        #[arg(long, default_value_t = 70)]
        count: usize,
    },
    /// Write the mark sheet CSV template
    Template {
        #[arg(long, default_value = "student_marks_template.csv")]
        out: PathBuf,
    },
    /// Import a mark sheet, predict and store the students
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Validate and preview without storing
        #[arg(long)]
        dry_run: bool,
    },
    /// Recompute predictions for every stored student
    Predict,
    /// Print cohort analytics
    Analytics {
        #[arg(long)]
        json: bool,
    },
    /// List predictions, optionally filtered
    Results {
        /// Name or PIN fragment
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        risk: Option<RiskStatus>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one student's prediction and feedback
    Student {
        #[arg(long)]
        pin: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

enum Store {
    Json(JsonRosterStore),
    Postgres(db::PgRosterStore),
}

impl RosterStore for Store {
    async fn load_roster(&self) -> anyhow::Result<Vec<Student>> {
        match self {
            Store::Json(store) => store.load_roster().await,
            Store::Postgres(store) => store.load_roster().await,
        }
    }

    async fn save_roster(&self, students: &[Student]) -> anyhow::Result<()> {
        match self {
            Store::Json(store) => store.save_roster(students).await,
            Store::Postgres(store) => store.save_roster(students).await,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url = database_url
        .context("DATABASE_URL must be set to a Postgres instance (or pass --roster <file>)")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(cli: &Cli) -> anyhow::Result<Store> {
    if let Some(path) = &cli.roster {
        let store = JsonRosterStore::new(path);
        debug!(path = %store.path().display(), "using JSON roster store");
        return Ok(Store::Json(store));
    }

    let pool = connect(cli.database_url.as_deref()).await?;
    Ok(Store::Postgres(db::PgRosterStore::new(pool)))
}

fn load_subjects(cli: &Cli) -> anyhow::Result<Vec<Subject>> {
    match &cli.catalog {
        Some(path) => catalog::load_catalog(path),
        None => Ok(catalog::default_catalog()),
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let subjects = load_subjects(&cli)?;
    let mut rng = make_rng(cli.seed);

    match &cli.command {
        Commands::InitDb => {
            let pool = connect(cli.database_url.as_deref()).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { count } => {
            let store = open_store(&cli).await?;
            let mut students = sample::generate_students(*count, &subjects, &mut rng);
            predictor::predict_roster(&mut students, &subjects, &mut rng);
            store.save_roster(&students).await?;
            println!("Seeded {} students with predictions.", students.len());
        }
        Commands::Template { out } => {
            std::fs::write(out, import::csv_template(&subjects))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Template written to {}.", out.display());
        }
        Commands::Import { csv, dry_run } => {
            let file = std::fs::File::open(csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let outcome = import::parse_marksheet(file, &subjects)?;

            if !outcome.is_valid() {
                for error in &outcome.errors {
                    warn!("{error}");
                }
                anyhow::bail!(
                    "{} validation errors in {}; nothing was stored",
                    outcome.errors.len(),
                    csv.display()
                );
            }

            if *dry_run {
                println!("{} records ready for processing.", outcome.rows.len());
                for row in outcome.rows.iter().take(5) {
                    let scores: Vec<String> = row
                        .scores
                        .iter()
                        .map(|(_, [m1, m2, internal, end_sem])| format!("{m1}/{m2}/{internal}/{end_sem}"))
                        .collect();
                    println!("- row {}: {} {} {}", row.line, row.pin, row.name, scores.join(" "));
                }
                return Ok(());
            }

            let mut students: Vec<Student> = outcome
                .rows
                .into_iter()
                .map(import::ImportRow::into_student)
                .collect();
            predictor::predict_roster(&mut students, &subjects, &mut rng);

            let store = open_store(&cli).await?;
            store.save_roster(&students).await?;
            info!(students = students.len(), file = %csv.display(), "mark sheet imported");
            println!(
                "{} student records processed with predictions generated.",
                students.len()
            );
        }
        Commands::Predict => {
            let store = open_store(&cli).await?;
            let mut roster = store.load_roster().await?;
            predictor::predict_roster(&mut roster, &subjects, &mut rng);
            store.save_roster(&roster).await?;
            println!("Refreshed predictions for {} students.", roster.len());
        }
        Commands::Analytics { json } => {
            let store = open_store(&cli).await?;
            let roster = store.load_roster().await?;

            let Some(analytics) = analytics::summarize(&roster, &subjects) else {
                println!("No analytics available. Upload student data and generate predictions first.");
                return Ok(());
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
                return Ok(());
            }

            println!("Total students: {}", analytics.total_students);
            println!("At-risk students: {}", analytics.at_risk_students);
            println!("Average SGPA: {:.2}", analytics.average_sgpa);
            println!("Subject performance:");
            for performance in &analytics.subject_wise_performance {
                let code = catalog::find_subject(&subjects, &performance.subject_id)
                    .map(|subject| subject.code.as_str())
                    .unwrap_or(performance.subject_id.as_str());
                println!(
                    "- {code}: average {:.1}%, pass rate {:.1}%",
                    performance.average, performance.pass_rate
                );
            }
            println!("SGPA distribution:");
            for bucket in &analytics.sgpa_distribution {
                println!("- {}: {}", bucket.range, bucket.count);
            }
        }
        Commands::Results {
            search,
            risk,
            limit,
        } => {
            let store = open_store(&cli).await?;
            let roster = store.load_roster().await?;
            let matches = analytics::filter_students(&roster, search.as_deref(), *risk);

            if matches.is_empty() {
                println!("No students match these filters.");
                return Ok(());
            }

            let breakdown = models::RiskBreakdown::from_students(matches.iter().copied());
            println!(
                "{} students ({} high, {} medium, {} low risk):",
                matches.len(),
                breakdown.high,
                breakdown.medium,
                breakdown.low
            );
            for student in matches.iter().take(*limit) {
                match &student.prediction {
                    Some(prediction) => println!(
                        "- {} ({}) SGPA {:.2}, {} risk, confidence {:.0}%",
                        student.name,
                        student.pin,
                        prediction.expected_sgpa,
                        prediction.risk_status,
                        prediction.confidence * 100.0
                    ),
                    None => println!("- {} ({}) not predicted yet", student.name, student.pin),
                }
            }
        }
        Commands::Student { pin } => {
            let store = open_store(&cli).await?;
            let roster = store.load_roster().await?;
            let student = roster
                .iter()
                .find(|student| student.pin.eq_ignore_ascii_case(pin))
                .with_context(|| format!("no student with PIN {pin}"))?;
            print!("{}", report::student_card(student, &subjects));
        }
        Commands::Report { label, out } => {
            let store = open_store(&cli).await?;
            let roster = store.load_roster().await?;
            let report = report::build_report(label.as_deref(), &roster, &subjects);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
