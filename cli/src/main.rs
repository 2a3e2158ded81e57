use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use jobhound::config::{self, Config};
use jobhound::db::vacancy_repo::VacancyFilter;
use jobhound::db::{
    self, email_repo, evaluation_repo, post_repo, resume_repo, telegram_repo, vacancy_repo,
    Database,
};
use jobhound::pipeline::{Pipeline, RunReport};
use jobhound::scrape::{EmptySource, LinkedInScraper};
use jobhound::secrets::{self, CookieCipher};

#[derive(Parser)]
#[command(
    name = "jobhound",
    version,
    about = "Scrapes job postings, rates them against your profile, and sends tailored applications"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once: scrape, triage, evaluate, apply.
    Run {
        /// Config file (defaults to the platform config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip scraping and work through already-stored posts only.
        #[arg(long)]
        skip_scrape: bool,
    },
    /// Show stored counts and the latest vacancies.
    Status {
        /// Config file (defaults to the platform config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How many recent vacancies to list.
        #[arg(short, long, default_value_t = 10)]
        limit: u64,
    },
    /// Write a starter config file.
    Init {
        /// Target path (defaults to the platform config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            config,
            skip_scrape,
        } => cmd_run(config, skip_scrape).await,
        Command::Status { config, limit } => cmd_status(config, limit),
        Command::Init { config, force } => cmd_init(config, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Routes `log` records from the database layer into the same subscriber
/// the `tracing` macros use.
fn init_tracing() {
    if let Err(err) = tracing_log::LogTracer::init() {
        eprintln!("failed to initialize log bridge: {err}");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to initialize tracing: {err}");
    }
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf, jobhound::ConfigError> {
    match explicit {
        Some(path) => Ok(path),
        None => config::default_config_path(),
    }
}

async fn cmd_run(config: Option<PathBuf>, skip_scrape: bool) -> CliResult {
    let path = config_path(config)?;
    let config = config::load_config(&path)?;
    info!(path = %path.display(), "configuration loaded");

    let db = open_db(&config)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    ctrlc::set_handler(move || {
        eprintln!("stop requested, finishing the current item");
        stop_flag.store(true, Ordering::Relaxed);
    })?;

    let pipeline = Pipeline::from_config(&config, db, stop)?;

    let report = if skip_scrape {
        info!("scrape skipped, processing stored posts only");
        pipeline.run(&EmptySource).await?
    } else {
        let Some(scraper_config) = config.scraper.clone() else {
            return Err(
                "no `scraper` section in the config; use --skip-scrape to process stored posts"
                    .into(),
            );
        };
        let cipher = match CookieCipher::from_env() {
            Ok(cipher) => Some(cipher),
            Err(err) => {
                warn!(error = %err, "cookie jar will not be restored or saved");
                None
            }
        };
        let scraper = LinkedInScraper::new(scraper_config, cipher);
        pipeline.run(&scraper).await?
    };

    print_report(&report)?;
    Ok(())
}

fn cmd_status(config: Option<PathBuf>, limit: u64) -> CliResult {
    let path = config_path(config)?;
    let config = config::load_config(&path)?;
    let db = open_db(&config)?;

    let posts = post_repo::count_active(&db)?;
    let vacancies_queued = vacancy_repo::count_by_processed(&db, false)?;
    let vacancies_done = vacancy_repo::count_by_processed(&db, true)?;
    let resumes = resume_repo::count(&db)?;
    let emails_sent = email_repo::count_sent(&db)?;
    let telegram_sent = telegram_repo::count_by_status(&db, telegram_repo::STATUS_SENT)?;
    let telegram_pending = telegram_repo::count_by_status(&db, telegram_repo::STATUS_PENDING)?;

    println!("Posts stored:        {posts}");
    println!("Vacancies queued:    {vacancies_queued}");
    println!("Vacancies processed: {vacancies_done}");
    println!("Resumes generated:   {resumes}");
    println!("Emails sent:         {emails_sent}");
    println!("Telegram sent:       {telegram_sent} (pending: {telegram_pending})");

    let filter = VacancyFilter {
        limit: Some(limit),
        ..Default::default()
    };
    let (vacancies, total) = vacancy_repo::query(&db, &filter)?;
    if vacancies.is_empty() {
        println!("\nNo vacancies stored yet.");
        return Ok(());
    }

    println!("\nLatest vacancies ({} of {total}):", vacancies.len());
    for vacancy in &vacancies {
        let rating = evaluation_repo::find_by_vacancy(&db, &vacancy.id)?
            .map(|e| e.rating.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{rating:>3}] {} @ {} ({})",
            vacancy.title,
            vacancy.company.as_deref().unwrap_or("unknown"),
            vacancy.created_at
        );
    }
    Ok(())
}

fn cmd_init(config: Option<PathBuf>, force: bool) -> CliResult {
    let path = config_path(config)?;
    if path.exists() && !force {
        return Err(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, config::DEFAULT_CONFIG_TEMPLATE)?;

    println!("Wrote starter config to {}", path.display());
    println!("Fill in the candidate profile and the LLM section before the first run.");
    Ok(())
}

fn open_db(config: &Config) -> Result<Database, Box<dyn std::error::Error>> {
    let path = match &config.database_path {
        Some(p) => PathBuf::from(secrets::expand_home(p)),
        None => db::default_database_path().ok_or("could not determine a database path")?,
    };
    Ok(Database::open(&path)?)
}

fn print_report(report: &RunReport) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
