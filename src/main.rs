use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use msgdb::Database;
use msgdb::config::{Config, LoggingConfig};
use msgdb::mail::{MsgFlags, parse_header};

/// Install the subscriber. Logs are appended to the configured file, or go to
/// stderr when that can't be opened.
fn setup_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .with_context(|| format!("Invalid log filter: {}", logging.filter))?;
    let registry = tracing_subscriber::registry().with(filter);

    let opened = logging.log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(file)
    });

    match opened {
        Ok(file) => registry
            .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            .init(),
        Err(e) => {
            registry.with(fmt::layer().with_writer(std::io::stderr)).init();
            tracing::warn!("Logging to stderr, log file unavailable: {:#}", e);
        }
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"msgdb - Per-folder message metadata database

Usage: msgdb <command> [args]

Commands:
    info <db>               Show folder counters and summary state
    threads <db>            List threads, newest first
    import <db> <file>...   Add headers parsed from raw message files
    purge <db>              Apply the configured retention settings
    init-config             Write a default configuration file
    help                    Show this help message

Configuration file: ~/.config/msgdb/config.toml
"#
    );
}

fn db_arg(args: &[String]) -> Result<PathBuf> {
    args.get(2)
        .map(PathBuf::from)
        .context("Missing database path")
}

async fn open_db(config: &Config, path: &Path, create: bool) -> Result<Database> {
    let options = config.open_options(create, false);
    Database::open_with(path, options)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))
}

async fn run_info(config: &Config, path: &Path) -> Result<()> {
    let mut db = open_db(config, path, false).await?;
    let info = db.folder_info().clone();

    println!("Database:       {}", path.display());
    println!("Messages:       {}", info.num_messages);
    println!("Unread:         {}", info.num_unread);
    println!("Threads:        {}", db.num_threads());
    println!("Highest key:    {}", info.high_water);
    println!("Expunged bytes: {}", info.expunged_bytes);
    println!("Summary valid:  {}", info.summary_valid);
    if let Some(date) = info.folder_date_time() {
        println!("Folder date:    {}", date.format("%Y-%m-%d %H:%M"));
    }

    if db.sync_counts()? {
        println!("(counters were out of sync and have been corrected)");
    }
    db.close(true).await?;
    Ok(())
}

async fn run_threads(config: &Config, path: &Path) -> Result<()> {
    let db = open_db(config, path, false).await?;

    for thread in db.threads() {
        let date = thread
            .newest_date_time()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "{:>8}  {:>3} msgs  {:>3} unread  {}  {}",
            thread.id,
            thread.num_children(),
            thread.num_unread,
            date,
            thread.subject
        );
    }
    db.close(false).await?;
    Ok(())
}

async fn run_import(config: &Config, path: &Path, files: &[String]) -> Result<()> {
    let mut db = open_db(config, path, true).await?;
    let mut added = 0usize;
    let mut skipped = 0usize;

    for file in files {
        let raw = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file))?;
        let Some(header) = parse_header(&raw, MsgFlags::NEW) else {
            tracing::warn!("Could not parse {}, skipping", file);
            skipped += 1;
            continue;
        };

        if !header.message_id.is_empty()
            && db.get_msg_hdr_for_message_id(&header.message_id)?.is_some()
        {
            tracing::debug!("Message {} already present", header.message_id);
            skipped += 1;
            continue;
        }

        let hdr = db.add_header(header)?;
        tracing::debug!("Imported {} as key {}", file, hdr.key());
        added += 1;
    }

    db.close(true).await?;
    println!("Imported {} messages ({} skipped)", added, skipped);
    Ok(())
}

async fn run_purge(config: &Config, path: &Path) -> Result<()> {
    let mut db = open_db(config, path, false).await?;
    let settings = db.retention_settings();
    let report = db.apply_retention_settings(&settings)?;
    db.close(true).await?;

    if report.is_empty() {
        println!("Nothing to purge.");
    } else {
        println!(
            "Removed {} headers ({} bytes), cleared {} offline bodies",
            report.removed.len(),
            report.bytes_removed,
            report.bodies_cleared.len()
        );
    }
    Ok(())
}

fn run_init_config() -> Result<()> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        println!("Configuration already exists at {}", config_path.display());
        return Ok(());
    }
    let path = Config::default().save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }
        Some("init-config") => run_init_config(),
        Some(cmd @ ("info" | "threads" | "import" | "purge")) => {
            let config = Config::load()?;
            setup_logging(&config.logging)?;
            let path = db_arg(&args)?;

            match cmd {
                "info" => run_info(&config, &path).await,
                "threads" => run_threads(&config, &path).await,
                "import" => {
                    let files = args.get(3..).unwrap_or_default();
                    if files.is_empty() {
                        anyhow::bail!("No message files given");
                    }
                    run_import(&config, &path, files).await
                }
                _ => run_purge(&config, &path).await,
            }
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }
}
