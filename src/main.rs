use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use gleaner::config::Config;
use gleaner::feed::Fetcher;
use gleaner::ingest::Scheduler;
use gleaner::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "gleaner", version, about = "Periodically collect RSS feeds into SQLite")]
struct Args {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, value_name = "FILE", default_value = "gleaner.toml", global = true)]
    config: PathBuf,

    /// Database file, overriding the config file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector until interrupted
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Feeds fetched concurrently per cycle
        #[arg(long, value_name = "N")]
        batch_size: Option<u32>,

        /// Seconds between cycle starts
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,
    },
    /// Register a feed to be collected
    AddFeed {
        url: String,

        #[arg(long)]
        name: String,

        /// Owning user, created if missing
        #[arg(long, default_value = "local")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gleaner=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(path) = args.database {
        config.database_path = path;
    }

    let db_path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?
        .to_string();
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {db_path}"))?;

    match args.command {
        Command::AddFeed { url, name, user } => add_feed(&db, &url, &name, &user).await,
        Command::Run {
            once,
            batch_size,
            interval_secs,
        } => {
            if let Some(n) = batch_size {
                config.batch_size = n;
            }
            if let Some(secs) = interval_secs {
                config.interval_secs = secs;
            }
            run(db, &config, once).await
        }
    }
}

async fn add_feed(db: &Database, url: &str, name: &str, user: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid feed URL: {url}"))?;

    let owner = db
        .get_or_create_user(user)
        .await
        .context("Failed to resolve user")?;
    let feed = db
        .insert_feed(name, url, owner.id)
        .await
        .with_context(|| format!("Failed to add feed {url} (already registered?)"))?;

    tracing::info!(feed_id = %feed.id, url = %feed.url, user = %owner.name, "Feed added");
    println!("Added feed {} ({})", feed.name, feed.id);
    Ok(())
}

async fn run(db: Database, config: &Config, once: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let fetcher = Fetcher::new(
        config.request_timeout(),
        config.max_feed_bytes,
        &config.user_agent,
    )
    .context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(
        Arc::new(db),
        fetcher,
        config.batch_size()?,
        config.interval(),
    )
    .context("Invalid scheduler settings")?;

    if once {
        let report = scheduler.run_cycle().await;
        if report.selection_failed {
            anyhow::bail!("Failed to select feeds");
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            // Keep the sender alive; dropping it would stop the scheduler
            tracing::error!(error = %e, "Failed to listen for shutdown signals");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested, finishing current batch");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
