use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use syncr::config::{self, Config};
use syncr::db;
use syncr::engine::SyncEngine;
use syncr::flickr::FlickrClient;
use syncr::model::SyncReport;
use syncr::source::Source;
use syncr::twitter::TwitterClient;

#[derive(Debug, Parser)]
#[command(author, version, about = "Pull photos and tweets into a local SQLite store")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Remote service to sync from
    #[arg(long, value_enum, default_value = "flickr")]
    service: ServiceArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServiceArg {
    Flickr,
    Twitter,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync a single item by its remote id
    One {
        id: String,
        /// Re-fetch and replace the item if it is already stored
        #[arg(long)]
        refresh: bool,
    },
    /// Sync everything an owner published
    All { handle: String },
    /// Sync what an owner published in the last N days
    Recent {
        handle: String,
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Sync an owner's favorites
    Favorites { handle: String },
    /// Sync one collection (photo set or list)
    Collection { id: String },
    /// Sync every collection an owner has
    Collections { handle: String },
    /// Print an example configuration file
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ExampleConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    match args.service {
        ServiceArg::Flickr => {
            let client = FlickrClient::from_config(cfg.flickr()?)?;
            run(engine(&cfg, pool, client), args.command).await
        }
        ServiceArg::Twitter => {
            let client = TwitterClient::from_config(cfg.twitter()?)?;
            run(engine(&cfg, pool, client), args.command).await
        }
    }
}

fn engine<S: Source>(cfg: &Config, pool: db::Pool, source: S) -> SyncEngine<S> {
    SyncEngine::new(pool, source)
        .with_page_size(cfg.sync.page_size)
        .with_retry(cfg.retry_policy())
}

async fn run<S: Source>(engine: SyncEngine<S>, command: Command) -> Result<()> {
    let service = engine.source().service();
    let report = match command {
        Command::One { id, refresh } => {
            let (record, outcome) = engine
                .sync_one(&id, refresh)
                .await
                .with_context(|| format!("failed to sync {service} item {id}"))?;
            info!(id = record.id, remote_id = %record.remote_id, ?outcome, "done");
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(());
        }
        Command::All { handle } => engine.sync_all_for_owner(&handle).await,
        Command::Recent { handle, days } => engine.sync_recent_for_owner(&handle, days).await,
        Command::Favorites { handle } => engine.sync_favorites(&handle).await,
        Command::Collection { id } => engine.sync_collection(&id).await,
        Command::Collections { handle } => engine.sync_all_collections_for_owner(&handle).await,
        Command::ExampleConfig => return Ok(()),
    }
    .with_context(|| format!("{service} sync failed"))?;

    print_report(&report)
}

fn print_report(report: &SyncReport) -> Result<()> {
    info!(
        pages = report.pages,
        created = report.created,
        unchanged = report.unchanged,
        replaced = report.replaced,
        skipped = report.skipped,
        "sync complete"
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
