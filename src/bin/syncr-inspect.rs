//! Read-only dump of what has been synced so far.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use syncr::config;
use syncr::db::{self, Relation};
use syncr::model::{RelationKind, Service};

#[derive(Parser, Debug)]
#[command(author, version, about = "Print stored records and relations as JSON")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// flickr or twitter
    #[arg(long, default_value = "flickr")]
    service: String,

    /// Maximum number of records to print
    #[arg(long, default_value_t = 20)]
    limit: i64,
}

#[derive(Serialize)]
struct RelationSummary {
    #[serde(flatten)]
    relation: Relation,
    members: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let service = Service::parse(&args.service)
        .ok_or_else(|| anyhow!("unknown service: {}", args.service))?;
    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let mut relations = Vec::new();
    for relation in db::list_relations(&pool, service).await? {
        let members = db::count_members(&pool, relation.id).await?;
        relations.push(RelationSummary { relation, members });
    }

    let out = json!({
        "service": service,
        "records_total": db::count_records(&pool, service).await?,
        "favorites": db::count_relations(&pool, service, RelationKind::Favorites).await?,
        "collections": db::count_relations(&pool, service, RelationKind::Collection).await?,
        "tags": db::count_relations(&pool, service, RelationKind::Tag).await?,
        "records": db::list_records(&pool, service, args.limit).await?,
        "relations": relations,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
