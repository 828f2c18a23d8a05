use std::io::Read;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pg_metrics_publisher::{
    config::{apply_env_password, read_config_file},
    plugin::{self, SNAP_JSON_CONTENT_TYPE, decode_batch},
    policy::publisher_policy,
    publisher::{PostgresPublisher, Publisher, connection_config, write_batch},
    storage::{MemoryStore, RowStore},
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Publish metric batches into a PostgreSQL table")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Publish a batch of metrics
    Publish {
        /// Config file (flat JSON map of options)
        #[arg(short)]
        file: String,

        /// Batch file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        batch: String,

        /// Content type of the batch
        #[arg(long, default_value = SNAP_JSON_CONTENT_TYPE)]
        content_type: String,

        /// Write into memory and print the rows instead of touching the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the plugin metadata
    Meta,

    /// Print the declared config policy
    Policy,
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("pg_metrics_publisher", level),
        ("pg_publish", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn read_batch(path: &str) -> anyhow::Result<Vec<u8>> {
    if path == "-" {
        let mut content = Vec::new();
        std::io::stdin().read_to_end(&mut content)?;
        Ok(content)
    } else {
        std::fs::read(path).with_context(|| format!("failed to read batch file {path}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    match args.command {
        Command::Publish {
            file,
            batch,
            content_type,
            dry_run,
        } => {
            let mut config = read_config_file(&file)?;
            apply_env_password(&mut config);
            let content = read_batch(&batch)?;

            if dry_run {
                dry_run_publish(&content_type, &content, &config).await?;
            } else {
                PostgresPublisher::new()
                    .publish(&content_type, &content, &config)
                    .await?;
            }
        }
        Command::Meta => println!("{}", serde_json::to_string_pretty(&plugin::meta())?),
        Command::Policy => println!("{}", serde_json::to_string_pretty(&publisher_policy()?)?),
    }

    Ok(())
}

async fn dry_run_publish(
    content_type: &str,
    content: &[u8],
    config: &pg_metrics_publisher::config::ConfigMap,
) -> anyhow::Result<()> {
    let batch = decode_batch(content_type, content)?;
    let connection = connection_config(config)?;
    info!("dry run: {} metrics for {}", batch.len(), connection.table);

    let mut store = MemoryStore::new();
    store.ensure_table(&connection.table).await?;
    write_batch(&mut store, &connection.table, &batch, Utc::now()).await?;

    for row in store.rows(&connection.table).unwrap_or_default() {
        println!("{}", serde_json::to_string(row)?);
    }

    store.close().await?;
    Ok(())
}
