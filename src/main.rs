use anyhow::Context;
use clap::{Parser, Subcommand};
use food_recalls::aggregator::{Aggregator, ListParams, ListRequest};
use food_recalls::apis::build_providers;
use food_recalls::config::Config;
use food_recalls::persister::{PersistQueue, Persister};
use food_recalls::server::{start_server, AppState};
use food_recalls::storage::open_store;
use food_recalls::{logging, metrics};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "food_recalls")]
#[command(about = "Aggregate, normalize and serve FDA and FSIS food recalls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print one page of recalls
    List {
        #[arg(long)]
        search: Option<String>,
        /// Category slug or "all"
        #[arg(long)]
        category: Option<String>,
        /// Retailer slug or "all"
        #[arg(long)]
        retailer: Option<String>,
        #[arg(long)]
        risk_level: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        /// asc or desc
        #[arg(long)]
        sort_order: Option<String>,
        #[arg(long)]
        page: Option<String>,
    },
    /// Resolve a single recall by its recall number
    Lookup { recall_id: String },
    /// Fetch from every enabled provider and persist the results
    Sync,
    /// Re-run normalization over every stored recall
    Renormalize,
    /// Normalize and persist a JSON array of recall documents
    Import { file: PathBuf },
    /// Probe every enabled provider
    Health,
}

fn build_state(config: &Config) -> anyhow::Result<(Arc<AppState>, JoinHandle<()>)> {
    let store = open_store(&config.storage).context("opening recall store")?;
    let providers = build_providers(&config.providers).context("building providers")?;
    let persister = Persister::new(store);
    let (queue, worker) = PersistQueue::start(persister.clone(), config.aggregation.persist_queue_capacity);
    let aggregator = Aggregator::new(providers, persister.clone(), queue, config.aggregation.clone());
    Ok((Arc::new(AppState { aggregator, persister }), worker))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let (state, worker) = build_state(&config)?;

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();
            start_server(state.clone(), port.unwrap_or(config.server.port)).await?;
        }
        Commands::List {
            search,
            category,
            retailer,
            risk_level,
            sort_by,
            sort_order,
            page,
        } => {
            let params = ListParams {
                search,
                category,
                retailer,
                risk_level,
                sort_by,
                sort_order,
                page,
            };
            let request = ListRequest::from_params(&params)?;
            print_json(&state.aggregator.list(&request).await?)?;
        }
        Commands::Lookup { recall_id } => match state.aggregator.lookup(&recall_id).await? {
            Some(recall) => print_json(&recall)?,
            None => warn!(%recall_id, "Recall not found"),
        },
        Commands::Sync => print_json(&state.aggregator.sync().await?)?,
        Commands::Renormalize => print_json(&state.persister.renormalize_all().await?)?,
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let documents: Vec<serde_json::Value> =
                serde_json::from_str(&text).with_context(|| format!("{} is not a JSON array", file.display()))?;
            print_json(&state.persister.import_records(&documents).await?)?;
        }
        Commands::Health => print_json(&state.aggregator.provider_health().await)?,
    }

    // Let queued background persistence finish before exiting
    drop(state);
    if let Err(e) = worker.await {
        warn!(error = %e, "Persist worker did not shut down cleanly");
    }
    info!("Done");
    Ok(())
}
