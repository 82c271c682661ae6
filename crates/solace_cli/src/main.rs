use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use solace_core::config::SolaceConfig;
use solace_memory::SqliteStore;
use solace_reasoning::{GatewayClient, InsightGenerator, LlmClient, MockProvider, TurnEngine};
use solace_server::{SolaceServer, TokenMap};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "solace.toml")]
    config: PathBuf,

    /// Override the database path
    #[arg(long)]
    db: Option<String>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    info!("Starting Solace...");

    // 1. Load configuration
    info!("Loading config from {}...", args.config.display());
    let mut config = SolaceConfig::load_or_default(&args.config);
    config.apply_env_overrides();
    if let Some(db) = args.db {
        config.store.db_path = db;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // 2. Open the record store
    info!("Opening store at {}...", config.store.db_path);
    let store = SqliteStore::open(&config.store.db_path).await?;

    // 3. Pick the completion provider
    let mock_key = std::env::var("GATEWAY_API_KEY")
        .map(|k| k == "mock")
        .unwrap_or(false);
    let client: Arc<dyn LlmClient> = if config.llm.provider == "mock" || mock_key {
        info!("Using the canned mock provider");
        Arc::new(MockProvider::new())
    } else {
        info!("Using gateway provider with model {}...", config.llm.model);
        Arc::new(GatewayClient::new(&config.llm)?)
    };

    // 4. Wire the engine and the weekly aggregator
    let engine = Arc::new(TurnEngine::new(
        store.clone(),
        Arc::clone(&client),
        &config.llm,
    ));
    let insights = Arc::new(InsightGenerator::new(store, client, config.insight.clone()));
    let auth = Arc::new(TokenMap::from_config(&config.auth));

    // 5. Serve until interrupted
    let server = SolaceServer::new(
        engine,
        insights,
        auth,
        &config.server.host,
        config.server.port,
    );
    let handle = server.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.abort();

    Ok(())
}
