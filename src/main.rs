use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use eth_fee_analytics::analytics;
use eth_fee_analytics::api::{self, AppState};
use eth_fee_analytics::cli::{Cli, Commands};
use eth_fee_analytics::config::Config;
use eth_fee_analytics::error::PipelineError;
use eth_fee_analytics::eth::EthClient;
use eth_fee_analytics::storage::{self, SqliteSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { addr } => {
            let pool = storage::init_pool(&config.database_url).await?;
            let bind = addr.unwrap_or_else(|| config.http_bind_addr.clone());
            let state = AppState {
                source: Arc::new(SqliteSource::new(pool)),
                settings: config.pipeline,
                request_timeout: config.request_timeout,
            };
            api::run_http_server(&bind, state).await?;
        }
        Commands::GasHourly { day } => {
            let pool = storage::init_pool(&config.database_url).await?;
            let source = SqliteSource::new(pool);
            match analytics::hourly_fees(&source, &day, &config.pipeline).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(PipelineError::EmptyResult(day)) => {
                    tracing::info!("no transfers stored for {}", day);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::IngestOnce { blocks } => {
            let rpc_url = config.require_eth_rpc_url()?;
            let pool = storage::init_pool(&config.database_url).await?;
            let client = EthClient::new(rpc_url)?;
            let batch = client.fetch_recent_blocks(blocks).await?;
            storage::insert_transactions(&pool, &batch.transactions)
                .await
                .context("failed to store transactions")?;
            storage::insert_contracts(&pool, &batch.contracts)
                .await
                .context("failed to store contract addresses")?;
            tracing::info!(
                "ingested {} blocks, {} transactions, {} contract addresses",
                batch.blocks,
                batch.transactions.len(),
                batch.contracts.len()
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
