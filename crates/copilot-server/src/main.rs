// ============================================================================
// copilot-server: HTTP front end for the support copilot
// ============================================================================
// Usage:
//   copilot-server                          Serve on 127.0.0.1:8081
//   copilot-server --bind 0.0.0.0:8081      Serve on all interfaces
//
// Configuration comes from the environment (and .env); see CopilotConfig.
// ============================================================================

mod error;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use copilot_core::retrieval::{QdrantIndex, VectorIndex};
use copilot_core::{ChatPipeline, CopilotConfig, TicketCatalog};
use tracing::{error, info, warn};

use routes::{AppState, Backend};

/// Support copilot HTTP server
#[derive(Parser)]
#[command(name = "copilot-server", version, about = "Serve the support copilot chat API")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "COPILOT_BIND", default_value = "127.0.0.1:8081")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("copilot_server=debug".parse()?)
                .add_directive("copilot_core=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let backend = build_backend().await;

    let app = routes::router(AppState { backend });
    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    info!("Copilot server listening on {}", cli.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the online backend, or fall back to degraded mode on config errors
async fn build_backend() -> Backend {
    let config = match CopilotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration, serving fallback replies: {}", e);
            return Backend::Degraded { fallback_url: None };
        }
    };

    match connect(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("Chat pipeline unavailable, serving fallback replies: {}", e);
            Backend::Degraded {
                fallback_url: config.fallback_url.clone(),
            }
        }
    }
}

async fn connect(config: &CopilotConfig) -> Result<Backend> {
    let qdrant = Arc::new(QdrantIndex::connect(
        &config.qdrant_url,
        config.qdrant_api_key.clone(),
        config.upstream_timeout,
    )?);

    // An unreachable Qdrant is not fatal; requests answer from empty context
    if !qdrant.health_check().await {
        warn!("Qdrant at {} is not reachable yet", config.qdrant_url);
    }

    let index: Arc<dyn VectorIndex> = qdrant;
    let pipeline = ChatPipeline::from_config(config, index.clone()).await?;
    let tickets = TicketCatalog::new(index, config.ticket_collection.clone());

    Ok(Backend::Online {
        pipeline: Arc::new(pipeline),
        tickets: Arc::new(tickets),
    })
}
