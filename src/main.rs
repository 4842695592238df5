//! Outfit studio API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ tower-http layers (body limit, timeout, request id, trace)
//!                         │
//!                         ▼
//!                     api::<route> ──▶ http::wrap (timing, outcome log, error boundary)
//!                         │
//!                         ├─▶ security::RateLimiter  (fixed window per scope + client IP)
//!                         ├─▶ auth::IdentityProvider (session → user, else 401)
//!                         ├─▶ http::body             (JSON parse + validate, else 400)
//!                         ├─▶ security::access       (ownership prefix, else 403)
//!                         └─▶ storage / uploads / ai / billing collaborators
//!                         │
//!     Client Response     ▼
//!     ◀────────────── http::envelope ({ok:true,data} | {ok:false,error})
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use outfit_api::ai::{FalClient, GenerativeModel, Unconfigured};
use outfit_api::backends::MemoryBackends;
use outfit_api::clock::{Clock, SystemClock};
use outfit_api::config::{config_from_env, load_config};
use outfit_api::lifecycle::signals::shutdown_signal;
use outfit_api::observability::{logging, metrics};
use outfit_api::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "outfit-api")]
#[command(about = "HTTP API for the outfit studio", long_about = None)]
struct Args {
    /// TOML config file. Without it, defaults plus environment overrides.
    #[arg(short, long, env = "OUTFIT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };
    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "outfit-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.site.environment,
        request_timeout_secs = config.timeouts.request_secs,
        has_ai_key = config.ai.api_key.is_some(),
        has_webhook_secret = config.billing.webhook_secret.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let ai: Arc<dyn GenerativeModel> = match &config.ai.api_key {
        Some(key) => Arc::new(
            FalClient::new(config.ai.base_url.clone(), key.clone())
                .with_max_output_bytes(config.ai.max_image_bytes),
        ),
        None => {
            tracing::warn!("No AI key configured; AI routes will answer 501");
            Arc::new(Unconfigured)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = Arc::new(config);
    let backends = MemoryBackends::new(&config, clock.clone());
    let state = backends.app_state(config.clone(), clock, ai);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state);
    let serve = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();
    serve.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
