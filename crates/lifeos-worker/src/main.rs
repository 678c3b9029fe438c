//! Video processing worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lifeos_worker::{Services, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::from_default_env().add_directive("lifeos=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true))
            .with(env_filter)
            .init();
    }

    info!("Starting lifeos-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let services = match Services::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to construct services: {}", e);
            std::process::exit(1);
        }
    };

    let pool = WorkerPool::new(config, services);
    if let Err(e) = pool.run().await {
        error!("Worker pool error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
