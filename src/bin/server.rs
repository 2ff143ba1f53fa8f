use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use parlor::auth::TokenSessionResolver;
use parlor::config::ServerConfig;
use parlor::core::{ChatHub, RateLimiter};
use parlor::handlers::{routes, AppState};
use parlor::storage::MemoryStore;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, rate={}/s, burst={}",
        config.host, config.port, config.rate_per_second, config.burst_limit
    );

    let store = Arc::new(MemoryStore::with_users(config.seed_users.clone()));
    info!("Seeded {} users into the directory", config.seed_users.len());

    let hub = Arc::new(ChatHub::new(store.clone(), store));

    let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
    limiter.clone().start_sweep_task();

    let sessions = Arc::new(TokenSessionResolver::new(&config.jwt_secret));
    let state = Arc::new(AppState::new(
        hub,
        sessions,
        config.keep_alive(),
        config.max_frame_bytes,
    ));

    let routes = routes(state, limiter, Arc::new(config.ip_extraction()));

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => {
            info!("Starting Parlor server on {} (TLS)", addr);
            warp::serve(routes)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .run(addr)
                .await;
        }
        _ => {
            info!("Starting Parlor server on {}", addr);
            warp::serve(routes).run(addr).await;
        }
    }
}
