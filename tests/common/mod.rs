// Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parlor::auth::{Claims, TokenManager, TokenSessionResolver};
use parlor::config::KeepAliveConfig;
use parlor::core::ip_extractor::IpExtractionConfig;
use parlor::core::message::UserSummary;
use parlor::core::{ChatHub, RateLimitConfig, RateLimiter, SharedHub};
use parlor::handlers::{routes, AppState};
use parlor::storage::MemoryStore;
use serde_json::Value;
use warp::{Filter, Reply};

pub const SECRET: &str = "integration-tests-secret-4e8b1f0c2d7a";

pub fn token_for(user_id: i64, username: &str) -> String {
    TokenManager::new(SECRET)
        .generate_token(&Claims::new(user_id, username.to_string()))
        .unwrap()
}

pub fn bearer(user_id: i64, username: &str) -> String {
    format!("Bearer {}", token_for(user_id, username))
}

pub struct TestServer {
    pub hub: SharedHub,
    pub store: Arc<MemoryStore>,
    pub limiter: Arc<RateLimiter>,
}

impl TestServer {
    pub fn new(users: &[(i64, &str)], rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryStore::with_users(
            users.iter().map(|(id, name)| UserSummary::new(*id, *name)),
        ));
        let hub = Arc::new(ChatHub::new(store.clone(), store.clone()));
        let limiter = Arc::new(RateLimiter::new(rate_limit));
        Self { hub, store, limiter }
    }

    pub fn routes(
        &self,
        ip_config: IpExtractionConfig,
    ) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
        let state = Arc::new(AppState::new(
            self.hub.clone(),
            Arc::new(TokenSessionResolver::new(SECRET)),
            KeepAliveConfig {
                ping_interval: Duration::from_secs(30),
                idle_timeout: Duration::from_secs(90),
            },
            4096,
        ));
        routes(state, self.limiter.clone(), Arc::new(ip_config))
    }
}

/// Next text frame decoded as JSON, skipping control frames
pub async fn recv_json(client: &mut warp::test::WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("websocket closed");
        if let Ok(text) = msg.to_str() {
            return serde_json::from_str(text).unwrap();
        }
    }
}

/// Wait until the hub has registered `count` connections
pub async fn wait_for_clients(hub: &SharedHub, count: usize) {
    for _ in 0..200 {
        if hub.registry().client_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} registered clients, found {}", count, hub.registry().client_count());
}
