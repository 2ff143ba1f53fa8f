use std::sync::Arc;

use log::info;
use warp::hyper::HeaderMap;
use warp::ws::Ws;
use warp::{Filter, Reply};

use crate::auth::session::SessionResolver;
use crate::config::KeepAliveConfig;
use crate::constants::{HEALTH_PATH, WS_PATH};
use crate::core::hub::SharedHub;
use crate::core::ip_extractor::IpExtractionConfig;
use crate::core::message_handler::MessageHandler;
use crate::core::rate_limiter::SharedRateLimiter;
use crate::handlers::admission::{handle_rejection, with_rate_limit};
use crate::handlers::websocket::{upgrade, with_state};

/// Everything a connection task needs
pub struct AppState {
    pub hub: SharedHub,
    pub handler: MessageHandler,
    pub sessions: Arc<dyn SessionResolver>,
    pub keep_alive: KeepAliveConfig,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(
        hub: SharedHub,
        sessions: Arc<dyn SessionResolver>,
        keep_alive: KeepAliveConfig,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            handler: MessageHandler::with_frame_limit(hub.clone(), max_frame_bytes),
            hub,
            sessions,
            keep_alive,
        }
    }
}

/// Full route tree: rate limiting in front of the websocket and health endpoints
pub fn routes(
    state: SharedAppState,
    limiter: SharedRateLimiter,
    ip_config: Arc<IpExtractionConfig>,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::headers_cloned())
        .and(with_state(state))
        .and_then(|ws: Ws, headers: HeaderMap, state: SharedAppState| async move {
            info!("New websocket connection");
            upgrade(ws, headers, state).await
        });

    let health_route = warp::path(HEALTH_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "OK");

    with_rate_limit(limiter, ip_config)
        .and(ws_route.or(health_route))
        .recover(handle_rejection)
}
