//! Admission control filter placed in front of every route

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use warp::http::StatusCode;
use warp::hyper::HeaderMap;
use warp::reject::Reject;
use warp::{Filter, Rejection, Reply};

use crate::core::ip_extractor::{extract_client_ip, IpExtractionConfig};
use crate::core::rate_limiter::SharedRateLimiter;

/// Structured body for every rejected request
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub status: &'static str,
    pub body: String,
}

#[derive(Debug)]
pub struct RateLimited {
    pub body: &'static str,
}

impl Reject for RateLimited {}

#[derive(Debug)]
pub struct InvalidClientAddress;

impl Reject for InvalidClientAddress {}

#[derive(Debug)]
pub struct Unauthorized;

impl Reject for Unauthorized {}

fn admit(
    limiter: &SharedRateLimiter,
    ip_config: &IpExtractionConfig,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> Result<(), Rejection> {
    let ip = extract_client_ip(headers, remote, ip_config).map_err(|e| {
        debug!("Rejecting request: {}", e);
        warp::reject::custom(InvalidClientAddress)
    })?;

    let decision = limiter.check(&ip.to_string());
    match decision.rejection_body() {
        None => Ok(()),
        Some(body) => {
            debug!("Rate limited {} ({:?})", ip, decision);
            Err(warp::reject::custom(RateLimited { body }))
        }
    }
}

/// Gate requests through the token bucket of their client address
pub fn with_rate_limit(
    limiter: SharedRateLimiter,
    ip_config: Arc<IpExtractionConfig>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .and(warp::addr::remote())
        .and_then(move |headers: HeaderMap, remote: Option<SocketAddr>| {
            let limiter = limiter.clone();
            let ip_config = ip_config.clone();
            async move { admit(&limiter, &ip_config, &headers, remote) }
        })
        .untuple_one()
}

/// Turn rejections into JSON error responses
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(limited) = err.find::<RateLimited>() {
        (StatusCode::TOO_MANY_REQUESTS, limited.body.to_string())
    } else if err.find::<InvalidClientAddress>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid IP address".to_string())
    } else if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad Request".to_string())
    };

    let reply = warp::reply::json(&RejectionBody { status: "error", body });
    Ok(warp::reply::with_status(reply, status))
}
