// Admission control exercised through the full route tree

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::TestServer;
use parlor::core::ip_extractor::IpExtractionConfig;
use parlor::core::rate_limiter::{BLOCKED_BODY, EXCEEDED_BODY};
use parlor::core::RateLimitConfig;
use serde_json::Value;
use warp::http::StatusCode;

// Refill is negligible so the burst alone decides admission
fn burst_only(burst: f64) -> RateLimitConfig {
    RateLimitConfig {
        rate_per_second: 0.001,
        burst_limit: burst,
        block_duration: Duration::from_secs(60),
        ..RateLimitConfig::default()
    }
}

fn peer(ip: &str) -> SocketAddr {
    format!("{}:40000", ip).parse().unwrap()
}

#[tokio::test]
async fn test_burst_then_rejections() {
    let server = TestServer::new(&[], burst_only(100.0));
    let routes = server.routes(IpExtractionConfig::default());

    for i in 0..100 {
        let res = warp::test::request()
            .path("/health")
            .remote_addr(peer("198.51.100.7"))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK, "request {} should pass", i + 1);
    }

    let mut bodies = Vec::new();
    for _ in 100..150 {
        let res = warp::test::request()
            .path("/health")
            .remote_addr(peer("198.51.100.7"))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "error");
        bodies.push(body["body"].as_str().unwrap().to_string());
    }

    assert_eq!(bodies[0], EXCEEDED_BODY);
    assert!(bodies[1..].iter().all(|b| b == BLOCKED_BODY));
}

#[tokio::test]
async fn test_clients_have_independent_buckets() {
    let server = TestServer::new(&[], burst_only(2.0));
    let routes = server.routes(IpExtractionConfig::default());

    for _ in 0..3 {
        warp::test::request()
            .path("/health")
            .remote_addr(peer("198.51.100.7"))
            .reply(&routes)
            .await;
    }

    let res = warp::test::request()
        .path("/health")
        .remote_addr(peer("198.51.100.8"))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.limiter.tracked_clients(), 2);
}

#[tokio::test]
async fn test_forwarded_address_is_the_key() {
    let server = TestServer::new(&[], burst_only(1.0));
    let routes = server.routes(IpExtractionConfig::behind_proxies(Vec::new()));

    let first = warp::test::request()
        .path("/health")
        .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
        .remote_addr(peer("10.0.0.1"))
        .reply(&routes)
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    // Same proxy, different origin
    let second = warp::test::request()
        .path("/health")
        .header("x-real-ip", "203.0.113.6")
        .remote_addr(peer("10.0.0.1"))
        .reply(&routes)
        .await;
    assert_eq!(second.status(), StatusCode::OK);

    let third = warp::test::request()
        .path("/health")
        .header("x-forwarded-for", "203.0.113.5")
        .remote_addr(peer("10.0.0.1"))
        .reply(&routes)
        .await;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_malformed_address_is_bad_request() {
    let server = TestServer::new(&[], burst_only(10.0));
    let routes = server.routes(IpExtractionConfig::behind_proxies(Vec::new()));

    let res = warp::test::request()
        .path("/health")
        .header("x-real-ip", "not-an-ip")
        .remote_addr(peer("10.0.0.1"))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.limiter.tracked_clients(), 0);
}

#[tokio::test]
async fn test_unknown_path_still_counts() {
    let server = TestServer::new(&[], burst_only(1.0));
    let routes = server.routes(IpExtractionConfig::default());

    let res = warp::test::request()
        .path("/nowhere")
        .remote_addr(peer("198.51.100.9"))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = warp::test::request()
        .path("/health")
        .remote_addr(peer("198.51.100.9"))
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}
