//! Integration tests for relay (CORS proxy) fetches.
//!
//! - Failover from a relay answering 408 to the next relay
//! - Health-based ranking across calls
//! - Error-page rejection

mod common;

use common::{client, clock, HandlerTransport};
use feedrelay::client::RequestOptions;
use feedrelay::registry::StaticRegistry;
use feedrelay::transport::HttpResponse;
use feedrelay::FetchError;
use std::time::Duration;

const FIRST: &str = "https://first-relay.example/?url=";
const SECOND: &str = "https://second-relay.example/raw?url=";
const THIRD: &str = "https://third-relay.example/get?q=";
const TARGET: &str = "https://markets.example/calendar.json";
const BODY: &str = r#"{"events": [{"name": "CPI"}]}"#;

fn relays(urls: &[&str]) -> StaticRegistry {
    StaticRegistry::builder()
        .proxies(urls.iter().copied())
        .build()
}

#[tokio::test]
async fn request_timeout_relay_is_skipped() {
    let transport = HandlerTransport::new(|url, _| {
        if url.starts_with(FIRST) {
            Ok(HttpResponse::text(408, "Request Timeout"))
        } else {
            Ok(HttpResponse::text(200, BODY))
        }
    });
    let client = client(transport.clone(), relays(&[FIRST, SECOND]), clock());

    let body = client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, BODY);
    assert_eq!(transport.calls(), 2);

    let proxies = client.health_status().proxies;
    let first = proxies.iter().find(|p| p.url == FIRST).unwrap();
    let second = proxies.iter().find(|p| p.url == SECOND).unwrap();
    assert_eq!(first.failure_count, 1);
    assert_eq!(first.success_count, 0);
    assert_eq!(second.success_count, 1);
    assert_eq!(second.failure_count, 0);
}

#[tokio::test]
async fn failing_relay_is_demoted() {
    let transport = HandlerTransport::new(|url, _| {
        if url.starts_with(FIRST) {
            Ok(HttpResponse::text(502, "Bad Gateway"))
        } else {
            Ok(HttpResponse::text(200, BODY))
        }
    });
    let client = client(transport.clone(), relays(&[FIRST, SECOND]), clock());

    client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 2);

    // A perfect success rate now outranks the relay that failed
    for _ in 0..3 {
        client
            .fetch_with_proxy(TARGET, RequestOptions::new())
            .await
            .unwrap();
    }
    assert_eq!(transport.calls(), 5);
    assert!(transport.urls()[2..].iter().all(|u| u.starts_with(SECOND)));

    let proxies = client.health_status().proxies;
    let first = proxies.iter().find(|p| p.url == FIRST).unwrap();
    let second = proxies.iter().find(|p| p.url == SECOND).unwrap();
    assert_eq!(first.failure_count, 1);
    assert_eq!(second.success_count, 4);
}

#[tokio::test]
async fn demoted_relay_recovers_after_quiet_window() {
    let transport = HandlerTransport::new(|url, index| {
        if url.starts_with(FIRST) && index == 0 {
            Ok(HttpResponse::text(500, "down"))
        } else {
            Ok(HttpResponse::text(200, BODY))
        }
    });
    let clock = clock();
    let client = client(transport.clone(), relays(&[FIRST, SECOND]), clock.clone());

    client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 3);
    assert!(transport.urls()[2].starts_with(SECOND));

    clock.advance(Duration::from_secs(5 * 60 + 1));
    client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 4);
    assert!(transport.urls()[3].starts_with(FIRST));

    let proxies = client.health_status().proxies;
    let first = proxies.iter().find(|p| p.url == FIRST).unwrap();
    assert_eq!((first.success_count, first.failure_count), (1, 0));
}

#[tokio::test]
async fn error_pages_count_as_failures() {
    let transport = HandlerTransport::new(|url, _| {
        if url.starts_with(FIRST) {
            Ok(HttpResponse::text(200, "<!DOCTYPE html><title>Blocked</title>"))
        } else if url.starts_with(SECOND) {
            Ok(HttpResponse::text(200, "   "))
        } else {
            Ok(HttpResponse::text(200, BODY))
        }
    });
    let client = client(transport.clone(), relays(&[FIRST, SECOND, THIRD]), clock());

    let body = client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, BODY);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn exhausted_pool_returns_last_error() {
    let transport = HandlerTransport::new(|url, _| {
        if url.starts_with(FIRST) {
            Ok(HttpResponse::text(500, "down"))
        } else {
            Err(FetchError::transport("connection refused"))
        }
    });
    let client = client(transport.clone(), relays(&[FIRST, SECOND]), clock());

    let err = client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::transport("connection refused"));
}

#[tokio::test]
async fn empty_pool_is_an_error() {
    let transport = HandlerTransport::new(|_, _| Ok(HttpResponse::text(200, BODY)));
    let client = client(transport.clone(), relays(&[]), clock());

    let err = client
        .fetch_with_proxy(TARGET, RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::NoProxies);
    assert_eq!(transport.calls(), 0);
}
