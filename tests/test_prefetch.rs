//! Predictive prefetch behavior against a simulated origin

use cachegate::{Classifier, OriginClient, Prefetcher, ProxyMetrics, StoreRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prefetcher_for(
    server: &MockServer,
    routes: HashMap<String, Vec<String>>,
    capacity: usize,
) -> (Prefetcher, Arc<StoreRegistry>, Arc<ProxyMetrics>) {
    let registry = Arc::new(StoreRegistry::new("cachegate", "v1"));
    let origin = Arc::new(OriginClient::new(Some(server.uri()), Duration::from_secs(2)));
    let metrics = Arc::new(ProxyMetrics::new());
    let classifier = Arc::new(Classifier::new(Vec::new(), "/api/".to_string()));
    let prefetcher = Prefetcher::new(
        routes,
        true,
        capacity,
        Arc::clone(&registry),
        origin,
        Arc::clone(&metrics),
        classifier,
    );
    (prefetcher, registry, metrics)
}

#[tokio::test]
async fn prefetch_never_exceeds_capacity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("resource"))
        .mount(&server)
        .await;

    let mut routes = HashMap::new();
    routes.insert(
        "/".to_string(),
        vec![
            "/css/a.css".to_string(),
            "/css/b.css".to_string(),
            "/css/c.css".to_string(),
            "/css/d.css".to_string(),
            "/css/e.css".to_string(),
        ],
    );
    let (prefetcher, _registry, metrics) = prefetcher_for(&server, routes, 2);

    let outcome = prefetcher.on_navigation_served("/").await;

    assert_eq!(outcome.considered, 2);
    assert_eq!(outcome.fetched, 2);
    assert_eq!(metrics.snapshot().predictive_fetches, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn prefetch_never_refetches_cached_resources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("resource"))
        .mount(&server)
        .await;

    let mut routes = HashMap::new();
    routes.insert(
        "/products".to_string(),
        vec![
            "/css/products.css".to_string(),
            "/js/products.js".to_string(),
            "/img/banner.png".to_string(),
        ],
    );
    let (prefetcher, _registry, metrics) = prefetcher_for(&server, routes, 10);

    let first = prefetcher.on_navigation_served("/products").await;
    assert_eq!(first.fetched, 3);

    // Everything is cached now; a second navigation fetches nothing
    let second = prefetcher.on_navigation_served("/products").await;
    assert_eq!(second.considered, 3);
    assert_eq!(second.launched, 0);
    assert_eq!(second.fetched, 0);

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(metrics.snapshot().predictive_fetches, 3);
}

#[tokio::test]
async fn prefetched_resources_land_in_their_class_stores() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("resource"))
        .mount(&server)
        .await;

    let mut routes = HashMap::new();
    routes.insert(
        "/".to_string(),
        vec!["/css/style.css".to_string(), "/img/logo.png".to_string()],
    );
    let (prefetcher, registry, _metrics) = prefetcher_for(&server, routes, 10);

    prefetcher.on_navigation_served("/").await;

    assert!(registry
        .open("static")
        .await
        .lookup("/css/style.css")
        .await
        .unwrap()
        .is_some());
    assert!(registry
        .open("images")
        .await
        .lookup("/img/logo.png")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn prefetch_failures_are_silent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut routes = HashMap::new();
    routes.insert("/".to_string(), vec!["/css/style.css".to_string()]);
    let (prefetcher, registry, metrics) = prefetcher_for(&server, routes, 10);

    let outcome = prefetcher.on_navigation_served("/").await;

    assert_eq!(outcome.launched, 1);
    assert_eq!(outcome.fetched, 0);
    assert_eq!(metrics.snapshot().predictive_fetches, 0);
    assert!(registry
        .open("static")
        .await
        .lookup("/css/style.css")
        .await
        .unwrap()
        .is_none());
}
