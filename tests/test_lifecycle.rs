//! Install and activation behavior against a simulated origin

use cachegate::{
    LifecycleManager, OriginClient, ProxyConfig, ProxyResponse, ProxyState, StoreRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager_for(server: &MockServer, config: ProxyConfig) -> (LifecycleManager, Arc<StoreRegistry>) {
    let registry = Arc::new(StoreRegistry::new(
        config.cache_namespace.clone(),
        config.generation.clone(),
    ));
    let origin = Arc::new(OriginClient::new(Some(server.uri()), Duration::from_secs(2)));
    let manager = LifecycleManager::new(Arc::clone(&registry), origin, Arc::new(config));
    (manager, registry)
}

async fn mock_ok(server: &MockServer, resource: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(resource))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn install_tolerates_partial_failure() {
    let server = MockServer::start().await;
    mock_ok(&server, "/", "home").await;
    mock_ok(&server, "/index.html", "index").await;
    mock_ok(&server, "/css/style.css", "css").await;
    mock_ok(&server, "/js/app.js", "js").await;
    Mock::given(method("GET"))
        .and(path("/missing.css"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = ProxyConfig {
        critical_urls: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/css/style.css".to_string(),
            "/js/app.js".to_string(),
            "/missing.css".to_string(),
        ],
        ..Default::default()
    };
    let (manager, registry) = manager_for(&server, config);

    // Install completes despite the 404
    manager.install().await.unwrap();
    assert_eq!(manager.state(), ProxyState::Installed);

    let store = registry.open("critical").await;
    assert_eq!(store.len().await, 4);
    assert!(store.lookup("/").await.unwrap().is_some());
    assert!(store.lookup("/js/app.js").await.unwrap().is_some());
    assert!(store.lookup("/missing.css").await.unwrap().is_none());
}

#[tokio::test]
async fn install_precaches_both_sets_into_their_stores() {
    let server = MockServer::start().await;
    mock_ok(&server, "/index.html", "index").await;
    mock_ok(&server, "/js/vendor.js", "vendor").await;
    mock_ok(&server, "/img/logo.png", "logo").await;

    let config = ProxyConfig {
        critical_urls: vec!["/index.html".to_string()],
        important_urls: vec!["/js/vendor.js".to_string(), "/img/logo.png".to_string()],
        ..Default::default()
    };
    let (manager, registry) = manager_for(&server, config);

    manager.install().await.unwrap();

    assert_eq!(registry.open("critical").await.len().await, 1);
    assert_eq!(registry.open("static").await.len().await, 2);
}

#[tokio::test]
async fn activation_leaves_no_prior_generation_behind() {
    let server = MockServer::start().await;
    let config = ProxyConfig {
        generation: "v3".to_string(),
        ..Default::default()
    };
    let (manager, registry) = manager_for(&server, config);

    // Stores left behind by two earlier generations
    for (name, generation) in [("critical", "v1"), ("images", "v2"), ("api", "v2")] {
        let store = registry.open_with_generation(name, generation).await;
        store.put("/x", ProxyResponse::ok("old")).await.unwrap();
    }
    registry.open("critical").await;

    let deleted = manager.activate().await.unwrap();
    assert_eq!(deleted.len(), 3);
    assert_eq!(manager.state(), ProxyState::Active);

    let names = registry.list_store_names().await;
    assert_eq!(names, vec!["cachegate-critical-v3"]);
    assert!(names.iter().all(|n| n.ends_with("-v3")));
}

#[tokio::test]
async fn activation_twice_with_same_generation_is_noop() {
    let server = MockServer::start().await;
    let (manager, registry) = manager_for(&server, ProxyConfig::default());

    let store = registry.open("general").await;
    store.put("/page", ProxyResponse::ok("page")).await.unwrap();

    assert!(manager.activate().await.unwrap().is_empty());
    assert!(manager.activate().await.unwrap().is_empty());

    // Current-generation content survives re-activation
    assert!(registry
        .open("general")
        .await
        .lookup("/page")
        .await
        .unwrap()
        .is_some());
}
