//! End-to-end dispatch tests through the real HTTP stack.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use discovery_proxy::config::ProxyConfig;
use discovery_proxy::discovery::load_snapshot;
use discovery_proxy::http::HttpServer;
use discovery_proxy::lifecycle::Shutdown;
use discovery_proxy::routing::{DomainScheme, RoutingTable};

mod common;
use common::{dir, leaf, FakeRegistry};

/// Stand up a proxy on `proxy_addr` routing for `base_host`, seeded from
/// the given registry tree.
async fn start_proxy(
    proxy_addr: SocketAddr,
    base_host: &str,
    registry: FakeRegistry,
) -> (Arc<RoutingTable>, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy_addr.to_string();
    config.registry.base_host = base_host.to_string();

    let table = Arc::new(RoutingTable::new());
    let scheme = DomainScheme::new(".", base_host);
    load_snapshot(&registry, &scheme, &table).await.unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, table.clone());
    let listener = tokio::net::TcpListener::bind(proxy_addr).await.unwrap();
    tokio::spawn(server.run(listener, shutdown.triggered()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    (table, shutdown)
}

fn client_for(domain: &str, proxy_addr: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .resolve(domain, proxy_addr)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_round_robin_dispatch() {
    let b1: SocketAddr = "127.0.0.1:29181".parse().unwrap();
    let b2: SocketAddr = "127.0.0.1:29182".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:29183".parse().unwrap();

    common::start_mock_backend(b1, "b1").await;
    common::start_mock_backend(b2, "b2").await;

    let registry = FakeRegistry::new(dir(
        "/api",
        vec![dir(
            "/api/myapp",
            vec![dir(
                "/api/myapp/v1",
                vec![
                    leaf("/api/myapp/v1/i1", r#"{"url":"http://127.0.0.1:29181"}"#),
                    leaf("/api/myapp/v1/i2", r#"{"url":"http://127.0.0.1:29182"}"#),
                ],
            )],
        )],
    ));

    let (_table, shutdown) = start_proxy(proxy, "api.test:29183", registry).await;
    let client = client_for("v1.myapp.api.test", proxy);

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let response = client
            .get("http://v1.myapp.api.test:29183/")
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(response.status(), 200);
        bodies.push(response.text().await.unwrap());
    }
    assert_eq!(bodies, ["b1", "b2", "b1", "b2"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_host_is_bad_gateway() {
    let proxy: SocketAddr = "127.0.0.1:29184".parse().unwrap();
    let registry = FakeRegistry::new(dir("/api", vec![]));

    let (_table, shutdown) = start_proxy(proxy, "api.test:29184", registry).await;
    let client = client_for("nobody.home.api.test", proxy);

    let response = client
        .get("http://nobody.home.api.test:29184/")
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "The API is unavailable");

    shutdown.trigger();
}

#[tokio::test]
async fn test_domain_with_no_workers_is_bad_gateway() {
    let proxy: SocketAddr = "127.0.0.1:29185".parse().unwrap();
    // The version directory exists but holds no registrations.
    let registry = FakeRegistry::new(dir(
        "/api",
        vec![dir("/api/myapp", vec![dir("/api/myapp/v1", vec![])])],
    ));

    let (table, shutdown) = start_proxy(proxy, "api.test:29185", registry).await;
    assert!(table.lookup("v1.myapp.api.test:29185").is_some());

    let client = client_for("v1.myapp.api.test", proxy);
    let response = client
        .get("http://v1.myapp.api.test:29185/")
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(response.status(), 502);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_worker_is_bad_gateway() {
    let proxy: SocketAddr = "127.0.0.1:29186".parse().unwrap();
    // Registered, but nothing is listening there.
    let registry = FakeRegistry::new(dir(
        "/api",
        vec![dir(
            "/api/myapp",
            vec![dir(
                "/api/myapp/v1",
                vec![leaf("/api/myapp/v1/i1", r#"{"url":"http://127.0.0.1:29199"}"#)],
            )],
        )],
    ));

    let (_table, shutdown) = start_proxy(proxy, "api.test:29186", registry).await;
    let client = client_for("v1.myapp.api.test", proxy);

    let response = client
        .get("http://v1.myapp.api.test:29186/")
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(response.status(), 502);

    shutdown.trigger();
}

#[tokio::test]
async fn test_forwarding_preserves_path() {
    let backend: SocketAddr = "127.0.0.1:29187".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:29188".parse().unwrap();

    common::start_mock_backend(backend, "pong").await;

    let registry = FakeRegistry::new(dir(
        "/api",
        vec![dir(
            "/api/myapp",
            vec![dir(
                "/api/myapp/v1",
                vec![leaf("/api/myapp/v1/i1", r#"{"url":"http://127.0.0.1:29187"}"#)],
            )],
        )],
    ));

    let (_table, shutdown) = start_proxy(proxy, "api.test:29188", registry).await;
    let client = client_for("v1.myapp.api.test", proxy);

    let response = client
        .get("http://v1.myapp.api.test:29188/deep/path?q=1")
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "pong");

    shutdown.trigger();
}
