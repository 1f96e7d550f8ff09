//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the axum router and middleware stack
//! - Resolve the request's Host to a worker pool
//! - Obtain the next worker in rotation and forward the request
//! - Surface routing misses and upstream failures as 502

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::uri::Uri;
use axum::http::{header, HeaderValue, Request};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::ProxyConfig;
use crate::http::request::UuidRequestId;
use crate::http::{response, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::RoutingTable;

/// State injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RoutingTable>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP entry point of the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, table: Arc<RoutingTable>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState { table, client };
        Self {
            router: Self::build_router(config, state),
        }
    }

    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let request_id = header::HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), UuidRequestId))
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(SetResponseHeaderLayer::if_not_present(
                        header::SERVER,
                        HeaderValue::from_static("discovery-proxy"),
                    )),
            )
    }

    /// Serve until the shutdown future resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Dispatch one request: Host → pool → worker → forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    // HTTP/2 carries the authority in the URI rather than a Host header.
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    let Some(host) = host else {
        metrics::record_request(&method, 502, "none", start);
        return response::bad_gateway("The API is unavailable");
    };

    let Some(pool) = state.table.lookup(&host) else {
        // Expected during deploy windows; a miss is not an internal error.
        tracing::debug!(host = %host, "no routing domain for host");
        metrics::record_request(&method, 502, &host, start);
        return response::bad_gateway("The API is unavailable");
    };

    let Some(worker) = pool.next().await else {
        tracing::debug!(host = %host, "no workers registered for domain");
        metrics::record_request(&method, 502, &host, start);
        return response::bad_gateway("The API is unavailable");
    };

    tracing::debug!(host = %host, worker = %worker.key, "forwarding request");

    let request = match rewrite_request(request, &worker.url) {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(worker = %worker.key, error = %error, "failed to rewrite request uri");
            metrics::record_request(&method, 502, &host, start);
            return response::bad_gateway("The API is unavailable");
        }
    };

    match state.client.request(request).await {
        Ok(upstream) => {
            metrics::record_request(&method, upstream.status().as_u16(), &host, start);
            response::from_upstream(upstream)
        }
        Err(error) => {
            tracing::error!(worker = %worker.key, error = %error, "upstream request failed");
            metrics::record_request(&method, 502, &host, start);
            response::bad_gateway("The API is unavailable")
        }
    }
}

/// Point the request at the worker's target, keeping the inbound
/// path/query (prefixed by a non-root target path) and headers.
fn rewrite_request(request: Request<Body>, target: &Url) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    let request_path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let path_and_query = join_target_path(target.path(), request_path);

    let mut authority = target.host_str().unwrap_or_default().to_string();
    if let Some(port) = target.port() {
        authority.push_str(&format!(":{port}"));
    }

    parts.uri = Uri::builder()
        .scheme(target.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()?;

    Ok(Request::from_parts(parts, body))
}

fn join_target_path(target_path: &str, request_path: &str) -> String {
    if target_path.is_empty() || target_path == "/" {
        return request_path.to_string();
    }
    format!("{}{}", target_path.trim_end_matches('/'), request_path)
}
