//! Registry snapshot and watch access.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::registry::types::{RegistryNode, WatchEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 64;

/// etcd error code for a compacted watch index.
const EVENT_INDEX_CLEARED: u64 = 401;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry responded with {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("malformed registry response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Recursive registry tree plus the index a watch should resume after.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub root: RegistryNode,
    pub index: Option<u64>,
}

/// Sequential stream of change events for a subtree.
///
/// Yields `None` once the underlying subscription ends or fails; the watcher
/// owns reconnection.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::Receiver<WatchEvent>,
}

impl EventStream {
    /// Build a stream fed by the returned sender. Dropping the sender ends
    /// the stream; fakes in tests drive subscriptions through this.
    pub fn channel(capacity: usize) -> (mpsc::Sender<WatchEvent>, Self) {
        let (tx, events) = mpsc::channel(capacity);
        (tx, Self { events })
    }

    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// Read/watch interface the proxy needs from the registry.
#[async_trait]
pub trait RegistryClient: Send + Sync + 'static {
    /// Fetch the full subtree under the configured root path.
    async fn snapshot(&self) -> Result<Snapshot, RegistryError>;

    /// Subscribe to changes under the root path, starting after `since`
    /// (or from now when `None`).
    async fn subscribe(&self, since: Option<u64>) -> Result<EventStream, RegistryError>;
}

/// Registry client speaking the etcd v2 keys API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
    keys_url: Url,
}

impl HttpRegistryClient {
    pub fn new(endpoint: &Url, root_path: &str) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            keys_url: keys_url(endpoint, root_path),
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        let response = self
            .http
            .get(self.keys_url.clone())
            .query(&[("recursive", "true")])
            .send()
            .await?;

        let index = etcd_index(response.headers());
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RegistryError::Api {
                status,
                message: body.trim().to_string(),
            });
        }

        let envelope: KeysResponse = serde_json::from_str(&body)?;
        Ok(Snapshot {
            root: envelope.node,
            index,
        })
    }

    async fn subscribe(&self, since: Option<u64>) -> Result<EventStream, RegistryError> {
        let (tx, stream) = EventStream::channel(EVENT_BUFFER);
        let http = self.http.clone();
        let url = self.keys_url.clone();

        tokio::spawn(async move {
            let mut wait_index = since;
            loop {
                match poll_once(&http, &url, wait_index).await {
                    Ok(Poll::Event(event)) => {
                        if event.node.modified_index > 0 {
                            wait_index = Some(event.node.modified_index + 1);
                        }
                        if tx.send(event).await.is_err() {
                            // Subscriber went away.
                            return;
                        }
                    }
                    Ok(Poll::FastForward(index)) => {
                        tracing::warn!(
                            index,
                            "watch index compacted away; resuming from the registry's current index"
                        );
                        wait_index = Some(index + 1);
                    }
                    Err(error) => {
                        tracing::debug!(error = %error, "registry poll failed, ending stream");
                        // Dropping the sender ends the stream.
                        return;
                    }
                }
            }
        });

        Ok(stream)
    }
}

/// Envelope around snapshot responses (`{"action": "get", "node": ...}`).
#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: RegistryNode,
}

/// Error body etcd returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "errorCode")]
    error_code: u64,
}

enum Poll {
    Event(WatchEvent),
    FastForward(u64),
}

async fn poll_once(
    http: &reqwest::Client,
    url: &Url,
    wait_index: Option<u64>,
) -> Result<Poll, RegistryError> {
    let mut request = http
        .get(url.clone())
        .query(&[("wait", "true"), ("recursive", "true")]);
    if let Some(index) = wait_index {
        request = request.query(&[("waitIndex", index.to_string())]);
    }

    let response = request.send().await?;
    let status = response.status();
    let index = etcd_index(response.headers());
    let body = response.text().await?;

    if status.is_success() {
        return Ok(Poll::Event(serde_json::from_str(&body)?));
    }

    // A stale waitIndex surfaces as an API error rather than an event; the
    // stream can keep going from the index the registry reports.
    if let Some(index) = index {
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            if api_error.error_code == EVENT_INDEX_CLEARED {
                return Ok(Poll::FastForward(index));
            }
        }
    }

    Err(RegistryError::Api {
        status,
        message: body.trim().to_string(),
    })
}

fn etcd_index(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("x-etcd-index")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn keys_url(endpoint: &Url, root_path: &str) -> Url {
    let mut url = endpoint.clone();
    url.set_path(&format!("/v2/keys/{}", root_path.trim_matches('/')));
    url.set_query(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_url() {
        let endpoint = Url::parse("http://127.0.0.1:4001").unwrap();
        assert_eq!(
            keys_url(&endpoint, "api").as_str(),
            "http://127.0.0.1:4001/v2/keys/api"
        );
        assert_eq!(
            keys_url(&endpoint, "/services/api/").as_str(),
            "http://127.0.0.1:4001/v2/keys/services/api"
        );
    }

    #[tokio::test]
    async fn test_event_stream_ends_when_sender_drops() {
        let (tx, mut stream) = EventStream::channel(4);
        drop(tx);
        assert!(stream.next().await.is_none());
    }
}
