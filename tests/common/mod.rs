//! Shared utilities for the integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use discovery_proxy::registry::{
    EventAction, EventStream, RegistryClient, RegistryError, RegistryNode, Snapshot, WatchEvent,
};

/// Start a mock backend that answers every connection with a fixed body.
#[allow(dead_code)]
pub async fn start_mock_backend(addr: SocketAddr, body: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
}

pub fn dir(key: &str, nodes: Vec<RegistryNode>) -> RegistryNode {
    RegistryNode {
        key: key.to_string(),
        dir: true,
        nodes,
        ..Default::default()
    }
}

pub fn leaf(key: &str, value: &str) -> RegistryNode {
    RegistryNode {
        key: key.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn create_event(key: &str, value: &str, index: u64) -> WatchEvent {
    WatchEvent {
        action: EventAction::Create,
        node: RegistryNode {
            key: key.to_string(),
            value: Some(value.to_string()),
            modified_index: index,
            ..Default::default()
        },
    }
}

#[allow(dead_code)]
pub fn delete_event(key: &str, index: u64) -> WatchEvent {
    WatchEvent {
        action: EventAction::Delete,
        node: RegistryNode {
            key: key.to_string(),
            modified_index: index,
            ..Default::default()
        },
    }
}

/// Scriptable in-process registry.
///
/// Subscriptions hand out channel-backed streams the test drives via
/// [`FakeRegistry::emit`]; killing the streams simulates the watch
/// connection dying.
pub struct FakeRegistry {
    root: RegistryNode,
    index: Option<u64>,
    streams: Mutex<Vec<mpsc::Sender<WatchEvent>>>,
    subscriptions: Mutex<Vec<Option<u64>>>,
    subscribe_failures: AtomicUsize,
}

#[allow(dead_code)]
impl FakeRegistry {
    pub fn new(root: RegistryNode) -> Self {
        Self {
            root,
            index: None,
            streams: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            subscribe_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_index(root: RegistryNode, index: u64) -> Self {
        let mut registry = Self::new(root);
        registry.index = Some(index);
        registry
    }

    /// Make the next `n` subscription attempts fail.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.subscribe_failures.store(n, Ordering::SeqCst);
    }

    /// Deliver an event on the most recent subscription.
    pub async fn emit(&self, event: WatchEvent) {
        let tx = self
            .streams
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no active subscription");
        tx.send(event).await.expect("stream closed");
    }

    /// End every open stream.
    pub fn kill_streams(&self) {
        self.streams.lock().unwrap().clear();
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// The `since` index of the most recent subscription.
    pub fn last_since(&self) -> Option<u64> {
        self.subscriptions.lock().unwrap().last().copied().flatten()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        Ok(Snapshot {
            root: self.root.clone(),
            index: self.index,
        })
    }

    async fn subscribe(&self, since: Option<u64>) -> Result<EventStream, RegistryError> {
        if self
            .subscribe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RegistryError::Api {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "registry down".to_string(),
            });
        }

        let (tx, stream) = EventStream::channel(16);
        self.subscriptions.lock().unwrap().push(since);
        self.streams.lock().unwrap().push(tx);
        Ok(stream)
    }
}
