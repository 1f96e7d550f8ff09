//! Live reconciliation against the registry change stream.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::registry::{decode_worker, EventAction, RegistryClient, WatchEvent};
use crate::routing::{DomainScheme, RoutingTable};

/// Applies registry change events to the routing table for the lifetime of
/// the process, resubscribing after a fixed delay whenever the stream fails.
pub struct RegistryWatcher<R> {
    client: Arc<R>,
    table: Arc<RoutingTable>,
    scheme: DomainScheme,
    retry_interval: Duration,
    /// Index to resume the subscription after. Advanced per applied event.
    since: Option<u64>,
}

impl<R: RegistryClient> RegistryWatcher<R> {
    pub fn new(
        client: Arc<R>,
        table: Arc<RoutingTable>,
        scheme: DomainScheme,
        retry_interval: Duration,
        since: Option<u64>,
    ) -> Self {
        Self {
            client,
            table,
            scheme,
            retry_interval,
            since,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let mut stream = tokio::select! {
                result = self.client.subscribe(self.since) => match result {
                    Ok(stream) => stream,
                    Err(error) => {
                        tracing::warn!(error = %error, "registry subscription failed");
                        if !self.wait_before_retry(&mut shutdown).await {
                            return;
                        }
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("registry watcher stopping");
                    return;
                }
            };

            tracing::info!(since = ?self.since, "watching registry for changes");

            loop {
                tokio::select! {
                    event = stream.next() => match event {
                        Some(event) => self.apply(event).await,
                        None => break,
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("registry watcher stopping");
                        return;
                    }
                }
            }

            tracing::warn!("registry change stream ended");
            if !self.wait_before_retry(&mut shutdown).await {
                return;
            }
        }
    }

    /// Sleep out the reconnect delay. Returns `false` when shutdown fired
    /// during the wait.
    async fn wait_before_retry(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        metrics::record_registry_reconnect();
        let delay = jittered(self.retry_interval);
        tracing::info!(delay_ms = delay.as_millis() as u64, "resubscribing after delay");
        tokio::select! {
            _ = time::sleep(delay) => true,
            _ = shutdown.recv() => false,
        }
    }

    async fn apply(&mut self, event: WatchEvent) {
        if event.node.modified_index > 0 {
            self.since = Some(event.node.modified_index + 1);
        }
        if event.node.dir {
            // Directory-level changes carry no worker data.
            return;
        }

        let Some(domain) = self.scheme.domain_for(&event.node.key) else {
            tracing::warn!(key = %event.node.key, "ignoring event with shallow key");
            return;
        };

        match event.action {
            EventAction::Create => {
                metrics::record_registry_event("create");
                let raw = event.node.value.as_deref().unwrap_or_default();
                match decode_worker(&event.node.key, raw) {
                    Ok(worker) => {
                        tracing::info!(
                            domain = %domain,
                            key = %event.node.key,
                            url = %worker.url,
                            "registered worker"
                        );
                        self.table.pool(&domain).add(worker).await;
                    }
                    Err(error) => {
                        tracing::warn!(
                            key = %event.node.key,
                            error = %error,
                            "failed to register worker"
                        );
                    }
                }
            }
            EventAction::Delete | EventAction::Expire => {
                metrics::record_registry_event("delete");
                // An unknown domain means there is nothing to remove.
                if let Some(pool) = self.table.lookup(&domain) {
                    tracing::info!(domain = %domain, key = %event.node.key, "deregistered worker");
                    pool.remove(&event.node.key).await;
                }
            }
            _ => {}
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let jitter_range = delay.as_millis() as u64 / 10;
    if jitter_range == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_range))
}
