//! Domain → worker pool table.

use dashmap::DashMap;

use crate::load_balancer::WorkerPool;

/// Shared routing table mapping a routing domain to its worker pool.
///
/// Read by the dispatch path on every request and written by the snapshot
/// loader and the registry watcher. The sharded map guarantees at most one
/// pool ever exists per domain: `pool()` resolves get-or-create atomically.
#[derive(Debug, Default)]
pub struct RoutingTable {
    domains: DashMap<String, WorkerPool>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool for `domain`, created empty if this is the first observation.
    pub fn pool(&self, domain: &str) -> WorkerPool {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(WorkerPool::spawn)
            .clone()
    }

    /// Pool for `domain` if one exists. Dispatch uses this; an unknown
    /// domain is a routing miss, not a reason to grow the table.
    pub fn lookup(&self, domain: &str) -> Option<WorkerPool> {
        self.domains.get(domain).map(|pool| pool.clone())
    }

    /// Number of domains observed so far.
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::WorkerDescriptor;
    use url::Url;

    #[tokio::test]
    async fn test_pool_is_created_once() {
        let table = RoutingTable::new();
        let writer = table.pool("v1.myapp.api.dev:1080");
        writer
            .add(WorkerDescriptor::new(
                "/api/myapp/v1/i1",
                Url::parse("http://127.0.0.1:9000").unwrap(),
                false,
                "",
            ))
            .await;

        // A later resolve must address the same pool, not a fresh one.
        let reader = table.pool("v1.myapp.api.dev:1080");
        assert_eq!(reader.next().await.unwrap().key, "/api/myapp/v1/i1");
        assert_eq!(table.domain_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_does_not_create() {
        let table = RoutingTable::new();
        assert!(table.lookup("v9.ghost.api.dev:1080").is_none());
        assert_eq!(table.domain_count(), 0);
    }
}
