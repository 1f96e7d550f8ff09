//! Initial routing table population from a registry snapshot.

use thiserror::Error;

use crate::registry::{decode_worker, RegistryClient, RegistryError, RegistryNode};
use crate::routing::{DomainScheme, RoutingTable};

/// Startup-fatal snapshot failures. A structurally invalid tree leaves no
/// safe partial-service fallback, so the process must not begin serving.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("registry node '{0}' is not a directory")]
    NotADirectory(String),

    #[error("registry key '{0}' is too shallow to derive a routing domain")]
    ShallowKey(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Fetch the registry subtree and populate the routing table from it.
///
/// Returns the index the change watcher should resume after, when the
/// registry reported one.
pub async fn load_snapshot<R: RegistryClient>(
    client: &R,
    scheme: &DomainScheme,
    table: &RoutingTable,
) -> Result<Option<u64>, SnapshotError> {
    let snapshot = client.snapshot().await?;
    walk_tree(&snapshot.root, scheme, table).await?;
    Ok(snapshot.index)
}

/// Walk root → application → version → instance, registering every leaf that
/// decodes. Decode failures are logged and skipped, matching the live-update
/// policy.
async fn walk_tree(
    root: &RegistryNode,
    scheme: &DomainScheme,
    table: &RoutingTable,
) -> Result<(), SnapshotError> {
    if !root.dir {
        return Err(SnapshotError::NotADirectory(root.key.clone()));
    }

    for app in &root.nodes {
        if !app.dir {
            return Err(SnapshotError::NotADirectory(app.key.clone()));
        }

        for version in &app.nodes {
            if !version.dir {
                return Err(SnapshotError::NotADirectory(version.key.clone()));
            }
            let domain = scheme
                .domain_for(&version.key)
                .ok_or_else(|| SnapshotError::ShallowKey(version.key.clone()))?;
            let pool = table.pool(&domain);

            for instance in &version.nodes {
                if instance.dir {
                    // Only leaf nodes carry worker data.
                    tracing::debug!(key = %instance.key, "skipping directory at instance level");
                    continue;
                }
                let raw = instance.value.as_deref().unwrap_or_default();
                match decode_worker(&instance.key, raw) {
                    Ok(worker) => {
                        tracing::info!(
                            domain = %domain,
                            key = %instance.key,
                            url = %worker.url,
                            "registered worker"
                        );
                        pool.add(worker).await;
                    }
                    Err(error) => {
                        tracing::warn!(
                            key = %instance.key,
                            error = %error,
                            "failed to register worker"
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
