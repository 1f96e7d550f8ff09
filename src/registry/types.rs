//! Wire types for the etcd v2 keys API.

use serde::Deserialize;

/// A node in the registry tree.
///
/// Directories carry `nodes`; leaves carry `value`. `modified_index` orders
/// events and drives watch resumption.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryNode {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub dir: bool,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub nodes: Vec<RegistryNode>,

    #[serde(rename = "modifiedIndex", default)]
    pub modified_index: u64,
}

/// Action reported by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventAction {
    Get,
    Set,
    Create,
    Update,
    Delete,
    Expire,
    CompareAndSwap,
    CompareAndDelete,
    /// Any action this proxy does not know about. Ignored by the watcher.
    #[serde(other)]
    Other,
}

/// One change event from the registry's watch stream.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    pub action: EventAction,
    pub node: RegistryNode,
}
