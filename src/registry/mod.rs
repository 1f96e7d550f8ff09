//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! etcd v2 keys API
//!     → client.rs (recursive snapshot, long-poll subscription)
//!     → types.rs (RegistryNode tree, WatchEvent stream)
//!     → codec.rs (leaf payload → WorkerDescriptor)
//! ```
//!
//! # Design Decisions
//! - Client is a trait so tests run against an in-process fake
//! - Subscriptions end on failure; reconnection belongs to the watcher
//! - Unknown event actions deserialize (and are ignored) instead of
//!   poisoning the stream

pub mod client;
pub mod codec;
pub mod types;

pub use client::{EventStream, HttpRegistryClient, RegistryClient, RegistryError, Snapshot};
pub use codec::{decode_worker, DecodeError};
pub use types::{EventAction, RegistryNode, WatchEvent};
