//! Registry reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     snapshot.rs fetches the recursive tree
//!     → walks app/version/instance nodes
//!     → populates the routing table before traffic is accepted
//!
//! Steady state:
//!     watcher.rs subscribes to the change stream
//!     → applies create/delete/expire events to the table's pools
//!     → on stream failure waits a fixed delay and resubscribes, forever
//! ```
//!
//! # Design Decisions
//! - Structural tree errors at startup are fatal; bad leaves never are
//! - The watcher is the only mutator of pool membership after startup
//! - Resubscription resumes from the last applied index, so a reconnect
//!   neither replays nor drops registrations the registry still holds

pub mod snapshot;
pub mod watcher;

pub use snapshot::{load_snapshot, SnapshotError};
pub use watcher::RegistryWatcher;
