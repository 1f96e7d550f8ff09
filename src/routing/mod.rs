//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry key ("/api/myapp/v1/inst1")
//!     → domain.rs (derive routing domain, e.g. "v1.myapp.api.dev:1080")
//!     → table.rs (domain → WorkerPool)
//!
//! Incoming Request (Host header)
//!     → table.rs (exact-match lookup)
//!     → WorkerPool (round-robin selection)
//! ```
//!
//! # Design Decisions
//! - Host matching is an exact string compare, port included
//! - Pools are created on first observation of a domain, never destroyed
//! - Table writes (watcher) and reads (dispatch) synchronize via sharded locks

pub mod domain;
pub mod table;

pub use domain::{key_to_domain, DomainScheme};
pub use table::RoutingTable;
