//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Host matched → routing table resolves WorkerPool
//!     → pool.rs (serialized add/remove/next over a command channel)
//!     → Return next worker in rotation, or none
//! ```
//!
//! # Design Decisions
//! - One actor task per pool; add/remove/next are totally ordered
//! - Pure round robin, no weighting, no skip-on-failure
//! - Bounded command channel gives callers backpressure for free

pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
pub use worker::WorkerDescriptor;
