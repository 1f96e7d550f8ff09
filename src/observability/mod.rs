//! Observability subsystem.
//!
//! # Responsibilities
//! - Prometheus metrics exposition
//! - Request and registry-watch counters
//!
//! Log initialization lives in `main`; everything here assumes `tracing`
//! is already wired up.

pub mod metrics;
