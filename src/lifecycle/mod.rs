//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main): config → snapshot load → watcher → listener
//! Shutdown: SIGINT/SIGTERM → Shutdown::trigger → tasks drain and exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
