//! # minielect
//!
//! Leader election for groups of process instances on top of a
//! consensus-backed coordination store:
//! - One leader per group, arbitrated by the backend's campaign primitive
//! - Continuous renewal and leader-change detection on a fixed retry period
//! - Lifecycle callbacks (started, stopped, new leader, backend events)
//! - Idempotent release with best-effort resign
//! - Panics in the loop are logged and rethrown, never swallowed
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │           Elector            │
//! │  renewal loop (wait::keep)   │──── callbacks ───▶ caller
//! │   campaign → leader query    │
//! └──────────────┬───────────────┘
//!                │ Session (campaign / resign / leader)
//!        ┌───────▼────────┐
//!        │    Backend     │  etcd-style store, or MemoryBackend
//!        └────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use minielect::election::{Callbacks, Elector, MemoryBackend};
//! use minielect::ElectionConfig;
//! use std::sync::Arc;
//!
//! # async fn demo() -> minielect::Result<()> {
//! let backend = MemoryBackend::new();
//! let callbacks = Callbacks::new().with_new_leader(|id| println!("leader is {}", id));
//! let elector = Arc::new(
//!     Elector::new(ElectionConfig::new("workers", "node-1"), &backend, Arc::new(callbacks)).await?,
//! );
//!
//! let running = elector.clone();
//! let loop_handle = tokio::spawn(async move { running.run().await });
//! // ... later
//! elector.release().await;
//! let _ = loop_handle.await;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod election;
pub mod runtime;
pub mod wait;

// Re-export commonly used types
pub use common::{Config, ElectionConfig, Error, Result};
pub use election::{Elector, LeaderCallbacks};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
