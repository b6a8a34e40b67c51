//! Leader election over a coordination backend
//!
//! - [`Backend`] / [`Session`]: the campaign, resign and leader primitives
//! - [`MemoryBackend`]: in-process backend for tests and demos
//! - [`Elector`]: the renewal loop and leadership tracking
//! - [`LeaderCallbacks`]: lifecycle hooks

pub mod backend;
pub mod callbacks;
pub mod elector;
pub mod memory;

pub use backend::{Backend, GroupKey, Session};
pub use callbacks::{Callbacks, Event, LeaderCallbacks, NoopCallbacks};
pub use elector::{run_or_die, Elector};
pub use memory::MemoryBackend;
