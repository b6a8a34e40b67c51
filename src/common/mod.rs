//! Common utilities and types shared across minielect

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, ElectionConfig, DEFAULT_PREFIX};
pub use error::{Error, Result};
pub use utils::{duration_to_millis, parse_duration, random_identity};
