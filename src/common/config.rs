//! Configuration for minielect

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix used to build the group key when none is configured
pub const DEFAULT_PREFIX: &str = "election";

/// Environment variable prefix, e.g. `MINIELECT_ELECTION__GROUP=workers`
const ENV_PREFIX: &str = "MINIELECT";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Election policy
    #[serde(default)]
    pub election: ElectionConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            election: ElectionConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `minielect.toml` in the working directory (if present),
    /// then the environment.
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Load from an explicit TOML file, then the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("minielect").required(false),
        };
        let mut config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        if config.log_level.is_empty() {
            config.log_level = default_log_level();
        }
        Ok(config)
    }
}

/// Election policy for a single contender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Namespace prefix of the group key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Contended group; all identities in a group compete for one slot
    #[serde(default)]
    pub group: String,

    /// Unique name of this contender within the group
    #[serde(default)]
    pub identity: String,

    /// Session lease TTL, also bounds leader queries and resign
    #[serde(default = "default_lease_duration")]
    pub lease_duration_ms: u64,

    /// Interval between campaign attempts
    #[serde(default = "default_retry_period")]
    pub retry_period_ms: u64,

    /// Per-attempt campaign timeout
    #[serde(default = "default_renew_deadline")]
    pub renew_deadline_ms: u64,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}
fn default_lease_duration() -> u64 {
    15_000
}
fn default_retry_period() -> u64 {
    2_000
}
fn default_renew_deadline() -> u64 {
    10_000
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            group: String::new(),
            identity: String::new(),
            lease_duration_ms: default_lease_duration(),
            retry_period_ms: default_retry_period(),
            renew_deadline_ms: default_renew_deadline(),
        }
    }
}

impl ElectionConfig {
    pub fn new(group: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            identity: identity.into(),
            ..Default::default()
        }
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_millis(self.retry_period_ms)
    }

    pub fn renew_deadline(&self) -> Duration {
        Duration::from_millis(self.renew_deadline_ms)
    }

    /// Prefix with the default applied
    pub fn effective_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            DEFAULT_PREFIX
        } else {
            &self.prefix
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.group.is_empty() {
            return Err(Error::InvalidConfig("group must not be empty".into()));
        }
        if self.identity.is_empty() {
            return Err(Error::InvalidConfig("identity must not be empty".into()));
        }
        if self.group.contains('/') || self.prefix.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "prefix and group must not contain '/': {}/{}",
                self.prefix, self.group
            )));
        }
        for (name, value) in [
            ("lease_duration_ms", self.lease_duration_ms),
            ("retry_period_ms", self.retry_period_ms),
            ("renew_deadline_ms", self.renew_deadline_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}
