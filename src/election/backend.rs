//! Coordination backend contract
//!
//! The elector only needs three session-scoped primitives from the
//! consensus store: campaign, resign and leader. Deadlines are applied by
//! the caller, so implementations may block for as long as they like and
//! must tolerate being dropped mid-call.

use crate::common::{Result, DEFAULT_PREFIX};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Key of the contended resource in the backend namespace, `/<prefix>/<group>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(prefix: &str, group: &str) -> Self {
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX
        } else {
            prefix
        };
        Self(format!("/{}/{}", prefix, group))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection to the coordination store, shared by every elector built on it.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Establish a lease-backed session contending for `key`.
    async fn open_session(&self, key: &GroupKey, lease_ttl: Duration) -> Result<Box<dyn Session>>;
}

/// One contender's session on a group key.
#[async_trait]
pub trait Session: Send + Sync {
    /// Block until this session holds the key under `identity`.
    ///
    /// Calling it while already holding succeeds immediately and refreshes
    /// the lease.
    async fn campaign(&self, identity: &str) -> Result<()>;

    /// Give up the key. Fails with `Error::NotCampaigning` when not holding.
    async fn resign(&self) -> Result<()>;

    /// Identity currently holding the key, `None` if nobody does.
    async fn leader(&self) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key() {
        assert_eq!(GroupKey::new("jobs", "scheduler").as_str(), "/jobs/scheduler");
        assert_eq!(GroupKey::new("", "scheduler").to_string(), "/election/scheduler");
    }
}
