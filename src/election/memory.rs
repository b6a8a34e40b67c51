//! In-process coordination backend
//!
//! One slot per group key. A holder keeps the slot while it keeps
//! campaigning within its lease TTL; waiting campaigners are woken when the
//! slot is resigned, expired or force-expired. Faults can be injected to
//! exercise the elector's error paths.

use crate::common::{Error, Result};
use crate::election::backend::{Backend, GroupKey, Session};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Holder {
    session: Uuid,
    identity: String,
    expires_at: Instant,
}

struct Inner {
    slots: Mutex<HashMap<GroupKey, Holder>>,
    changes: watch::Sender<u64>,
    unavailable: AtomicBool,
    fail_sessions: AtomicBool,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<GroupKey, Holder>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory backend marked unavailable".into()));
        }
        Ok(())
    }
}

/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                changes,
                unavailable: AtomicBool::new(false),
                fail_sessions: AtomicBool::new(false),
            }),
        }
    }

    /// Make every session call fail with `Error::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
        self.inner.notify();
    }

    /// Make `open_session` fail.
    pub fn fail_sessions(&self, fail: bool) {
        self.inner.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Drop the current holder of `key` as if its lease ran out.
    pub fn expire(&self, key: &GroupKey) {
        if let Some(holder) = self.inner.slots().remove(key) {
            tracing::debug!(key = %key, identity = %holder.identity, "slot force-expired");
        }
        self.inner.notify();
    }

    /// Identity holding `key` right now, ignoring expired leases.
    pub fn holder(&self, key: &GroupKey) -> Option<String> {
        let now = Instant::now();
        self.inner
            .slots()
            .get(key)
            .filter(|h| h.expires_at > now)
            .map(|h| h.identity.clone())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn open_session(&self, key: &GroupKey, lease_ttl: Duration) -> Result<Box<dyn Session>> {
        if self.inner.fail_sessions.load(Ordering::SeqCst) {
            return Err(Error::Session(format!("cannot open session on {}", key)));
        }
        let session = MemorySession {
            inner: self.inner.clone(),
            key: key.clone(),
            id: Uuid::new_v4(),
            lease_ttl,
        };
        tracing::debug!(key = %key, session = %session.id, "session opened");
        Ok(Box::new(session))
    }
}

struct MemorySession {
    inner: Arc<Inner>,
    key: GroupKey,
    id: Uuid,
    lease_ttl: Duration,
}

#[async_trait]
impl Session for MemorySession {
    async fn campaign(&self, identity: &str) -> Result<()> {
        let mut changes = self.inner.changes.subscribe();
        loop {
            self.inner.check_available()?;

            let busy_until = {
                let mut slots = self.inner.slots();
                let now = Instant::now();
                match slots.get(&self.key) {
                    Some(holder) if holder.session != self.id && holder.expires_at > now => {
                        holder.expires_at
                    }
                    _ => {
                        let previous = slots.insert(
                            self.key.clone(),
                            Holder {
                                session: self.id,
                                identity: identity.to_string(),
                                expires_at: now + self.lease_ttl,
                            },
                        );
                        drop(slots);
                        if previous.map(|p| p.session) != Some(self.id) {
                            tracing::debug!(key = %self.key, identity, "slot acquired");
                            self.inner.notify();
                        }
                        return Ok(());
                    }
                }
            };

            tokio::select! {
                _ = changes.changed() => {}
                _ = tokio::time::sleep_until(busy_until) => {}
            }
        }
    }

    async fn resign(&self) -> Result<()> {
        self.inner.check_available()?;
        let mut slots = self.inner.slots();
        match slots.get(&self.key) {
            Some(holder) if holder.session == self.id => {
                slots.remove(&self.key);
                drop(slots);
                tracing::debug!(key = %self.key, "slot resigned");
                self.inner.notify();
                Ok(())
            }
            _ => Err(Error::NotCampaigning),
        }
    }

    async fn leader(&self) -> Result<Option<String>> {
        self.inner.check_available()?;
        let now = Instant::now();
        Ok(self
            .inner
            .slots()
            .get(&self.key)
            .filter(|h| h.expires_at > now)
            .map(|h| h.identity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const TTL: Duration = Duration::from_secs(5);

    fn key() -> GroupKey {
        GroupKey::new("test", "group")
    }

    #[tokio::test]
    async fn test_campaign_on_free_slot() {
        let backend = MemoryBackend::new();
        let session = backend.open_session(&key(), TTL).await.unwrap();

        assert_eq!(session.leader().await.unwrap(), None);
        assert_ok!(session.campaign("a").await);
        assert_eq!(session.leader().await.unwrap(), Some("a".to_string()));
        assert_eq!(backend.holder(&key()), Some("a".to_string()));

        // Re-campaigning while holding returns immediately
        assert_ok!(session.campaign("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_campaign_blocks_while_held() {
        let backend = MemoryBackend::new();
        let a = backend.open_session(&key(), TTL).await.unwrap();
        let b = backend.open_session(&key(), TTL).await.unwrap();

        assert_ok!(a.campaign("a").await);
        let blocked = tokio::time::timeout(Duration::from_secs(1), b.campaign("b")).await;
        assert!(blocked.is_err(), "b must wait while a holds the slot");
        assert_eq!(b.leader().await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resign_wakes_waiter() {
        let backend = MemoryBackend::new();
        let a = backend.open_session(&key(), TTL).await.unwrap();
        let b = backend.open_session(&key(), TTL).await.unwrap();
        assert_ok!(a.campaign("a").await);

        let waiter = tokio::spawn(async move {
            let campaigned = b.campaign("b").await;
            campaigned.map(|_| b)
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_ok!(a.resign().await);

        let b = waiter.await.unwrap().unwrap();
        assert_eq!(b.leader().await.unwrap(), Some("b".to_string()));
        assert!(matches!(a.resign().await, Err(Error::NotCampaigning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_expires_without_refresh() {
        let backend = MemoryBackend::new();
        let a = backend.open_session(&key(), TTL).await.unwrap();
        let b = backend.open_session(&key(), TTL).await.unwrap();
        assert_ok!(a.campaign("a").await);

        // b is granted the slot once a's lease runs out
        let started = Instant::now();
        assert_ok!(b.campaign("b").await);
        assert!(started.elapsed() >= TTL);
        assert_eq!(a.leader().await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_expire_frees_slot() {
        let backend = MemoryBackend::new();
        let a = backend.open_session(&key(), TTL).await.unwrap();
        assert_ok!(a.campaign("a").await);

        backend.expire(&key());
        assert_eq!(a.leader().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::new();
        let a = backend.open_session(&key(), TTL).await.unwrap();

        backend.set_unavailable(true);
        assert!(matches!(a.campaign("a").await, Err(Error::Unavailable(_))));
        assert_err!(a.leader().await);
        backend.set_unavailable(false);
        assert_ok!(a.campaign("a").await);

        backend.fail_sessions(true);
        assert!(matches!(
            backend.open_session(&key(), TTL).await,
            Err(Error::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let backend = MemoryBackend::new();
        let a = backend
            .open_session(&GroupKey::new("test", "one"), TTL)
            .await
            .unwrap();
        let b = backend
            .open_session(&GroupKey::new("test", "two"), TTL)
            .await
            .unwrap();

        assert_ok!(a.campaign("a").await);
        assert_ok!(b.campaign("b").await);
        assert_eq!(a.leader().await.unwrap(), Some("a".to_string()));
        assert_eq!(b.leader().await.unwrap(), Some("b".to_string()));
    }
}
