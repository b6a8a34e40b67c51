//! Leader elector
//!
//! An [`Elector`] contends for the leader slot of one group. Its renewal
//! loop campaigns on every tick, whether or not it already leads, then asks
//! the backend who the leader is and fires `on_new_leader` when that
//! changes. Backend failures are retried forever at the retry period.
//!
//! ```text
//!   Idle ──run()──▶ Acquiring ◀──▶ Leading
//!                       │             │
//!                       └─release()───┴──▶ Stopped
//! ```
//!
//! Acquiring and Leading are not stored; [`Elector::is_leader`] compares the
//! last observed leader with our identity.

use crate::common::{ElectionConfig, Error, Result};
use crate::election::backend::{Backend, GroupKey, Session};
use crate::election::callbacks::{Event, LeaderCallbacks};
use crate::runtime::CrashHandler;
use crate::wait;
use chrono::Utc;
use futures_util::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Elector {
    config: ElectionConfig,
    key: GroupKey,
    session: Box<dyn Session>,
    callbacks: Arc<dyn LeaderCallbacks>,
    crash: CrashHandler,
    /// Last identity observed as leader, empty when unknown
    current_leader: RwLock<String>,
    /// Serializes leader notifications with the stop notification
    notify: Mutex<()>,
    stop: CancellationToken,
    released: AtomicBool,
    stopped_fired: AtomicBool,
}

impl Elector {
    /// Validate `config` and open a session on the group key.
    pub async fn new(
        config: ElectionConfig,
        backend: &dyn Backend,
        callbacks: Arc<dyn LeaderCallbacks>,
    ) -> Result<Self> {
        config.validate()?;
        if config.retry_period() >= config.lease_duration() {
            warn!(
                retry_period_ms = config.retry_period_ms,
                lease_duration_ms = config.lease_duration_ms,
                "retry period is not shorter than the lease, leadership will flap"
            );
        }

        let key = GroupKey::new(config.effective_prefix(), &config.group);
        let session = backend.open_session(&key, config.lease_duration()).await?;

        Ok(Self {
            config,
            key,
            session,
            callbacks,
            crash: CrashHandler::new(),
            current_leader: RwLock::new(String::new()),
            notify: Mutex::new(()),
            stop: CancellationToken::new(),
            released: AtomicBool::new(false),
            stopped_fired: AtomicBool::new(false),
        })
    }

    /// Replace the default log-then-rethrow crash handler.
    pub fn with_crash_handler(mut self, crash: CrashHandler) -> Self {
        self.crash = crash;
        self
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Token cancelled by [`Elector::release`]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run the election loop until [`Elector::release`] is called.
    ///
    /// `on_started_leading` is spawned on entry. `on_stopped_leading` fires
    /// when the loop exits, unless `release` already fired it. A panic in
    /// the loop or in a loop-side callback is logged by the crash handler
    /// and then resumes out of this call.
    pub async fn run(&self) {
        info!(
            group = %self.config.group,
            identity = %self.config.identity,
            key = %self.key,
            "starting election loop"
        );

        let callbacks = self.callbacks.clone();
        let crash = self.crash.clone();
        let leading = self.stop.child_token();
        tokio::spawn(async move {
            crash
                .guard_async(callbacks.on_started_leading(leading))
                .await;
        });

        let outcome = AssertUnwindSafe(self.renew()).catch_unwind().await;
        self.fire_stopped();
        if let Err(payload) = outcome {
            // Already reported by the crash handler inside the loop
            panic::resume_unwind(payload);
        }
        info!(group = %self.config.group, identity = %self.config.identity, "election loop stopped");
    }

    async fn renew(&self) {
        wait::keep(
            move || self.renew_once(),
            self.config.retry_period(),
            false,
            &self.stop,
            &self.crash,
        )
        .await;
    }

    async fn renew_once(&self) {
        // Acquire and renew share one tick; leader detection below is what
        // drives the callbacks, so the campaign outcome is not consulted.
        let _ = self.try_acquire_or_renew().await;

        match self.get_leader().await {
            Ok(leader) => self.observe_leader(leader),
            Err(e) => debug!(
                group = %self.config.group,
                identity = %self.config.identity,
                error = %e,
                "leader query failed, keeping last observed leader"
            ),
        }
    }

    fn observe_leader(&self, leader: String) {
        // Held through the callback so a racing release fires
        // on_stopped_leading strictly after it.
        let _notify = self.notify.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = self.write_leader();
        // Release clears the cache after cancelling; never repopulate it.
        if self.stop.is_cancelled() || *current == leader {
            return;
        }
        info!(
            group = %self.config.group,
            identity = %self.config.identity,
            previous = %current,
            leader = %leader,
            "observed new leader"
        );
        *current = leader.clone();
        drop(current);
        self.callbacks.on_new_leader(&leader);
    }

    /// One bounded campaign for our identity.
    ///
    /// Returns true when the backend affirmed us. A campaign that runs out
    /// its renew deadline is ordinary contention and stays silent; any
    /// other failure is reported through `on_event`.
    pub async fn try_acquire_or_renew(&self) -> bool {
        let now = Utc::now();
        let deadline = self.config.renew_deadline();

        let outcome = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return false,
            outcome = tokio::time::timeout(deadline, self.session.campaign(&self.config.identity)) => {
                outcome.unwrap_or(Err(Error::DeadlineExceeded(deadline)))
            }
        };

        match outcome {
            Ok(()) => {
                debug!(group = %self.config.group, identity = %self.config.identity, "campaign succeeded");
                true
            }
            Err(e) if e.is_deadline() => {
                debug!(group = %self.config.group, identity = %self.config.identity, "campaign deadline exceeded");
                false
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        group = %self.config.group,
                        identity = %self.config.identity,
                        error = %e,
                        "campaign failed"
                    );
                } else {
                    error!(
                        group = %self.config.group,
                        identity = %self.config.identity,
                        error = %e,
                        "campaign failed with a non-transient error"
                    );
                }
                self.callbacks.on_event(&Event {
                    group: self.config.group.clone(),
                    identity: self.config.identity.clone(),
                    renew_time: now,
                    acquire_time: now,
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Ask the backend who leads, bounded by the lease duration.
    pub async fn get_leader(&self) -> Result<String> {
        let deadline = self.config.lease_duration();
        match tokio::time::timeout(deadline, self.session.leader()).await {
            Err(_) => Err(Error::DeadlineExceeded(deadline)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(Some(leader))) if !leader.is_empty() => Ok(leader),
            Ok(Ok(_)) => Err(Error::NoLeaderElected),
        }
    }

    /// Whether the last observed leader is us.
    pub fn is_leader(&self) -> bool {
        *self.read_leader() == self.config.identity
    }

    /// Last observed leader, if any
    pub fn current_leader(&self) -> Option<String> {
        let current = self.read_leader();
        if current.is_empty() {
            None
        } else {
            Some(current.clone())
        }
    }

    /// Stop the loop, fire `on_stopped_leading` and resign.
    ///
    /// Only the first call has an effect. Resigning is best effort: a
    /// failure is logged, never retried.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!(identity = %self.config.identity, "elector already released");
            return;
        }
        self.stop.cancel();
        {
            let _notify = self.notify.lock().unwrap_or_else(|e| e.into_inner());
            self.write_leader().clear();
            self.fire_stopped();
        }

        let deadline = self.config.lease_duration();
        match tokio::time::timeout(deadline, self.session.resign()).await {
            Ok(Ok(())) => info!(group = %self.config.group, identity = %self.config.identity, "resigned leadership"),
            Ok(Err(Error::NotCampaigning)) => {
                debug!(identity = %self.config.identity, "nothing to resign")
            }
            Ok(Err(e)) => warn!(identity = %self.config.identity, error = %e, "resign failed"),
            Err(_) => warn!(identity = %self.config.identity, ?deadline, "resign deadline exceeded"),
        }
    }

    fn fire_stopped(&self) {
        if !self.stopped_fired.swap(true, Ordering::SeqCst) {
            self.crash.guard(|| self.callbacks.on_stopped_leading());
        }
    }

    fn read_leader(&self) -> RwLockReadGuard<'_, String> {
        self.current_leader.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_leader(&self) -> RwLockWriteGuard<'_, String> {
        self.current_leader.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build an elector and run it until `shutdown` is cancelled, then release.
///
/// # Panics
///
/// Panics if the elector cannot be built; also resumes any panic raised by
/// the election loop after releasing.
pub async fn run_or_die(
    config: ElectionConfig,
    backend: &dyn Backend,
    callbacks: Arc<dyn LeaderCallbacks>,
    shutdown: CancellationToken,
) {
    let elector = match Elector::new(config, backend, callbacks).await {
        Ok(elector) => elector,
        Err(e) => panic!("failed to create elector: {}", e),
    };

    let outcome = {
        let run = AssertUnwindSafe(elector.run()).catch_unwind();
        tokio::pin!(run);
        tokio::select! {
            outcome = &mut run => outcome,
            _ = shutdown.cancelled() => {
                elector.release().await;
                run.await
            }
        }
    };

    elector.release().await;
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}
