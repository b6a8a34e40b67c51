//! Lifecycle callbacks and election events

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Emitted when a campaign fails for a reason other than its deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub group: String,
    pub identity: String,
    pub renew_time: DateTime<Utc>,
    pub acquire_time: DateTime<Utc>,
    pub reason: String,
}

/// Hooks fired by an [`Elector`](crate::election::Elector).
///
/// Every method defaults to a no-op. All but `on_started_leading` run on
/// the renewal loop, so they should return quickly; a panic in any of them
/// is logged and then tears the loop down.
#[async_trait]
pub trait LeaderCallbacks: Send + Sync {
    /// Runs on its own task when the election loop starts. `stop` is
    /// cancelled when the elector is released.
    async fn on_started_leading(&self, _stop: CancellationToken) {}

    /// The elector stopped, either released or torn down by a panic.
    fn on_stopped_leading(&self) {}

    /// A leader different from the previously observed one was seen,
    /// including the first leader observed.
    fn on_new_leader(&self, _identity: &str) {}

    /// A campaign failed with a backend error.
    fn on_event(&self, _event: &Event) {}
}

/// Callbacks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl LeaderCallbacks for NoopCallbacks {}

type StartedFn = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;
type StoppedFn = Arc<dyn Fn() + Send + Sync>;
type NewLeaderFn = Arc<dyn Fn(&str) + Send + Sync>;
type EventFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// [`LeaderCallbacks`] assembled from closures; unset hooks are no-ops.
///
/// ```
/// use minielect::election::Callbacks;
///
/// let callbacks = Callbacks::new()
///     .with_new_leader(|identity| println!("new leader: {}", identity))
///     .with_stopped_leading(|| println!("stopped"));
/// ```
#[derive(Clone, Default)]
pub struct Callbacks {
    started: Option<StartedFn>,
    stopped: Option<StoppedFn>,
    new_leader: Option<NewLeaderFn>,
    event: Option<EventFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_started_leading<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.started = Some(Arc::new(move |stop| -> BoxFuture<'static, ()> {
            Box::pin(f(stop))
        }));
        self
    }

    pub fn with_stopped_leading<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.stopped = Some(Arc::new(f));
        self
    }

    pub fn with_new_leader<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.new_leader = Some(Arc::new(f));
        self
    }

    pub fn with_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.event = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl LeaderCallbacks for Callbacks {
    async fn on_started_leading(&self, stop: CancellationToken) {
        if let Some(started) = &self.started {
            started(stop).await;
        }
    }

    fn on_stopped_leading(&self) {
        if let Some(stopped) = &self.stopped {
            stopped();
        }
    }

    fn on_new_leader(&self, identity: &str) {
        if let Some(new_leader) = &self.new_leader {
            new_leader(identity);
        }
    }

    fn on_event(&self, event: &Event) {
        if let Some(on_event) = &self.event {
            on_event(event);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_started_leading", &self.started.is_some())
            .field("on_stopped_leading", &self.stopped.is_some())
            .field("on_new_leader", &self.new_leader.is_some())
            .field("on_event", &self.event.is_some())
            .finish()
    }
}
