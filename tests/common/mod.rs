//! Shared fixtures for the election tests

#![allow(dead_code)]

use async_trait::async_trait;
use minielect::common::{Error, Result};
use minielect::election::{Backend, Event, GroupKey, LeaderCallbacks, Session};
use minielect::ElectionConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn config(group: &str, identity: &str) -> ElectionConfig {
    ElectionConfig {
        lease_duration_ms: 1_000,
        retry_period_ms: 100,
        renew_deadline_ms: 50,
        ..ElectionConfig::new(group, identity)
    }
}

/// Records every callback it receives.
#[derive(Default)]
pub struct Recorder {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub leaders: Mutex<Vec<String>>,
    pub events: Mutex<Vec<Event>>,
    pub started_token: Mutex<Option<CancellationToken>>,
    pub panic_on_new_leader: AtomicBool,
    pub panic_on_stopped_leading: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn leaders(&self) -> Vec<String> {
        self.leaders.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaderCallbacks for Recorder {
    async fn on_started_leading(&self, stop: CancellationToken) {
        self.started.fetch_add(1, Ordering::SeqCst);
        *self.started_token.lock().unwrap() = Some(stop);
    }

    fn on_stopped_leading(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_stopped_leading.load(Ordering::SeqCst) {
            panic!("stop callback blew up");
        }
    }

    fn on_new_leader(&self, identity: &str) {
        if self.panic_on_new_leader.load(Ordering::SeqCst) {
            panic!("callback blew up on {}", identity);
        }
        self.leaders.lock().unwrap().push(identity.to_string());
    }

    fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
struct Script {
    campaign_error: Option<String>,
    campaign_fatal: bool,
    campaign_blocks: bool,
    leader: Option<String>,
    leader_fails: bool,
    campaigns: usize,
    resigns: usize,
}

/// Backend whose answers are set by the test, one call at a time.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_leader(&self, leader: Option<&str>) {
        self.script.lock().unwrap().leader = leader.map(str::to_string);
    }

    pub fn fail_leader_queries(&self, fail: bool) {
        self.script.lock().unwrap().leader_fails = fail;
    }

    pub fn fail_campaigns(&self, reason: Option<&str>) {
        self.script.lock().unwrap().campaign_error = reason.map(str::to_string);
    }

    /// Campaigns fail with a session error, which is not transient.
    pub fn fail_campaigns_fatally(&self, reason: &str) {
        let mut script = self.script.lock().unwrap();
        script.campaign_error = Some(reason.to_string());
        script.campaign_fatal = true;
    }

    /// Campaigns never return, so only the renew deadline ends them.
    pub fn block_campaigns(&self, block: bool) {
        self.script.lock().unwrap().campaign_blocks = block;
    }

    pub fn campaigns(&self) -> usize {
        self.script.lock().unwrap().campaigns
    }

    pub fn resigns(&self) -> usize {
        self.script.lock().unwrap().resigns
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn open_session(&self, _key: &GroupKey, _lease_ttl: Duration) -> Result<Box<dyn Session>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Session for ScriptedBackend {
    async fn campaign(&self, _identity: &str) -> Result<()> {
        let (error, fatal, blocks) = {
            let mut script = self.script.lock().unwrap();
            script.campaigns += 1;
            (
                script.campaign_error.clone(),
                script.campaign_fatal,
                script.campaign_blocks,
            )
        };
        if blocks {
            std::future::pending::<()>().await;
        }
        match error {
            Some(reason) if fatal => Err(Error::Session(reason)),
            Some(reason) => Err(Error::Unavailable(reason)),
            None => Ok(()),
        }
    }

    async fn resign(&self) -> Result<()> {
        self.script.lock().unwrap().resigns += 1;
        Ok(())
    }

    async fn leader(&self) -> Result<Option<String>> {
        let script = self.script.lock().unwrap();
        if script.leader_fails {
            return Err(Error::Unavailable("leader query refused".into()));
        }
        Ok(script.leader.clone())
    }
}
