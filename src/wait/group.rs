//! Wait group over spawned tasks

use std::future::Future;
use std::panic;
use tokio::task::JoinSet;

/// Spawns tasks and waits for all of them to finish.
///
/// If a task panics, [`Group::wait`] re-raises the panic and the tasks still
/// running are aborted when the group is dropped.
#[derive(Default)]
pub struct Group {
    tasks: JoinSet<()>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    panic::resume_unwind(e.into_panic());
                }
                tracing::warn!("task in wait group cancelled: {}", e);
            }
        }
    }
}
