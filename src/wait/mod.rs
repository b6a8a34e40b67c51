//! Scheduling primitives
//!
//! - [`keep`]: run an action repeatedly until a stop token fires
//! - [`until`]: poll a predicate on its own task until it holds
//! - [`Group`]: spawn tasks and wait for all of them
//! - [`signal`]: block until an OS signal arrives

pub mod group;
pub mod signal;

pub use group::Group;
pub use signal::shutdown_signal;
#[cfg(unix)]
pub use signal::signal;

use crate::common::Error;
use crate::runtime::CrashHandler;
use std::future::Future;
use std::panic;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Run `action` every `period` until `stop` is cancelled.
///
/// With `initial_delay` false the first run happens immediately, otherwise
/// after one `period`. Runs are serialized on the calling task and the next
/// wait starts when the previous run completes (fixed delay, not fixed rate).
/// A single timer is reset after every run, so a slow run never leaves a
/// stale deadline behind.
///
/// `stop` is checked before each run and raced against every wait. A panic
/// inside `action` goes through `crash` and then continues unwinding out of
/// this call.
pub async fn keep<F, Fut>(
    mut action: F,
    period: Duration,
    initial_delay: bool,
    stop: &CancellationToken,
    crash: &CrashHandler,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let timer = tokio::time::sleep(period);
    tokio::pin!(timer);

    loop {
        if !initial_delay {
            if stop.is_cancelled() {
                return;
            }
            crash.guard_async(action()).await;
            timer.as_mut().reset(Instant::now() + period);
        }

        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = &mut timer => {}
        }

        if initial_delay {
            if stop.is_cancelled() {
                return;
            }
            crash.guard_async(action()).await;
            timer.as_mut().reset(Instant::now() + period);
        }
    }
}

/// Evaluate `condition` on a separate task until it returns `Ok(true)` or
/// an error, and hand that outcome back to the caller.
///
/// A panic in `condition` is re-raised here.
pub async fn until<F, Fut, E>(mut condition: F) -> Result<(), E>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool, E>> + Send,
    E: From<Error> + Send + 'static,
{
    let poller = tokio::spawn(async move {
        loop {
            match condition().await {
                Ok(true) => return Ok(()),
                Ok(false) => tokio::task::yield_now().await,
                Err(e) => return Err(e),
            }
        }
    });

    match poller.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(Error::Internal(format!("poll task cancelled: {}", e)).into()),
    }
}
