//! Crash handling for background loops
//!
//! A [`CrashHandler`] is the "log then rethrow" policy applied to panics
//! raised inside scheduled work. The panic is always logged, then every
//! extra handler sees the payload, then the unwind resumes so the failure
//! reaches whoever owns the task. Nothing here swallows a panic.

use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Payload carried by an unwinding panic
pub type PanicPayload = Box<dyn Any + Send + 'static>;

type Handler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[derive(Clone, Default)]
pub struct CrashHandler {
    handlers: Vec<Handler>,
}

impl CrashHandler {
    /// Handler that only logs before rethrowing
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` after the panic is logged and before it is rethrown.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Log `payload`, notify the extra handlers and resume unwinding.
    pub fn handle(&self, payload: PanicPayload) -> ! {
        tracing::error!(
            panic = panic_message(payload.as_ref()),
            "[PANIC] recovered panic, rethrowing"
        );
        for handler in &self.handlers {
            handler(payload.as_ref());
        }
        panic::resume_unwind(payload)
    }

    /// Run `f`, routing a panic through [`CrashHandler::handle`].
    pub fn guard<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => value,
            Err(payload) => self.handle(payload),
        }
    }

    /// Async counterpart of [`CrashHandler::guard`].
    pub async fn guard_async<Fut>(&self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => value,
            Err(payload) => self.handle(payload),
        }
    }
}

impl fmt::Debug for CrashHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrashHandler")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
