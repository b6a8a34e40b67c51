//! Waiting for process signals

use crate::common::Result;
#[cfg(unix)]
use {
    crate::common::Error,
    crate::wait::until,
    std::sync::Arc,
    tokio::signal::unix::{self, SignalKind},
    tokio::sync::{mpsc, Mutex},
    tokio::task::JoinSet,
};

/// Block until one of `kinds` is delivered to the process.
///
/// The per-signal listeners are aborted when this returns.
#[cfg(unix)]
pub async fn signal(kinds: &[SignalKind]) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut listeners = JoinSet::new();
    for &kind in kinds {
        let mut stream = unix::signal(kind)?;
        let tx = tx.clone();
        listeners.spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(kind).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let rx = Arc::new(Mutex::new(rx));
    let received = until(move || {
        let rx = rx.clone();
        async move {
            match rx.lock().await.recv().await {
                Some(kind) => {
                    tracing::info!("received signal {:?}", kind);
                    Ok(true)
                }
                None => Err(Error::Internal("no signal to wait for".into())),
            }
        }
    })
    .await;

    listeners.shutdown().await;
    received
}

/// SIGHUP, SIGINT or SIGTERM
#[cfg(unix)]
pub async fn shutdown_signal() -> Result<()> {
    signal(&[
        SignalKind::hangup(),
        SignalKind::interrupt(),
        SignalKind::terminate(),
    ])
    .await
}

/// Ctrl-C
#[cfg(not(unix))]
pub async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c");
    Ok(())
}
