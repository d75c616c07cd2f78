//! Cooperative shutdown plumbing
//!
//! One producer (the OS signal listener) flips a watch channel plus an
//! atomic flag; workers poll both non-blockingly at iteration boundaries.
//! In-flight database calls always run to completion; there is no
//! per-iteration cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared shutdown signal
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    need_to_exit: AtomicBool,
}

impl Shutdown {
    /// Fresh, untriggered signal
    pub fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(false);
        Arc::new(Shutdown {
            tx,
            need_to_exit: AtomicBool::new(false),
        })
    }

    /// Request shutdown; idempotent
    pub fn trigger(&self) {
        self.need_to_exit.store(true, Ordering::SeqCst);
        let _ = self.tx.send(true);
    }

    /// Non-blocking poll used at iteration boundaries
    pub fn is_triggered(&self) -> bool {
        self.need_to_exit.load(Ordering::SeqCst) || *self.tx.borrow()
    }

    /// Receiver for code that wants to await the flip
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Listen for SIGINT/SIGTERM and trigger the shared shutdown once.
///
/// The returned handle is detached by callers that outlive the run; abort
/// it when tearing the process down early.
pub fn install_signal_handler(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received; letting in-flight iterations finish");
        shutdown.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_visible_and_idempotent() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn subscribers_observe_the_flip() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert!(!*rx.borrow());
        shutdown.trigger();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
