use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ShutdownSignal
// ---------------------------------------------------------------------------

/// Cooperative stop signal for background loops.
///
/// The stop flag is a `watch` value, so a listener that subscribes after
/// `trigger()` still observes it. Loops confirm they have exited via
/// [`ShutdownGuard`] and the owner waits with [`ShutdownSignal::wait_for_drain`].
///
/// ```ignore
/// let shutdown = ShutdownSignal::new();
/// let mut stop = shutdown.subscribe();
/// let _guard = shutdown.guard();
///
/// tokio::select! {
///     _ = stop.recv() => { /* leave the loop */ }
///     _ = ticker.tick() => {}
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    stop_tx: Arc<watch::Sender<bool>>,
    drained_tx: Arc<watch::Sender<usize>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (drained_tx, _) = watch::channel(0);
        Self {
            stop_tx: Arc::new(stop_tx),
            drained_tx: Arc::new(drained_tx),
        }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.stop_tx.subscribe(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Idempotent: the second call only logs.
    pub fn trigger(&self) {
        let first = self.stop_tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if first {
            info!("shutdown signal triggered");
        } else {
            warn!("shutdown already triggered");
        }
    }

    /// Token that counts one component as drained when dropped.
    pub fn guard(&self) -> ShutdownGuard {
        ShutdownGuard {
            signal: self.clone(),
        }
    }

    pub fn confirm_drained(&self) {
        self.drained_tx.send_modify(|count| *count += 1);
    }

    pub fn drained(&self) -> usize {
        *self.drained_tx.borrow()
    }

    /// Wait for `expected` components to confirm drain, with a timeout.
    pub async fn wait_for_drain(&self, expected: usize, timeout: Duration) -> DrainResult {
        let mut rx = self.drained_tx.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|count| *count >= expected))
            .await
            .map(|r| r.map(|count| *count));
        match waited {
            Ok(Ok(count)) => {
                info!(count, "all components drained");
                DrainResult::Complete(count)
            }
            // The sender lives in `self`, so it cannot close while we wait.
            Ok(Err(_)) => DrainResult::Complete(self.drained()),
            Err(_) => {
                let confirmed = self.drained();
                warn!(
                    confirmed,
                    expected, "drain timeout, some components did not confirm"
                );
                DrainResult::Timeout {
                    confirmed,
                    expected,
                }
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ShutdownListener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been triggered; immediately if it already was.
    pub async fn recv(&mut self) {
        // An error means every signal handle is gone; treat that as a stop.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

// ---------------------------------------------------------------------------
// DrainResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    /// All expected components confirmed drain.
    Complete(usize),
    /// Timeout expired before all components confirmed.
    Timeout { confirmed: usize, expected: usize },
}

impl DrainResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, DrainResult::Complete(_))
    }
}

// ---------------------------------------------------------------------------
// ShutdownGuard
// ---------------------------------------------------------------------------

pub struct ShutdownGuard {
    signal: ShutdownSignal,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.signal.confirm_drained();
    }
}
