//! Graceful shutdown coordination
//!
//! A small coordinator that listens for SIGTERM/SIGINT, runs registered
//! shutdown callbacks (closing WebSocket connections, flushing queues), then
//! broadcasts a shutdown signal to any subscribed tasks and waits out the
//! configured grace period.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shutdown behavior configuration
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight work to drain after callbacks run
    pub grace_period: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
        }
    }
}

type ShutdownCallback = Box<dyn Fn() + Send + Sync>;

/// Coordinates graceful shutdown across the process
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    tx: broadcast::Sender<()>,
    callbacks: Mutex<Vec<ShutdownCallback>>,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Arc<Self> {
        let (tx, _) = broadcast::channel(1);
        Arc::new(Self {
            config,
            tx,
            callbacks: Mutex::new(Vec::new()),
        })
    }

    /// Register a callback to run when shutdown begins.
    pub fn on_shutdown<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Subscribe to the shutdown broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Run callbacks, notify subscribers, and wait out the grace period.
    pub async fn begin_shutdown(&self) {
        info!("Shutdown initiated");
        for callback in self.callbacks.lock().iter() {
            callback();
        }
        if self.tx.send(()).is_err() {
            // No subscribers; nothing waiting on the signal.
        }
        tokio::time::sleep(self.config.grace_period).await;
        info!("Shutdown grace period elapsed");
    }

    /// Wait for SIGTERM/SIGINT, then begin shutdown.
    pub async fn wait_for_signal(self: Arc<Self>) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        self.begin_shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn callbacks_and_broadcast_fire_on_shutdown() {
        let coordinator = ShutdownCoordinator::new(ShutdownConfig {
            grace_period: Duration::from_millis(1),
        });

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        coordinator.on_shutdown(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        let mut rx = coordinator.subscribe();
        coordinator.begin_shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_ok());
    }
}
