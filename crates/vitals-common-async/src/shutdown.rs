//! Shared cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A handle for coordinating graceful shutdown.
///
/// Cloneable; every long-running task holds one and awaits
/// [`cancelled`](Self::cancelled) inside its `select!` loop. Signalling is
/// idempotent, and a signal fired before a waiter arrives is still observed.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Create a new shutdown handle.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal shutdown to all waiters, current and future.
    pub fn shutdown(&self) {
        self.fired.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }

    /// Whether shutdown has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been signalled; resolves immediately if it
    /// already has.
    pub async fn cancelled(&self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let mut rx = self.sender.subscribe();
        // The flag may have flipped between the first check and the
        // subscription; a subscriber registered after the send would wait
        // forever without this re-check.
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiters_observe_shutdown() {
        let handle = ShutdownHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn late_waiters_resolve_immediately() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        assert!(handle.is_cancelled());

        // No waiter existed when the signal fired.
        tokio::time::timeout(Duration::from_secs(1), handle.cancelled())
            .await
            .expect("already-fired token resolves at once");
    }

    #[tokio::test]
    async fn every_clone_is_cancelled() {
        let handle = ShutdownHandle::new();
        let clones: Vec<_> = (0..4).map(|_| handle.clone()).collect();

        let tasks: Vec<_> = clones
            .into_iter()
            .map(|c| tokio::spawn(async move { c.cancelled().await }))
            .collect();

        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.shutdown();

        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("clone should observe shutdown")
                .unwrap();
        }
    }
}
