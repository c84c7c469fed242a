//! Shared per-connection liveness flag.
//!
//! The session loop and the command loop each hold a clone. Either side
//! marks the connection dead; the other observes it at its next loop
//! boundary or is woken from [`Liveness::dead`] immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    alive: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to one connection's liveness flag.
#[derive(Debug, Clone)]
pub struct Liveness {
    inner: Arc<Inner>,
}

impl Liveness {
    /// A new, alive connection.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                alive: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// Mark the connection dead and wake every waiter.
    ///
    /// Returns `true` if this call flipped the flag.
    pub fn mark_dead(&self) -> bool {
        let was_alive = self.inner.alive.swap(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        was_alive
    }

    /// Resolves once the connection has been marked dead.
    pub async fn dead(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent `mark_dead` is not missed.
            notified.as_mut().enable();
            if !self.is_alive() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_alive_and_flips_once() {
        let live = Liveness::new();
        assert!(live.is_alive());
        assert!(live.mark_dead());
        assert!(!live.mark_dead());
        assert!(!live.clone().is_alive());
    }

    #[tokio::test]
    async fn dead_wakes_waiter() {
        let live = Liveness::new();
        let waiter = tokio::spawn({
            let live = live.clone();
            async move { live.dead().await }
        });

        tokio::task::yield_now().await;
        live.mark_dead();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn dead_returns_immediately_when_already_dead() {
        let live = Liveness::new();
        live.mark_dead();
        tokio::time::timeout(Duration::from_millis(100), live.dead())
            .await
            .expect("should resolve");
    }
}
