//! Shutdown coordination for the discovery process.

use std::sync::Arc;

use tokio::sync::watch;

/// Why the signal fired.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Armed,
    Requested,
    Failed(String),
}

/// Single-shot cancellation signal.
///
/// Cloning shares the same signal. The first `trigger` or `fail` sets it;
/// later calls are no-ops. Waiters suspend on a watch channel rather than
/// polling.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Status>>,
}

impl Shutdown {
    /// Create a new, unfired signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status::Armed);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal for an orderly shutdown. Returns `true` only for the
    /// call that fired it.
    pub fn trigger(&self) -> bool {
        self.fire(Status::Requested)
    }

    /// Fire the signal because of an unrecoverable error. The reason is kept
    /// only if this call is the one that fired it.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.fire(Status::Failed(reason.into()))
    }

    fn fire(&self, status: Status) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == Status::Armed {
                *current = status;
                true
            } else {
                false
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow() != Status::Armed
    }

    /// The error that fired the signal, if it was fired by `fail`.
    pub fn failure(&self) -> Option<String> {
        match &*self.tx.borrow() {
            Status::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Subscribe to the signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        self.subscribe().fired().await
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a `Shutdown`, movable into spawned tasks.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Status>,
}

impl ShutdownSignal {
    /// Resolve once the signal fires.
    pub async fn fired(mut self) {
        // Err only if every sender is gone, which also means no one can fire it.
        let _ = self.rx.wait_for(|status| *status != Status::Armed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trigger_fires_once() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn first_failure_is_kept() {
        let shutdown = Shutdown::new();
        assert!(shutdown.fail("grpc listener failed"));
        assert!(!shutdown.fail("registry lost"));
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.failure().as_deref(), Some("grpc listener failed"));
    }

    #[test]
    fn failure_after_orderly_trigger_is_ignored() {
        let shutdown = Shutdown::new();
        assert!(shutdown.trigger());
        assert!(!shutdown.fail("listener failed while draining"));
        assert_eq!(shutdown.failure(), None);
    }

    #[tokio::test]
    async fn waiter_wakes_on_trigger() {
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let waiter = tokio::spawn(signal.fired());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn late_subscriber_sees_fired_signal() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_triggers_have_one_winner() {
        let shutdown = Shutdown::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = shutdown.clone();
                tokio::spawn(async move { s.trigger() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
