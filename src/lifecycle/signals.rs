//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT/SIGTERM (Ctrl-C elsewhere)
//! - Fire the shared `Shutdown` signal on the first notification
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Repeated notifications are no-ops; `Shutdown` is single-shot
//! - An internally fired signal (fatal subsystem error) ends the wait too

use std::future::Future;
use std::io;

use crate::lifecycle::shutdown::Shutdown;

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// The signal was fired from inside the process.
    Internal,
}

/// Bridges termination notifications into the shared `Shutdown` signal.
#[derive(Debug, Clone)]
pub struct SignalCoordinator {
    shutdown: Shutdown,
}

impl SignalCoordinator {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }

    /// Wait for an OS termination signal, then fire the shutdown signal.
    pub async fn wait_for_termination(&self) -> io::Result<Termination> {
        let signals = OsSignals::install()?;
        self.wait_with(signals.recv()).await
    }

    /// Wait for `notification`, then fire the shutdown signal.
    pub async fn wait_with<F>(&self, notification: F) -> io::Result<Termination>
    where
        F: Future<Output = io::Result<Termination>>,
    {
        tokio::select! {
            received = notification => {
                let termination = received?;
                if self.shutdown.trigger() {
                    tracing::info!(signal = ?termination, "Shutdown signal received");
                } else {
                    tracing::debug!(signal = ?termination, "Shutdown already in progress");
                }
                Ok(termination)
            }
            _ = self.shutdown.wait() => {
                tracing::info!("Shutdown requested internally");
                Ok(Termination::Internal)
            }
        }
    }
}

/// Registered SIGINT/SIGTERM handlers.
///
/// Handlers are live from `install` on, so a signal that arrives before
/// `recv` is polled is still delivered instead of killing the process.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Resolve on the next termination signal.
    #[cfg(unix)]
    pub async fn recv(mut self) -> io::Result<Termination> {
        tokio::select! {
            _ = self.interrupt.recv() => Ok(Termination::Interrupt),
            _ = self.terminate.recv() => Ok(Termination::Terminate),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> io::Result<Termination> {
        tokio::signal::ctrl_c().await?;
        Ok(Termination::Interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn first_notification_fires_shutdown() {
        let shutdown = Shutdown::new();
        let coordinator = SignalCoordinator::new(shutdown.clone());

        let got = coordinator
            .wait_with(async { Ok(Termination::Terminate) })
            .await
            .unwrap();
        assert_eq!(got, Termination::Terminate);
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn second_notification_is_noop() {
        let shutdown = Shutdown::new();
        let first = SignalCoordinator::new(shutdown.clone());
        let second = SignalCoordinator::new(shutdown.clone());

        first
            .wait_with(async { Ok(Termination::Interrupt) })
            .await
            .unwrap();
        assert!(shutdown.is_triggered());

        // Either branch may win once the signal is set; neither re-fires it.
        let again = second
            .wait_with(async { Ok(Termination::Terminate) })
            .await
            .unwrap();
        assert!(matches!(again, Termination::Terminate | Termination::Internal));
        assert!(!shutdown.trigger());
    }

    #[tokio::test]
    async fn internal_trigger_ends_wait() {
        let shutdown = Shutdown::new();
        let coordinator = SignalCoordinator::new(shutdown.clone());

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let got = tokio::time::timeout(
            Duration::from_secs(1),
            coordinator.wait_with(std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(got, Termination::Internal);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_sent_before_recv_is_delivered() {
        let signals = OsSignals::install().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let got = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Termination::Terminate);
    }

    #[tokio::test]
    async fn notification_error_does_not_fire() {
        let shutdown = Shutdown::new();
        let coordinator = SignalCoordinator::new(shutdown.clone());

        let result = coordinator
            .wait_with(async { Err(io::Error::new(io::ErrorKind::Other, "no handler")) })
            .await;
        assert!(result.is_err());
        assert!(!shutdown.is_triggered());
    }
}
