//! Cooperative shutdown signal
//!
//! Checked at every suspension point of a session: detector poll ticks,
//! inter-frame pacing delays, and external-call awaits.

use std::future::Future;

use tokio::sync::watch;

use crate::{Error, Result};

/// Create a linked trigger/signal pair
#[must_use]
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Requests shutdown of every linked [`Shutdown`]
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal shutdown. Idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a shutdown request
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that never fires
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether shutdown has already been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested; pends forever if the trigger is
    /// dropped without firing
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless shutdown fires first
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if shutdown was requested before `fut`
    /// completed
    pub async fn run_until<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.is_triggered() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            () = self.triggered() => Err(Error::Cancelled),
            value = fut => Ok(value),
        }
    }
}
