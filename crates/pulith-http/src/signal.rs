//! Cooperative cancellation for in-flight fetches.
//!
//! An [`AbortController`] owns the trigger; any number of [`AbortSignal`]s
//! observe it. Aborting is one-shot and cannot be undone.

use tokio::sync::watch;

/// Trigger side of a cancellation pair.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Calling it again has no effect.
    pub fn abort(&self) {
        self.tx.send_if_modified(|aborted| !std::mem::replace(aborted, true));
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether the signal has already fired.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    ///
    /// Pends forever if the controller is dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|aborted| *aborted).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abort_is_observed_by_every_signal() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        assert!(!a.is_aborted());

        controller.abort();
        controller.abort();

        assert!(a.is_aborted());
        assert!(b.is_aborted());
        assert!(controller.is_aborted());
        a.aborted().await;
    }

    #[tokio::test]
    async fn waiting_signal_wakes_on_abort() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let waiter = tokio::spawn(async move { signal.aborted().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.abort();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal should fire")
            .unwrap();
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let signal = AbortSignal::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(fired.is_err());
        assert!(!signal.is_aborted());
    }

    #[tokio::test]
    async fn abort_survives_dropped_controller() {
        let controller = AbortController::new();
        let signal = controller.signal();
        controller.abort();
        drop(controller);
        assert!(signal.is_aborted());
        signal.aborted().await;
    }
}
