//! Full-snapshot subscription streams.
//!
//! A [`Subscription`] delivers the **complete current result set** of its
//! collection on every change, never a diff. Consumers must treat each
//! delivery as a full replacement of their working set. Deliveries may
//! coalesce under load: skipping an intermediate snapshot is harmless
//! because the next one is again the full current set.
//!
//! A subscription stays active until [`Subscription::cancel`] is called.
//! Cancellation is idempotent and final: no further deliveries, no further
//! side effects.

use std::fmt;

use tokio::sync::watch;

/// A live view onto one collection, pushing full replacement snapshots.
pub struct Subscription<T> {
    rx: Option<watch::Receiver<Vec<T>>>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(rx: watch::Receiver<Vec<T>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// The current full result set, or `None` once cancelled.
    ///
    /// Available immediately after subscribing; does not wait for a change.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<T>> {
        self.rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Wait for the next replacement snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or the publishing
    /// side has gone away. There is no error channel: a subscriber that
    /// can no longer be served simply stops receiving.
    pub async fn updated(&mut self) -> Option<Vec<T>> {
        let rx = self.rx.as_mut()?;
        rx.changed().await.ok()?;
        let snapshot = rx.borrow_and_update().clone();
        Some(snapshot)
    }

    /// Cancel the subscription.
    ///
    /// Idempotent. After cancellation, [`Self::snapshot`] and
    /// [`Self::updated`] return `None` and nothing else happens.
    pub fn cancel(&mut self) {
        self.rx = None;
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.rx.is_none())
            .finish()
    }
}
