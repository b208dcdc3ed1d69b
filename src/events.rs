//! # Change Notification Bus
//!
//! Publishes storage-engine change notifications over `tokio::sync::broadcast`.
//! A [`RecordStore`](crate::store::RecordStore) implementation embeds a
//! [`ChangeNotifier`] and publishes a [`StoreChange`] after every successful
//! write; every paged view subscribed to the store recomputes its window when
//! a notification arrives, so a recent write becomes visible without an
//! explicit refresh call.
//!
//! Subscribers that fall behind receive `RecvError::Lagged` and should treat
//! it as "something changed, recompute" rather than as an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::RecvError;
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the change notification channel.
///
/// Change notifications carry no payload worth replaying; a subscriber that
/// lags simply recomputes once, so a small buffer is enough.
pub const DEFAULT_CHANGE_BUFFER_SIZE: usize = 64;

/// A committed mutation of the backing store.
///
/// The row count is informational; observers invalidate their whole window
/// regardless of how many rows changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", content = "rows")]
pub enum StoreChange {
    /// Rows were inserted (or replaced on conflict).
    Inserted(usize),
    /// Existing rows were updated in place.
    Updated(usize),
    /// Rows were deleted.
    Deleted(usize),
}

impl StoreChange {
    /// Number of rows touched by the mutation.
    pub fn rows(&self) -> usize {
        match self {
            StoreChange::Inserted(n) | StoreChange::Updated(n) | StoreChange::Deleted(n) => *n,
        }
    }
}

/// Broadcast sender half for store change notifications.
///
/// Cheap to embed in a store implementation; `notify` never blocks and does
/// not fail when no subscriber is currently listening.
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StoreChange>,
}

impl ChangeNotifier {
    /// Create a notifier with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    /// Subscribe to future change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }

    /// Publish a change to all current subscribers.
    ///
    /// Returns the number of subscribers that received the notification.
    pub fn notify(&self, change: StoreChange) -> usize {
        match self.tx.send(change) {
            Ok(received) => {
                tracing::trace!(?change, subscribers = received, "store change published");
                received
            }
            // No active subscriber; the change is simply not observed.
            Err(_) => 0,
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_BUFFER_SIZE)
    }
}
