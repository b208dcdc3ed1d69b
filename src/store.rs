//! Storage-engine collaborator contract.
//!
//! The paged store layer never talks to a database directly; it consumes a
//! [`RecordStore`] implementation supplied by the caller. The trait is the
//! narrow seam between this crate and whatever engine actually holds the rows
//! (the integration tests ship a SQLite implementation over `sqlx`).

use crate::events::StoreChange;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Identity assigned to a record by the storage engine.
///
/// SQLite-style engines hand back a signed 64-bit rowid; engines with other
/// key shapes map into this space however they see fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// CRUD and paged-query contract a storage engine must provide per record
/// type `T`.
///
/// Implementations are expected to:
/// - apply a replace-on-conflict policy for `insert`/`insert_all` (a
///   primary-key collision overwrites the existing row rather than failing);
/// - keep their own internal consistency under concurrent access (this crate
///   takes no locks of its own);
/// - publish a [`StoreChange`] through the receiver returned by [`changes`]
///   after every successful write, so paged views recompute without an
///   explicit refresh (embed a
///   [`ChangeNotifier`](crate::events::ChangeNotifier) for this).
///
/// `count` plus `load_range` together form the paged query capability: the
/// backing result set is a single stable ordering from which bounded,
/// offset-addressed slices can be produced on demand.
///
/// [`changes`]: RecordStore::changes
#[async_trait]
pub trait RecordStore<T>: Send + Sync {
    /// Insert a single record, replacing on conflict. Returns the identity
    /// the engine assigned.
    async fn insert(&self, record: &T) -> Result<RecordId>;

    /// Insert a batch, replacing on conflict. The returned identities are
    /// ordered parallel to the input.
    async fn insert_all(&self, records: &[T]) -> Result<Vec<RecordId>>;

    /// Update an existing record in place.
    async fn update(&self, record: &T) -> Result<()>;

    /// Update a batch of existing records.
    async fn update_all(&self, records: &[T]) -> Result<()>;

    /// Delete a record.
    async fn delete(&self, record: &T) -> Result<()>;

    /// Delete a batch of records.
    async fn delete_all(&self, records: &[T]) -> Result<()>;

    /// Total number of records in the backing result set.
    async fn count(&self) -> Result<u64>;

    /// Load a contiguous slice of the backing result set, `limit` records
    /// starting at `offset`, in the set's stable order.
    async fn load_range(&self, offset: u64, limit: u64) -> Result<Vec<T>>;

    /// Subscribe to change notifications for this store.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}
