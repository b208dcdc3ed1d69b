//! Asynchronous CRUD façade over a storage engine.
//!
//! Every write is scheduled on the runtime's background lane and hands back a
//! [`WriteHandle`] the caller may await, cancel, or simply drop. The caller's
//! task is never blocked, and no ordering is guaranteed between writes issued
//! concurrently; the storage engine is the only serialization point.

use crate::source::PagedSourceFactory;
use crate::store::{RecordId, RecordStore};
use crate::{Result, StoreError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How a background write ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome<O> {
    /// The store call completed; carries the engine's result.
    Completed(O),
    /// The handle was cancelled before the store call began.
    Cancelled,
}

impl<O> WriteOutcome<O> {
    /// The completed value, if the write was not cancelled.
    pub fn completed(self) -> Option<O> {
        match self {
            WriteOutcome::Completed(value) => Some(value),
            WriteOutcome::Cancelled => None,
        }
    }
}

/// Handle to a scheduled background write.
///
/// Dropping the handle detaches the write; it still runs to completion, and a
/// failure is logged but otherwise swallowed. Await [`join`] to observe the
/// outcome instead.
///
/// [`join`]: WriteHandle::join
#[derive(Debug)]
pub struct WriteHandle<O> {
    token: CancellationToken,
    join: JoinHandle<Result<WriteOutcome<O>>>,
}

impl<O> WriteHandle<O> {
    /// Request cancellation.
    ///
    /// Honored only while the write is still queued: the token is checked
    /// once before the store call is issued, and once the call has begun it
    /// runs to completion. There is no mid-write cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the write to finish and surface its outcome.
    ///
    /// # Errors
    ///
    /// Returns the storage engine's error if the write failed, or
    /// [`StoreError::Task`] if the background task itself died.
    pub async fn join(self) -> Result<WriteOutcome<O>> {
        self.join.await.map_err(StoreError::Task)?
    }

    /// Explicit fire-and-forget: drop the handle without observing the
    /// outcome.
    pub fn detach(self) {}
}

/// Generic CRUD façade over a [`RecordStore`], safe to call from a control
/// task.
///
/// Cheap to clone; clones share the store and the invalidation signal.
pub struct Repository<T> {
    store: Arc<dyn RecordStore<T>>,
    invalidations: Arc<Notify>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            invalidations: Arc::clone(&self.invalidations),
        }
    }
}

impl<T> Repository<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn RecordStore<T>>) -> Self {
        Self {
            store,
            invalidations: Arc::new(Notify::new()),
        }
    }

    /// Schedule a single upsert (replace-on-conflict). The handle resolves to
    /// the identity the engine assigned.
    pub fn insert(&self, record: T) -> WriteHandle<RecordId> {
        let store = Arc::clone(&self.store);
        self.spawn_write("insert", async move { store.insert(&record).await })
    }

    /// Schedule a batched upsert. The handle resolves to identities ordered
    /// parallel to the input.
    pub fn insert_all(&self, records: Vec<T>) -> WriteHandle<Vec<RecordId>> {
        let store = Arc::clone(&self.store);
        self.spawn_write("insert_all", async move {
            store.insert_all(&records).await
        })
    }

    /// Schedule an update of an existing record.
    pub fn update(&self, record: T) -> WriteHandle<()> {
        let store = Arc::clone(&self.store);
        self.spawn_write("update", async move { store.update(&record).await })
    }

    /// Schedule a batched update.
    pub fn update_all(&self, records: Vec<T>) -> WriteHandle<()> {
        let store = Arc::clone(&self.store);
        self.spawn_write("update_all", async move {
            store.update_all(&records).await
        })
    }

    /// Schedule a delete. Returns a handle like every other write so a caller
    /// who cares can observe failure.
    pub fn delete(&self, record: T) -> WriteHandle<()> {
        let store = Arc::clone(&self.store);
        self.spawn_write("delete", async move { store.delete(&record).await })
    }

    /// Schedule a batched delete.
    pub fn delete_all(&self, records: Vec<T>) -> WriteHandle<()> {
        let store = Arc::clone(&self.store);
        self.spawn_write("delete_all", async move {
            store.delete_all(&records).await
        })
    }

    /// Factory for paged sources over this repository's backing query.
    /// Obtaining the factory performs no query.
    pub fn paged(&self) -> PagedSourceFactory<T> {
        PagedSourceFactory::new(Arc::clone(&self.store))
    }

    /// Mark every paged source produced from this repository stale, forcing a
    /// recompute on the next observation.
    ///
    /// Idempotent: repeated calls before the next recompute coalesce into a
    /// single stored permit.
    pub fn invalidate(&self) {
        self.invalidations.notify_one();
    }

    pub(crate) fn invalidations(&self) -> Arc<Notify> {
        Arc::clone(&self.invalidations)
    }

    fn spawn_write<O, F>(&self, op: &'static str, work: F) -> WriteHandle<O>
    where
        O: Send + 'static,
        F: Future<Output = Result<O>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let join = tokio::spawn(async move {
            // Checked once, before the store call. From here the write runs
            // to completion.
            if task_token.is_cancelled() {
                return Ok(WriteOutcome::Cancelled);
            }
            match work.await {
                Ok(value) => Ok(WriteOutcome::Completed(value)),
                Err(error) => {
                    warn!(op, %error, "background write failed");
                    Err(error)
                }
            }
        });
        WriteHandle { token, join }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeNotifier, StoreChange};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct VecStore {
        rows: Mutex<Vec<i64>>,
        notifier: ChangeNotifier,
    }

    impl VecStore {
        fn empty() -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(Vec::new()),
                notifier: ChangeNotifier::default(),
            })
        }

        fn snapshot(&self) -> Vec<i64> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordStore<i64> for VecStore {
        async fn insert(&self, record: &i64) -> Result<RecordId> {
            self.rows.lock().unwrap().push(*record);
            self.notifier.notify(StoreChange::Inserted(1));
            Ok(RecordId(*record))
        }

        async fn insert_all(&self, records: &[i64]) -> Result<Vec<RecordId>> {
            self.rows.lock().unwrap().extend_from_slice(records);
            self.notifier.notify(StoreChange::Inserted(records.len()));
            Ok(records.iter().map(|r| RecordId(*r)).collect())
        }

        async fn update(&self, _record: &i64) -> Result<()> {
            self.notifier.notify(StoreChange::Updated(1));
            Ok(())
        }

        async fn update_all(&self, records: &[i64]) -> Result<()> {
            self.notifier.notify(StoreChange::Updated(records.len()));
            Ok(())
        }

        async fn delete(&self, record: &i64) -> Result<()> {
            self.rows.lock().unwrap().retain(|r| r != record);
            self.notifier.notify(StoreChange::Deleted(1));
            Ok(())
        }

        async fn delete_all(&self, records: &[i64]) -> Result<()> {
            self.rows.lock().unwrap().retain(|r| !records.contains(r));
            self.notifier.notify(StoreChange::Deleted(records.len()));
            Ok(())
        }

        async fn count(&self) -> Result<u64> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }

        async fn load_range(&self, offset: u64, limit: u64) -> Result<Vec<i64>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .copied()
                .collect())
        }

        fn changes(&self) -> broadcast::Receiver<StoreChange> {
            self.notifier.subscribe()
        }
    }

    #[tokio::test]
    async fn test_insert_resolves_with_identity() {
        let store = VecStore::empty();
        let repo = Repository::new(store.clone() as Arc<dyn RecordStore<i64>>);

        let outcome = repo.insert(7).join().await.unwrap();
        assert_eq!(outcome, WriteOutcome::Completed(RecordId(7)));
        assert_eq!(store.snapshot(), vec![7]);
    }

    #[tokio::test]
    async fn test_insert_all_returns_parallel_ids() {
        let store = VecStore::empty();
        let repo = Repository::new(store.clone() as Arc<dyn RecordStore<i64>>);

        let outcome = repo.insert_all(vec![1, 2, 3]).join().await.unwrap();
        assert_eq!(
            outcome.completed().unwrap(),
            vec![RecordId(1), RecordId(2), RecordId(3)]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_the_write() {
        let store = VecStore::empty();
        let repo = Repository::new(store.clone() as Arc<dyn RecordStore<i64>>);

        // On the current-thread test runtime the spawned task is not polled
        // until we await, so the cancel lands before the write begins.
        let handle = repo.insert(9);
        handle.cancel();
        assert!(handle.is_cancelled());

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome, WriteOutcome::Cancelled);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_delete_returns_a_handle() {
        let store = VecStore::empty();
        let repo = Repository::new(store.clone() as Arc<dyn RecordStore<i64>>);

        repo.insert(1).join().await.unwrap();
        let outcome = repo.delete(1).join().await.unwrap();
        assert_eq!(outcome, WriteOutcome::Completed(()));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_detached_write_still_runs() {
        let store = VecStore::empty();
        let repo = Repository::new(store.clone() as Arc<dyn RecordStore<i64>>);
        let mut changes = store.changes();

        repo.insert(5).detach();

        // The change notification proves the detached write committed.
        assert_eq!(changes.recv().await.unwrap(), StoreChange::Inserted(1));
        assert_eq!(store.snapshot(), vec![5]);
    }
}
