//! Paged source: on-demand materialization of bounded slices.
//!
//! A [`PagedSource`] is one *generation* of the paged view: it owns the
//! window-growth target and the per-generation boundary bookkeeping. Sources
//! are never patched when the backing data changes; a fresh generation is
//! produced instead (see [`PagedSource::recreated`]) and the next load pass
//! recomputes the window wholesale.

use crate::events::StoreChange;
use crate::paging::{BoundaryEvent, PageWindow, PagingConfig};
use crate::store::RecordStore;
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Produces fresh paged sources for one repository's backing query.
///
/// Obtaining a factory performs no query; each call to [`create`] yields an
/// independent generation.
///
/// [`create`]: PagedSourceFactory::create
pub struct PagedSourceFactory<T> {
    store: Arc<dyn RecordStore<T>>,
}

impl<T> Clone for PagedSourceFactory<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T> PagedSourceFactory<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(store: Arc<dyn RecordStore<T>>) -> Self {
        Self { store }
    }

    /// Create a fresh source generation for the given configuration.
    pub fn create(&self, config: PagingConfig) -> PagedSource<T> {
        PagedSource::new(Arc::clone(&self.store), config)
    }

    /// Subscribe to the underlying store's change notifications.
    pub fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.store.changes()
    }
}

#[derive(Debug, Default)]
struct BoundaryFlags {
    zero_fired: bool,
    front_fired: bool,
    end_fired_at: Option<usize>,
}

/// One generation of the paged view over a store's backing query.
///
/// The source materializes records from offset zero up to a growth target.
/// The target starts at the configured initial load size and grows by one
/// page whenever the consumer reports a position within prefetch distance of
/// the loaded edge.
pub struct PagedSource<T> {
    store: Arc<dyn RecordStore<T>>,
    config: PagingConfig,
    target: usize,
    fired: BoundaryFlags,
}

impl<T> PagedSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(store: Arc<dyn RecordStore<T>>, config: PagingConfig) -> Self {
        Self {
            store,
            config,
            target: config.initial_load(),
            fired: BoundaryFlags::default(),
        }
    }

    /// Fresh generation over the same query.
    ///
    /// The grown target is kept so the visible span does not shrink when a
    /// write invalidates the view; boundary bookkeeping resets so the new
    /// generation's first full pass refires its edge events.
    pub fn recreated(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
            target: self.target,
            fired: BoundaryFlags::default(),
        }
    }

    /// Consumer position hint.
    ///
    /// Grows the target by one page when `index` is within prefetch distance
    /// of it. Returns `true` when the target grew and a recompute is needed.
    pub fn request_around(&mut self, index: usize) -> bool {
        if index + self.config.prefetch() >= self.target {
            self.target += self.config.page_size;
            debug!(index, target = self.target, "paged source target grew");
            true
        } else {
            false
        }
    }

    /// Run one load pass: recount the backing set, materialize up to the
    /// current target, and evaluate boundary conditions.
    ///
    /// Boundary events are deduplicated per generation: `ZeroItems` and
    /// `FrontReached` fire at most once, `EndReached` refires only when the
    /// end offset advances.
    pub async fn load(&mut self) -> Result<(PageWindow<T>, Vec<BoundaryEvent<T>>)> {
        let total = self.store.count().await? as usize;
        let take = self.target.min(total);
        let items = if take == 0 {
            Vec::new()
        } else {
            self.store.load_range(0, take as u64).await?
        };
        debug!(
            total,
            loaded = items.len(),
            target = self.target,
            "paged source load pass"
        );

        let mut events = Vec::new();
        if total == 0 {
            if !self.fired.zero_fired {
                self.fired.zero_fired = true;
                events.push(BoundaryEvent::ZeroItems);
            }
        } else if !items.is_empty() {
            if !self.fired.front_fired {
                self.fired.front_fired = true;
                events.push(BoundaryEvent::FrontReached(items[0].clone()));
            }
            if items.len() == total {
                let end = total - 1;
                if self.fired.end_fired_at != Some(end) {
                    self.fired.end_fired_at = Some(end);
                    events.push(BoundaryEvent::EndReached(items[end].clone()));
                }
            }
        }

        let window = PageWindow::new(items, total, self.config.enable_placeholders);
        Ok((window, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeNotifier;
    use crate::store::RecordId;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Minimal in-memory store over a Vec, enough to drive load passes.
    struct VecStore {
        rows: Mutex<Vec<u32>>,
        notifier: ChangeNotifier,
    }

    impl VecStore {
        fn with_rows(rows: Vec<u32>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                notifier: ChangeNotifier::default(),
            })
        }
    }

    #[async_trait]
    impl RecordStore<u32> for VecStore {
        async fn insert(&self, record: &u32) -> Result<RecordId> {
            let mut rows = self.rows.lock().unwrap();
            rows.push(*record);
            self.notifier.notify(StoreChange::Inserted(1));
            Ok(RecordId(*record as i64))
        }

        async fn insert_all(&self, records: &[u32]) -> Result<Vec<RecordId>> {
            let mut rows = self.rows.lock().unwrap();
            rows.extend_from_slice(records);
            self.notifier.notify(StoreChange::Inserted(records.len()));
            Ok(records.iter().map(|r| RecordId(*r as i64)).collect())
        }

        async fn update(&self, _record: &u32) -> Result<()> {
            self.notifier.notify(StoreChange::Updated(1));
            Ok(())
        }

        async fn update_all(&self, records: &[u32]) -> Result<()> {
            self.notifier.notify(StoreChange::Updated(records.len()));
            Ok(())
        }

        async fn delete(&self, record: &u32) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|r| r != record);
            self.notifier.notify(StoreChange::Deleted(1));
            Ok(())
        }

        async fn delete_all(&self, records: &[u32]) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|r| !records.contains(r));
            self.notifier.notify(StoreChange::Deleted(records.len()));
            Ok(())
        }

        async fn count(&self) -> Result<u64> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }

        async fn load_range(&self, offset: u64, limit: u64) -> Result<Vec<u32>> {
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

    fn source_over(rows: Vec<u32>, config: PagingConfig) -> PagedSource<u32> {
        PagedSourceFactory::new(VecStore::with_rows(rows)).create(config)
    }

    #[tokio::test]
    async fn test_zero_items_fires_once_per_generation() {
        let mut source = source_over(Vec::new(), PagingConfig::new(20));

        let (window, events) = source.load().await.unwrap();
        assert!(window.is_empty());
        assert_eq!(events, vec![BoundaryEvent::ZeroItems]);

        // A second pass in the same generation stays quiet.
        let (_, events) = source.load().await.unwrap();
        assert!(events.is_empty());

        // A new generation refires.
        let mut fresh = source.recreated();
        let (_, events) = fresh.load().await.unwrap();
        assert_eq!(events, vec![BoundaryEvent::ZeroItems]);
    }

    #[tokio::test]
    async fn test_end_reached_when_fully_materialized() {
        let rows: Vec<u32> = (1..=45).collect();
        let config = PagingConfig::new(20)
            .prefetch_distance(20)
            .initial_load_size(60);
        let mut source = source_over(rows, config);

        let (window, events) = source.load().await.unwrap();
        assert_eq!(window.loaded_len(), 45);
        assert_eq!(window.len(), 45);
        assert_eq!(
            events,
            vec![BoundaryEvent::FrontReached(1), BoundaryEvent::EndReached(45)]
        );

        // Same end offset: no refire.
        let (_, events) = source.load().await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_end_reached_refires_when_end_advances() {
        let store = VecStore::with_rows((1..=3).collect());
        let factory = PagedSourceFactory::new(Arc::clone(&store) as Arc<dyn RecordStore<u32>>);
        let mut source = factory.create(PagingConfig::new(2).initial_load_size(10));

        let (_, events) = source.load().await.unwrap();
        assert!(events.contains(&BoundaryEvent::EndReached(3)));

        store.insert(&4).await.unwrap();
        let (_, events) = source.load().await.unwrap();
        assert_eq!(events, vec![BoundaryEvent::EndReached(4)]);
    }

    #[tokio::test]
    async fn test_partial_window_holds_end_event() {
        let rows: Vec<u32> = (1..=100).collect();
        let mut source = source_over(rows, PagingConfig::new(20));

        // Initial load of 60 out of 100: the end is not reached yet.
        let (window, events) = source.load().await.unwrap();
        assert_eq!(window.loaded_len(), 60);
        assert_eq!(window.len(), 100);
        assert_eq!(events, vec![BoundaryEvent::FrontReached(1)]);
    }

    #[tokio::test]
    async fn test_request_around_grows_by_one_page() {
        let rows: Vec<u32> = (1..=100).collect();
        let mut source = source_over(rows, PagingConfig::new(20));
        source.load().await.unwrap();

        // Far from the loaded edge: no growth.
        assert!(!source.request_around(10));
        // Within prefetch distance of the target (60): grow to 80.
        assert!(source.request_around(50));

        let (window, _) = source.load().await.unwrap();
        assert_eq!(window.loaded_len(), 80);
    }

    #[tokio::test]
    async fn test_recreated_keeps_target() {
        let rows: Vec<u32> = (1..=100).collect();
        let mut source = source_over(rows, PagingConfig::new(20));
        source.load().await.unwrap();
        assert!(source.request_around(59));

        let mut fresh = source.recreated();
        let (window, _) = fresh.load().await.unwrap();
        assert_eq!(window.loaded_len(), 80);
    }
}
