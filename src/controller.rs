//! Paged view controller: window ownership and boundary dispatch.
//!
//! The controller owns the paging configuration, drives window recomputation
//! from a dedicated task, and republishes boundary events to caller-supplied
//! hooks. Observers consume the window through a `watch` channel, which gives
//! the wholesale-replacement consistency model for free: a receiver sees the
//! previous window or a complete new one, never a partial state.

use crate::events::StoreChange;
use crate::paging::{BoundaryEvent, PageWindow, PagingConfig};
use crate::repository::Repository;
use crate::source::PagedSourceFactory;
use crate::{Result, StoreError};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Optional boundary callbacks, each defaulting to a no-op.
///
/// Hooks run on the controller's driver task, never on a write task. The
/// controller offers no isolation: a panic inside a hook kills the driver.
///
/// # Examples
///
/// ```
/// use paged_store::BoundaryHooks;
///
/// let hooks: BoundaryHooks<String> = BoundaryHooks::new()
///     .on_zero_items(|| println!("backing store is empty"))
///     .on_end_reached(|last| println!("end of data at {last}"));
/// ```
pub struct BoundaryHooks<T> {
    on_zero_items: Option<Arc<dyn Fn() + Send + Sync>>,
    on_front_reached: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_end_reached: Option<Arc<dyn Fn(&T) + Send + Sync>>,
}

impl<T> Default for BoundaryHooks<T> {
    fn default() -> Self {
        Self {
            on_zero_items: None,
            on_front_reached: None,
            on_end_reached: None,
        }
    }
}

impl<T> Clone for BoundaryHooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_zero_items: self.on_zero_items.clone(),
            on_front_reached: self.on_front_reached.clone(),
            on_end_reached: self.on_end_reached.clone(),
        }
    }
}

impl<T> BoundaryHooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a fresh query yields no rows at all. Typical reaction: ask
    /// an external source to refill the store.
    pub fn on_zero_items(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_zero_items = Some(Arc::new(hook));
        self
    }

    /// Called when the window's leading record is the true first record of
    /// the backing query. Reserved; this loader always leads the query.
    pub fn on_front_reached(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_front_reached = Some(Arc::new(hook));
        self
    }

    /// Called with the last materialized record once the window has consumed
    /// the whole backing set. Typical reaction: ask an external source to
    /// produce and insert more records; the resulting change notification
    /// then triggers a fresh window.
    pub fn on_end_reached(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_end_reached = Some(Arc::new(hook));
        self
    }

    fn dispatch(&self, event: &BoundaryEvent<T>) {
        match event {
            BoundaryEvent::ZeroItems => {
                debug!("boundary: zero items");
                if let Some(hook) = &self.on_zero_items {
                    hook();
                }
            }
            BoundaryEvent::FrontReached(record) => {
                debug!("boundary: front reached");
                if let Some(hook) = &self.on_front_reached {
                    hook(record);
                }
            }
            BoundaryEvent::EndReached(record) => {
                debug!("boundary: end reached");
                if let Some(hook) = &self.on_end_reached {
                    hook(record);
                }
            }
        }
    }
}

/// One publication on the paged stream.
#[derive(Debug)]
pub enum PagedUpdate<T> {
    /// No load pass has completed yet.
    Pending,
    /// A freshly computed window.
    Window(Arc<PageWindow<T>>),
    /// The read path failed; the previous window (if any) is stale.
    Failed(Arc<StoreError>),
}

impl<T> Clone for PagedUpdate<T> {
    fn clone(&self) -> Self {
        match self {
            PagedUpdate::Pending => PagedUpdate::Pending,
            PagedUpdate::Window(window) => PagedUpdate::Window(Arc::clone(window)),
            PagedUpdate::Failed(error) => PagedUpdate::Failed(Arc::clone(error)),
        }
    }
}

impl<T> PagedUpdate<T> {
    /// The window, if this update carries one.
    pub fn window(&self) -> Option<&Arc<PageWindow<T>>> {
        match self {
            PagedUpdate::Window(window) => Some(window),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PagedUpdate::Failed(_))
    }
}

enum Command {
    LoadAround(usize),
}

/// Owns a paged stream over one repository's backing query.
///
/// Construction validates the [`PagingConfig`] and fails fast with
/// [`StoreError::Configuration`]; no partial controller is returned. The
/// driver task subscribes once to the store's change notifications, so a
/// completed write makes the next window appear without an explicit refresh.
///
/// Must be constructed within a Tokio runtime. Dropping the controller stops
/// the driver.
pub struct PagedViewController<T> {
    repository: Repository<T>,
    updates: watch::Receiver<PagedUpdate<T>>,
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
}

impl<T> std::fmt::Debug for PagedViewController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedViewController").finish_non_exhaustive()
    }
}

impl<T> PagedViewController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        repository: Repository<T>,
        config: PagingConfig,
        hooks: BoundaryHooks<T>,
    ) -> Result<Self> {
        config.validate()?;

        let factory = repository.paged();
        let changes = factory.changes();
        let invalidations = repository.invalidations();
        let (update_tx, update_rx) = watch::channel(PagedUpdate::Pending);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let driver = tokio::spawn(drive(
            factory,
            config,
            hooks,
            update_tx,
            command_rx,
            invalidations,
            changes,
        ));

        Ok(Self {
            repository,
            updates: update_rx,
            commands: command_tx,
            driver,
        })
    }

    /// Read-only handle on the paged stream. The receiver starts at
    /// [`PagedUpdate::Pending`] until the first load pass completes.
    pub fn watch(&self) -> watch::Receiver<PagedUpdate<T>> {
        self.updates.clone()
    }

    /// The repository this controller drives; writes issued through it feed
    /// back into the stream via the store's change notifications.
    pub fn repository(&self) -> &Repository<T> {
        &self.repository
    }

    /// Force a refresh: the current source generation is discarded and the
    /// next publication is a freshly computed window. Idempotent before the
    /// next recompute.
    pub fn invalidate(&self) {
        self.repository.invalidate();
    }

    /// Report the consumer's current position. When the position comes
    /// within prefetch distance of the loaded edge the window grows by one
    /// page on the next pass.
    pub fn load_around(&self, index: usize) {
        let _ = self.commands.send(Command::LoadAround(index));
    }
}

impl<T> Drop for PagedViewController<T> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Driver loop: recompute, publish, dispatch, park.
async fn drive<T>(
    factory: PagedSourceFactory<T>,
    config: PagingConfig,
    hooks: BoundaryHooks<T>,
    updates: watch::Sender<PagedUpdate<T>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    invalidations: Arc<Notify>,
    mut changes: broadcast::Receiver<StoreChange>,
) where
    T: Clone + Send + Sync + 'static,
{
    let mut source = factory.create(config);
    let mut changes_open = true;

    loop {
        match source.load().await {
            Ok((window, events)) => {
                debug!(
                    loaded = window.loaded_len(),
                    total = window.total(),
                    "publishing page window"
                );
                updates.send_replace(PagedUpdate::Window(Arc::new(window)));
                for event in &events {
                    hooks.dispatch(event);
                }
            }
            Err(err) => {
                error!(error = %err, "page window recompute failed");
                updates.send_replace(PagedUpdate::Failed(Arc::new(err)));
            }
        }

        // Park until something requires another pass.
        loop {
            tokio::select! {
                _ = invalidations.notified() => {
                    source = source.recreated();
                    break;
                }
                command = commands.recv() => match command {
                    Some(Command::LoadAround(index)) => {
                        if source.request_around(index) {
                            break;
                        }
                    }
                    // Controller dropped; nothing left to drive.
                    None => return,
                },
                change = changes.recv(), if changes_open => match change {
                    Ok(change) => {
                        debug!(?change, "store change notification");
                        source = source.recreated();
                        break;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "change stream lagged; recomputing");
                        source = source.recreated();
                        break;
                    }
                    Err(RecvError::Closed) => {
                        changes_open = false;
                    }
                },
            }
        }
    }
}
