//! # Paged Store
//!
//! A generic paged-repository layer binding observable application state to a
//! local relational store.
//!
//! ## Overview
//!
//! - [`RecordStore`] is the narrow contract a storage engine must implement:
//!   CRUD with replace-on-conflict inserts, an offset-addressed paged query
//!   capability, and change notifications.
//! - [`Repository`] hides the engine behind an asynchronous façade: every
//!   write is scheduled off the caller's task and returns a cancellable,
//!   discardable [`WriteHandle`].
//! - [`PagedViewController`] owns the windowing configuration, recomputes the
//!   visible [`PageWindow`] whenever the store reports a change or the view is
//!   invalidated, and dispatches [`BoundaryHooks`] when the window meets a
//!   true edge of the backing data.
//!
//! Control flow: a write is scheduled in the background; on commit the store
//! publishes a change notification; the controller's driver recomputes the
//! window wholesale and publishes it through a `watch` stream, so observers
//! see a recent write without any explicit refresh call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let repository = Repository::new(store);
//! let controller = PagedViewController::new(
//!     repository.clone(),
//!     PagingConfig::new(20),
//!     BoundaryHooks::new().on_end_reached(|last| request_more_after(last)),
//! )?;
//!
//! let mut stream = controller.watch();
//! repository.insert(record).detach();
//! // The next published window contains the record.
//! ```

pub mod controller;
pub mod db;
pub mod error;
pub mod events;
pub mod paging;
pub mod repository;
pub mod source;
pub mod store;

pub use controller::{BoundaryHooks, PagedUpdate, PagedViewController};
pub use error::{Result, StoreError};
pub use events::{ChangeNotifier, StoreChange};
pub use paging::{BoundaryEvent, PageWindow, PagingConfig, DEFAULT_PAGE_SIZE};
pub use repository::{Repository, WriteHandle, WriteOutcome};
pub use source::{PagedSource, PagedSourceFactory};
pub use store::{RecordId, RecordStore};
