//! Paging configuration and window types.

use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Windowing configuration for a paged view.
///
/// `prefetch_distance` and `initial_load_size` are optional; unset values
/// resolve to the page size and three pages respectively.
///
/// # Examples
///
/// ```
/// use paged_store::PagingConfig;
///
/// let config = PagingConfig::new(20)
///     .prefetch_distance(10)
///     .initial_load_size(40);
///
/// assert_eq!(config.page_size, 20);
/// assert_eq!(config.prefetch(), 10);
/// assert_eq!(config.initial_load(), 40);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Number of records loaded per page. Must be greater than zero.
    pub page_size: usize,

    /// How close the consumer may get to the loaded edge before the next page
    /// is requested. Defaults to `page_size`.
    pub prefetch_distance: Option<usize>,

    /// How many records the first load pass materializes. Defaults to
    /// `page_size * 3`; must be a positive multiple of `page_size` when
    /// placeholders are enabled.
    pub initial_load_size: Option<usize>,

    /// When enabled the window reports the full backing count as its length
    /// and unloaded indexes read as placeholders. Placeholders require a
    /// known total, hence the multiple-of-page-size constraint above.
    pub enable_placeholders: bool,
}

impl PagingConfig {
    /// Create a configuration with the given page size and defaults for
    /// everything else.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            prefetch_distance: None,
            initial_load_size: None,
            enable_placeholders: true,
        }
    }

    /// Set the prefetch distance.
    pub fn prefetch_distance(mut self, distance: usize) -> Self {
        self.prefetch_distance = Some(distance);
        self
    }

    /// Set the initial load size.
    pub fn initial_load_size(mut self, size: usize) -> Self {
        self.initial_load_size = Some(size);
        self
    }

    /// Enable or disable placeholders.
    pub fn enable_placeholders(mut self, enabled: bool) -> Self {
        self.enable_placeholders = enabled;
        self
    }

    /// Resolved prefetch distance.
    pub fn prefetch(&self) -> usize {
        self.prefetch_distance.unwrap_or(self.page_size)
    }

    /// Resolved initial load size.
    pub fn initial_load(&self) -> usize {
        self.initial_load_size.unwrap_or(self.page_size * 3)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] when `page_size` is zero, the
    /// resolved initial load size is zero, or placeholders are enabled and the
    /// initial load size is not a multiple of the page size.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StoreError::Configuration {
                field: "page_size",
                message: "must be greater than zero".to_string(),
            });
        }

        let initial = self.initial_load();
        if initial == 0 {
            return Err(StoreError::Configuration {
                field: "initial_load_size",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.enable_placeholders && initial % self.page_size != 0 {
            return Err(StoreError::Configuration {
                field: "initial_load_size",
                message: format!(
                    "must be a multiple of page_size ({}) when placeholders are enabled",
                    self.page_size
                ),
            });
        }

        Ok(())
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// The materialized slice of the backing result set currently held in memory.
///
/// A window always leads the backing query: the loaded records cover offsets
/// `0..loaded_len()`, so an index into the window is also an absolute offset
/// into the backing set. The window is replaced wholesale on every recompute
/// and never patched in place; an observer sees either the previous window or
/// a complete new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow<T> {
    items: Vec<T>,
    total: usize,
    placeholders: bool,
}

impl<T> PageWindow<T> {
    pub(crate) fn new(items: Vec<T>, total: usize, placeholders: bool) -> Self {
        Self {
            items,
            total,
            placeholders,
        }
    }

    /// Apparent length of the window: the full backing count when
    /// placeholders are enabled, otherwise the loaded count.
    pub fn len(&self) -> usize {
        if self.placeholders {
            self.total
        } else {
            self.items.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records actually materialized.
    pub fn loaded_len(&self) -> usize {
        self.items.len()
    }

    /// Total number of records in the backing result set.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Record at the given offset, or `None` for a placeholder or an
    /// out-of-range index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// The loaded records, in backing-set order.
    pub fn loaded(&self) -> &[T] {
        &self.items
    }
}

/// A signal about the window's edges, not about data mutations.
///
/// Fired by the paged source when a load pass observes that the window
/// coincides with a true edge of the backing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryEvent<T> {
    /// A fresh query yielded no rows at all.
    ZeroItems,
    /// The window's leading record is the true first record of the backing
    /// query. Reserved; this loader always leads the query.
    FrontReached(T),
    /// The window's trailing record is the last record the backing query can
    /// produce. A subscriber may react by asking an external source to
    /// produce more records.
    EndReached(T),
}
