//! Cache for listing payloads.
//!
//! Each listing (a page plus its stats block) is cached under the view it
//! belongs to and a key built from its filter and page. Mutations bump the
//! generation of every view they affect, so entries loaded before the bump
//! are never served again; stale entries age out with the TTL.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// A family of listing pages invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Warehouses,
    Spaces,
    /// Public list of available spaces.
    Catalog,
    Agreements,
    Invoices,
    Tickets,
    Clients,
    SpaceRequests,
    Analytics,
}

impl View {
    const COUNT: usize = 9;

    const fn index(self) -> usize {
        self as usize
    }
}

/// Views whose contents depend on space status.
pub const SPACE_STATUS_VIEWS: &[View] = &[
    View::Spaces,
    View::Catalog,
    View::Warehouses,
    View::Analytics,
];

/// Views that show a space's or warehouse's code, name or status.
pub const SPACE_DETAIL_VIEWS: &[View] = &[
    View::Spaces,
    View::Catalog,
    View::Warehouses,
    View::Analytics,
    View::Agreements,
    View::Invoices,
    View::Tickets,
    View::SpaceRequests,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViewKey {
    view: View,
    generation: u64,
    key: String,
}

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Listing cache shared by all requests.
pub struct ViewCache {
    entries: Cache<ViewKey, CachedValue>,
    generations: [AtomicU64; View::COUNT],
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCache {
    #[must_use]
    pub fn new() -> Self {
        let entries = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self {
            entries,
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Return the cached payload for `(view, key)` or load and cache it.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; failures are not cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, view: View, key: String, load: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache_key = ViewKey {
            view,
            generation: self.generation(view),
            key,
        };

        if let Some(cached) = self.entries.get(&cache_key).await
            && let Some(hit) = cached.downcast_ref::<T>()
        {
            debug!(?view, key = %cache_key.key, "View cache hit");
            return Ok(hit.clone());
        }

        let fresh = load().await?;
        self.entries
            .insert(cache_key, Arc::new(fresh.clone()))
            .await;
        Ok(fresh)
    }

    /// Drop every cached page of `views`.
    pub fn invalidate(&self, views: &[View]) {
        for view in views {
            self.counter(*view).fetch_add(1, Ordering::SeqCst);
            debug!(?view, "View invalidated");
        }
    }

    /// How many times `view` has been invalidated since startup.
    #[must_use]
    pub fn invalidation_count(&self, view: View) -> u64 {
        self.generation(view)
    }

    fn generation(&self, view: View) -> u64 {
        self.counter(view).load(Ordering::SeqCst)
    }

    #[allow(clippy::indexing_slicing)] // View::COUNT covers every variant
    fn counter(&self, view: View) -> &AtomicU64 {
        &self.generations[view.index()]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    async fn load(cache: &ViewCache, calls: &AtomicUsize, view: View) -> Vec<u32> {
        cache
            .get_or_load(view, "page=1".to_owned(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(vec![1, 2, 3])
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let cache = ViewCache::new();
        let calls = AtomicUsize::new(0);

        assert_eq!(load(&cache, &calls, View::Spaces).await, vec![1, 2, 3]);
        load(&cache, &calls, View::Spaces).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_reloads_only_that_view() {
        let cache = ViewCache::new();
        let calls = AtomicUsize::new(0);

        load(&cache, &calls, View::Spaces).await;
        load(&cache, &calls, View::Invoices).await;
        cache.invalidate(&[View::Spaces]);
        load(&cache, &calls, View::Spaces).await;
        load(&cache, &calls, View::Invoices).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.invalidation_count(View::Spaces), 1);
        assert_eq!(cache.invalidation_count(View::Invoices), 0);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ViewCache::new();
        let failed: Result<u32, &str> = cache
            .get_or_load(View::Tickets, "k".to_owned(), || async { Err("down") })
            .await;
        assert!(failed.is_err());

        let ok: Result<u32, &str> = cache
            .get_or_load(View::Tickets, "k".to_owned(), || async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }
}
