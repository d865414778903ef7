//! Run-scoped remote folder resolution
//!
//! [`FolderResolver`] maps `(parent, name)` keys to remote folder ids:
//! - Resolved ids are cached for the lifetime of the resolver
//! - The first caller for an uncached key performs the lookup/create; every
//!   concurrent caller for that key awaits the same single-flight cell and
//!   receives the same result, success or failure
//! - The in-flight cell is dropped once it settles, so a failed key is retried
//!   fresh by the next caller
//!
//! A resolver belongs to exactly one generation run. Construct a new one per run.

use dashmap::DashMap;
use rollcall_core::{FolderId, StorageError, StorageProvider};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Deduplication key for folder creation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderKey {
    /// Parent folder
    pub parent: FolderId,
    /// Child folder name
    pub name: String,
}

impl FolderKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(parent: FolderId, name: impl Into<String>) -> Self {
        Self {
            parent,
            name: name.into(),
        }
    }
}

type Flight = Arc<OnceCell<Result<FolderId, String>>>;

/// Deduplicating, concurrency-safe folder resolver
pub struct FolderResolver {
    provider: Arc<dyn StorageProvider>,
    cache: DashMap<FolderKey, FolderId>,
    in_flight: DashMap<FolderKey, Flight>,
}

impl std::fmt::Debug for FolderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderResolver")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl FolderResolver {
    /// Create an empty resolver over a provider
    #[must_use]
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Resolve `name` under `parent`, creating it remotely if absent
    ///
    /// # Errors
    /// - `StorageError::FolderResolution` if the lookup or create call failed;
    ///   every caller that joined the same flight receives the same error
    pub async fn resolve(&self, parent: &FolderId, name: &str) -> Result<FolderId, StorageError> {
        let key = FolderKey::new(parent.clone(), name);
        if let Some(id) = self.cached(&key) {
            return Ok(id);
        }

        // Clone the cell out so no shard lock is held across the await
        let flight: Flight = self.in_flight.entry(key.clone()).or_default().clone();

        let outcome = flight
            .get_or_init(|| async {
                // A previous flight may have settled between the cache check and now
                if let Some(id) = self.cached(&key) {
                    return Ok(id);
                }
                match self.lookup_or_create(&key).await {
                    Ok(id) => {
                        self.cache.insert(key.clone(), id.clone());
                        Ok(id)
                    }
                    Err(e) => Err(e.to_string()),
                }
            })
            .await
            .clone();

        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &flight));

        outcome.map_err(|message| StorageError::FolderResolution {
            parent: key.parent.to_string(),
            name: key.name.clone(),
            message,
        })
    }

    /// Resolve a chain of folder names starting at `root`
    ///
    /// # Errors
    /// Stops at the first segment that fails to resolve.
    pub async fn resolve_path(
        &self,
        root: &FolderId,
        segments: &[&str],
    ) -> Result<FolderId, StorageError> {
        let mut current = root.clone();
        for segment in segments {
            current = self.resolve(&current, segment).await?;
        }
        Ok(current)
    }

    /// Cached id for a key, if resolved
    #[inline]
    #[must_use]
    pub fn cached(&self, key: &FolderKey) -> Option<FolderId> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Number of resolved keys
    #[inline]
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Number of unsettled keys
    #[inline]
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    async fn lookup_or_create(&self, key: &FolderKey) -> Result<FolderId, StorageError> {
        if let Some(existing) = self.provider.find_folder(&key.parent, &key.name).await? {
            debug!(parent = %key.parent, name = %key.name, folder = %existing, "reusing remote folder");
            return Ok(existing);
        }
        let created = self.provider.create_folder(&key.parent, &key.name).await?;
        info!(parent = %key.parent, name = %key.name, folder = %created, "created remote folder");
        Ok(created)
    }
}
