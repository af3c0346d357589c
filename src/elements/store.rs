use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use super::error::StoreError;
use super::types::ElementSet;

struct Collection {
    sets: HashMap<u32, Arc<ElementSet>>,
    last_refreshed: Option<DateTime<Utc>>,
    max_age: Duration,
}

impl Collection {
    fn new(max_age: Duration) -> Self {
        Self {
            sets: HashMap::new(),
            last_refreshed: None,
            max_age,
        }
    }
}

/// In-memory element-set cache, grouped by named collection. Shared across
/// all propagation requests; reads hand out `Arc` clones so callers never
/// hold the lock while computing.
pub struct ElementStore {
    collections: RwLock<HashMap<String, Collection>>,
    default_max_age: Duration,
}

impl ElementStore {
    pub fn new(default_max_age: Duration) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            default_max_age,
        }
    }

    /// Register a collection with its own staleness threshold. Idempotent;
    /// an existing collection keeps its content but adopts the threshold.
    pub fn create_collection(&self, name: &str, max_age: Duration) {
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(name.to_string())
            .and_modify(|c| c.max_age = max_age)
            .or_insert_with(|| Collection::new(max_age));
    }

    pub fn get(&self, collection: &str, norad_id: u32) -> Result<Arc<ElementSet>, StoreError> {
        let collections = self.collections.read().unwrap();
        let col = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        col.sets
            .get(&norad_id)
            .cloned()
            .ok_or(StoreError::NotFound(norad_id))
    }

    /// Scan every collection for a catalog id. This is the cache-first
    /// lookup consulted before anything contacts the upstream source.
    pub fn find(&self, norad_id: u32) -> Option<Arc<ElementSet>> {
        let collections = self.collections.read().unwrap();
        collections
            .values()
            .find_map(|c| c.sets.get(&norad_id).cloned())
    }

    /// Snapshot of a collection's element sets, not a live view.
    pub fn all(&self, collection: &str) -> Result<Vec<Arc<ElementSet>>, StoreError> {
        let collections = self.collections.read().unwrap();
        let col = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(col.sets.values().cloned().collect())
    }

    pub fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().unwrap();
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert one element set without touching freshness. Synthetic and test
    /// inserts go through here; refresh results go through `put_refreshed`.
    pub fn put(&self, collection: &str, set: ElementSet) {
        let mut collections = self.collections.write().unwrap();
        let col = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(self.default_max_age));
        col.sets.insert(set.norad_id, Arc::new(set));
    }

    /// Replace a collection's content with a successful refresh result and
    /// advance the last-refreshed instant. The instant never moves backwards
    /// here; `touch` is the explicit-reset path.
    pub fn put_refreshed(&self, collection: &str, sets: Vec<ElementSet>, refreshed: DateTime<Utc>) {
        let mut collections = self.collections.write().unwrap();
        let col = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(self.default_max_age));
        col.sets = sets
            .into_iter()
            .map(|s| (s.norad_id, Arc::new(s)))
            .collect();
        if col.last_refreshed.map_or(true, |t| refreshed >= t) {
            col.last_refreshed = Some(refreshed);
        }
    }

    /// Explicitly set the last-refreshed instant, including backwards.
    pub fn touch(&self, collection: &str, instant: DateTime<Utc>) {
        let mut collections = self.collections.write().unwrap();
        let col = collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(self.default_max_age));
        col.last_refreshed = Some(instant);
    }

    /// Advisory staleness check. Unknown and never-refreshed collections are
    /// maximally stale; the store never rejects reads for staleness.
    pub fn is_stale(&self, collection: &str, now: DateTime<Utc>) -> bool {
        let collections = self.collections.read().unwrap();
        match collections.get(collection) {
            Some(col) => col
                .last_refreshed
                .map_or(true, |t| now.signed_duration_since(t) >= col.max_age),
            None => true,
        }
    }

    pub fn last_refreshed(&self, collection: &str) -> Option<DateTime<Utc>> {
        let collections = self.collections.read().unwrap();
        collections.get(collection).and_then(|c| c.last_refreshed)
    }
}
