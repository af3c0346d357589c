use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::elements::{element_sets_from_text, CacheDir, ElementSet, ElementStore};

use super::error::FetchError;
use super::http::TleSource;

/// Pulls element-set collections from the upstream source, cache-first:
/// staleness, not request volume, gates outbound calls.
pub struct SourceFetcher {
    store: Arc<ElementStore>,
    cache: CacheDir,
    source: Arc<dyn TleSource>,
    base_url: String,
    /// collection name -> upstream group selector, when they differ.
    groups: HashMap<String, String>,
    max_attempts: u32,
    retry_delay: Duration,
    /// One gate per collection so concurrent staleness checks cannot issue
    /// duplicate upstream calls; late arrivals wait on the gate, then
    /// re-check freshness.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SourceFetcher {
    pub fn new(
        store: Arc<ElementStore>,
        cache: CacheDir,
        source: Arc<dyn TleSource>,
        base_url: String,
        groups: HashMap<String, String>,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            source,
            base_url,
            groups,
            max_attempts,
            retry_delay,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh a collection if and only if it is stale. Returns the number
    /// of element sets updated (zero when the cache was still fresh).
    pub fn refresh(&self, collection: &str) -> Result<usize, FetchError> {
        if !self.store.is_stale(collection, Utc::now()) {
            return Ok(0);
        }

        let gate = {
            let mut inflight = self.inflight.lock().unwrap();
            inflight
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().unwrap();

        // Another caller may have finished a refresh while we waited.
        if !self.store.is_stale(collection, Utc::now()) {
            return Ok(0);
        }

        self.refresh_upstream(collection)
    }

    fn refresh_upstream(&self, collection: &str) -> Result<usize, FetchError> {
        let group = self
            .groups
            .get(collection)
            .map(String::as_str)
            .unwrap_or(collection);
        let url = format!("{}?GROUP={}&FORMAT=tle", self.base_url, group);
        let stale_available = self
            .store
            .all(collection)
            .map(|sets| !sets.is_empty())
            .unwrap_or(false);

        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            match self.source.fetch(&url).and_then(|body| parse_payload(&body)) {
                Ok(sets) => {
                    let count = sets.len();
                    let refreshed = Utc::now();
                    self.store.put_refreshed(collection, sets, refreshed);
                    // the refresh itself succeeded; a failed cache write only
                    // costs the next startup its warm copy
                    if let Ok(snapshot) = self.store.all(collection) {
                        if let Err(e) = self.cache.save(collection, refreshed, &snapshot) {
                            log::warn!(
                                "Refreshed {} but could not persist its cache file: {}",
                                collection,
                                e
                            );
                        }
                    }
                    log::info!("Refreshed {} element sets for {}", count, collection);
                    return Ok(count);
                }
                Err(FetchError::Throttled { status, .. }) => {
                    log::warn!(
                        "Upstream throttled refresh of {} (HTTP {}); keeping cached elements",
                        collection,
                        status
                    );
                    return Err(FetchError::Throttled {
                        status,
                        stale_available,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Refresh attempt {}/{} for {} failed: {}",
                        attempt,
                        self.max_attempts,
                        collection,
                        e
                    );
                    last = e.to_string();
                    if attempt < self.max_attempts {
                        std::thread::sleep(self.retry_delay);
                    }
                }
            }
        }

        Err(FetchError::Unavailable {
            attempts: self.max_attempts,
            last,
            stale_available,
        })
    }

    /// Resolve one catalog id, scanning every cached collection before any
    /// upstream contact. Misses fall through to a per-id upstream query and
    /// land in the `adhoc` collection without touching its freshness.
    pub fn lookup(&self, norad_id: u32) -> Result<Arc<ElementSet>, FetchError> {
        if let Some(set) = self.store.find(norad_id) {
            return Ok(set);
        }

        let url = format!("{}?CATNR={}&FORMAT=tle", self.base_url, norad_id);
        let body = self.source.fetch(&url)?;
        let mut sets = parse_payload(&body)?;
        let set = sets
            .drain(..)
            .find(|s| s.norad_id == norad_id)
            .ok_or_else(|| {
                FetchError::Malformed(format!("upstream response did not contain {}", norad_id))
            })?;
        self.store.put("adhoc", set);
        self.store
            .find(norad_id)
            .ok_or(FetchError::Malformed("store insert failed".to_string()))
    }
}

fn parse_payload(body: &str) -> Result<Vec<ElementSet>, FetchError> {
    let sets = element_sets_from_text(body);
    if sets.is_empty() {
        return Err(FetchError::Malformed(
            "no parseable element sets in response".to_string(),
        ));
    }
    Ok(sets)
}
