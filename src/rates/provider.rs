//! Session rate cache with live refresh and fallback
//!
//! The provider owns a read-mostly cache of the last successful live fetch.
//! A refresh is started at most once per provider and runs in the
//! background; callers that need a rate right away either read the cache as
//! it stands or wait for the refresh with a bound. Fetch failures never reach
//! the caller: they are logged and the fallback table keeps serving.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::source::{LiveRate, RateSource};
use crate::error::RateFetchError;
use super::{IndexKind, IndexRate, Provenance, RateTable, DEFAULT_INDEX};

/// Default upper bound on a single live fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bounded wait for an in-flight refresh
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RateIndexProvider {
    fallback: RateTable,
    source: Option<Arc<dyn RateSource>>,
    fetch_timeout: Duration,
    live: RwLock<HashMap<String, IndexRate>>,
    refresh_started: AtomicBool,
    /// `true` once a refresh has finished (successfully or not)
    ready: watch::Sender<bool>,
}

impl RateIndexProvider {
    /// Provider that only ever serves the fallback table
    pub fn offline(fallback: RateTable) -> Self {
        let (ready, _) = watch::channel(true);
        Self {
            fallback,
            source: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            live: RwLock::new(HashMap::new()),
            refresh_started: AtomicBool::new(true),
            ready,
        }
    }

    /// Provider backed by a live source
    pub fn with_source(fallback: RateTable, source: Arc<dyn RateSource>, fetch_timeout: Duration) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            fallback,
            source: Some(source),
            fetch_timeout,
            live: RwLock::new(HashMap::new()),
            refresh_started: AtomicBool::new(false),
            ready,
        }
    }

    pub fn fallback_table(&self) -> &RateTable {
        &self.fallback
    }

    /// Whether a refresh has completed (always true for offline providers)
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Whether any live rate is cached
    pub fn has_live_rates(&self) -> bool {
        !self.read_live().is_empty()
    }

    /// Start the background refresh if this is the first call
    ///
    /// Returns the task handle on the first call only. Must be called from
    /// within a Tokio runtime.
    pub fn start_refresh(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.source.is_none() || self.refresh_started.swap(true, Ordering::SeqCst) {
            return None;
        }

        let provider = Arc::clone(self);
        Some(tokio::spawn(async move {
            provider.refresh().await;
        }))
    }

    /// Fetch live rates now, replacing the cache on success
    ///
    /// Returns whether live rates were stored. A failed fetch keeps any
    /// previously cached live rates.
    pub async fn refresh(&self) -> bool {
        self.refresh_started.store(true, Ordering::SeqCst);

        let source = match &self.source {
            Some(source) => Arc::clone(source),
            None => {
                debug!("No live rate source configured, using fallback table");
                self.ready.send_replace(true);
                return false;
            }
        };

        let result = match tokio::time::timeout(self.fetch_timeout, source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(RateFetchError::Timeout(self.fetch_timeout)),
        };

        let stored = match result {
            Ok(rates) => self.store_live(source.name(), rates),
            Err(e) => {
                warn!("Live rate fetch from {} failed, using estimated rates: {}", source.name(), e);
                false
            }
        };

        self.ready.send_replace(true);
        stored
    }

    fn store_live(&self, source_name: &str, rates: Vec<LiveRate>) -> bool {
        let mut table = HashMap::with_capacity(rates.len());

        for live in rates {
            if !live.rate.is_finite() {
                warn!("Ignoring non-finite rate for '{}' from {}", live.index, source_name);
                continue;
            }
            let key = RateTable::key_for(&live.index);
            let rate = IndexRate {
                name: RateTable::display_name_for(&key),
                index: key.clone(),
                rate: live.rate,
                provenance: live.provenance,
            };
            table.insert(key, rate);
        }

        if table.is_empty() {
            warn!("{} returned no usable rates, using estimated rates", source_name);
            return false;
        }

        info!("Loaded {} live index rates from {}", table.len(), source_name);
        *self.live.write().unwrap_or_else(|e| e.into_inner()) = table;
        true
    }

    /// Wait up to `timeout` for the refresh to finish
    ///
    /// Returns whether it finished in time. Never waits when no refresh is
    /// pending or none was started.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        if !self.refresh_started.load(Ordering::SeqCst) {
            return false;
        }

        let mut rx = self.ready.subscribe();
        let finished = matches!(tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await, Ok(Ok(_)));
        if !finished {
            debug!("Rate refresh still pending after {:?}, using cached rates", timeout);
        }
        finished
    }

    /// Monthly rate for an index from the current cache
    ///
    /// Order: live cache, fallback table, then the default index's fallback
    /// rate for names unknown to both.
    pub fn get_rate(&self, index_name: &str) -> IndexRate {
        let key = RateTable::key_for(index_name);

        if let Some(rate) = self.read_live().get(&key) {
            return rate.clone();
        }

        if let Some(rate) = self.fallback.get(&key) {
            return IndexRate {
                name: RateTable::display_name_for(&key),
                index: key,
                rate,
                provenance: Provenance::Estimated,
            };
        }

        debug!("Unknown index '{}', falling back to {}", index_name, DEFAULT_INDEX.display_name());
        IndexRate {
            index: DEFAULT_INDEX.id().to_string(),
            name: DEFAULT_INDEX.display_name().to_string(),
            rate: self
                .fallback
                .get(DEFAULT_INDEX.id())
                .unwrap_or_else(|| DEFAULT_INDEX.fallback_rate()),
            provenance: Provenance::Estimated,
        }
    }

    /// Rate lookup after a bounded wait on the session refresh
    ///
    /// The first lookup starts the refresh if nothing has yet.
    pub async fn resolve_rate(self: &Arc<Self>, index_name: &str, timeout: Duration) -> IndexRate {
        self.start_refresh();
        self.wait_ready(timeout).await;
        self.get_rate(index_name)
    }

    /// Current rate of every supported index, plus any extra fallback entries
    pub fn snapshot(&self) -> Vec<IndexRate> {
        let mut keys: Vec<String> = IndexKind::ALL.iter().map(|k| k.id().to_string()).collect();
        for key in self.fallback.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.iter().map(|k| self.get_rate(k)).collect()
    }

    fn read_live(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, IndexRate>> {
        self.live.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateIndexProvider {
    fn default() -> Self {
        Self::offline(RateTable::fallback())
    }
}

impl std::fmt::Debug for RateIndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateIndexProvider")
            .field("fallback", &self.fallback)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("ready", &self.is_ready())
            .finish()
    }
}
