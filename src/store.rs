// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store cache.
//!
//! Serves the full user list from a time-bounded cached copy and coalesces
//! concurrent fetches: while one fetch is in flight every caller awaits that
//! same result instead of issuing another network call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::RecordSource;
use crate::clock::{Clock, SystemClock};
use crate::errors::FetchError;
use crate::pagination::PageWindow;
use crate::record::User;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600); // 10 minutes

pub type Records = Vec<Arc<User>>;

type SharedFetch = Shared<BoxFuture<'static, Result<Records, FetchError>>>;

struct CacheEntry {
    records: Records,
    fetched_at: u64,
    expires_at: u64,
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct StoreState {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
    generation: u64,
}

/// Observability snapshot, see [`RecordStore::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub cached: bool,
    pub count: usize,
    pub age_ms: Option<u64>,
    pub remaining_ttl_ms: Option<u64>,
    pub in_flight: bool,
}

/// One page of records with the totals a pager needs.
#[derive(Debug, Clone, Serialize)]
pub struct PagedRecords {
    pub records: Records,
    pub total: usize,
    pub total_pages: usize,
}

pub struct RecordStore {
    source: Arc<dyn RecordSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Mutex<StoreState>,
}

impl RecordStore {
    pub fn new(source: Arc<dyn RecordSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Store with the system clock and the default TTL.
    pub fn with_source(source: Arc<dyn RecordSource>) -> Self {
        Self::new(source, Arc::new(SystemClock), DEFAULT_CACHE_TTL)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every record, from cache when fresh, else from the (possibly shared)
    /// in-flight fetch, else from a new fetch.
    ///
    /// Failures are returned to every waiter and never cached.
    pub async fn get_all(&self) -> Result<Records, FetchError> {
        let (fetch, generation) = {
            let mut state = self.lock();
            let now = self.clock.now_ms();
            if let Some(entry) = state.entry.as_ref().filter(|e| now < e.expires_at) {
                debug!(count = entry.records.len(), "record cache hit");
                return Ok(entry.records.clone());
            }
            match state.in_flight.as_ref() {
                Some(in_flight) => {
                    debug!("joining in-flight record fetch");
                    (in_flight.fetch.clone(), in_flight.generation)
                }
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let fetch = self.start_fetch();
                    state.in_flight = Some(InFlight {
                        generation,
                        fetch: fetch.clone(),
                    });
                    (fetch, generation)
                }
            }
        };

        let result = fetch.await;

        let mut state = self.lock();
        let owns_flight = state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation);
        if owns_flight {
            state.in_flight = None;
            match &result {
                Ok(records) => {
                    let now = self.clock.now_ms();
                    state.entry = Some(CacheEntry {
                        records: records.clone(),
                        fetched_at: now,
                        expires_at: now.saturating_add(self.ttl.as_millis() as u64),
                    });
                    info!(
                        endpoint = self.source.endpoint(),
                        count = records.len(),
                        "cached users"
                    );
                }
                Err(error) => {
                    warn!(endpoint = self.source.endpoint(), %error, "user fetch failed");
                }
            }
        }
        result
    }

    fn start_fetch(&self) -> SharedFetch {
        let request = self.source.fetch_all();
        async move {
            let users = request.await?;
            let total = users.len();
            let records: Records = users
                .into_iter()
                .filter(|user| user.is_valid())
                .map(Arc::new)
                .collect();
            if records.len() != total {
                warn!(dropped = total - records.len(), "dropped invalid user records");
            }
            Ok(records)
        }
        .boxed()
        .shared()
    }

    /// One record, served from a fresh cached list when it is there.
    pub async fn get_by_id(&self, id: u64) -> Result<Arc<User>, FetchError> {
        if let Some(user) = self.cached_record(id) {
            return Ok(user);
        }
        let user = self.source.fetch_one(id).await?;
        Ok(Arc::new(user))
    }

    fn cached_record(&self, id: u64) -> Option<Arc<User>> {
        let state = self.lock();
        let now = self.clock.now_ms();
        state
            .entry
            .as_ref()
            .filter(|e| now < e.expires_at)?
            .records
            .iter()
            .find(|user| user.id == id)
            .cloned()
    }

    /// Fetch everything, then slice out `page` (1-based) of `limit` records.
    pub async fn get_page(&self, page: usize, limit: usize) -> Result<PagedRecords, FetchError> {
        let all = self.get_all().await?;
        let window = PageWindow::compute(all.len(), page.max(1), limit.max(1));
        Ok(PagedRecords {
            records: window.slice(&all).to_vec(),
            total: all.len(),
            total_pages: window.total_pages,
        })
    }

    /// Drop the cached list and forget any in-flight fetch.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.in_flight = None;
        debug!("record cache cleared");
    }

    pub fn info(&self) -> CacheInfo {
        let state = self.lock();
        let now = self.clock.now_ms();
        let in_flight = state.in_flight.is_some();
        match state.entry.as_ref() {
            Some(entry) => CacheInfo {
                cached: now < entry.expires_at,
                count: entry.records.len(),
                age_ms: Some(now.saturating_sub(entry.fetched_at)),
                remaining_ttl_ms: Some(entry.expires_at.saturating_sub(now)),
                in_flight,
            },
            None => CacheInfo {
                cached: false,
                count: 0,
                age_ms: None,
                remaining_ttl_ms: None,
                in_flight,
            },
        }
    }
}
