// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query execution over a [`SearchIndex`] with a bounded result cache.
//!
//! Matching is a boolean heuristic: results keep index order and are not
//! ranked. The default [`TokenMatch`] strategy accepts an entry when any of
//! these hold:
//!
//! 1. the searchable text contains the whole normalized query,
//! 2. a multi-token query has every token inside some entry token,
//! 3. a single-token query and some entry token contain one another.
//!
//! Rule 3 is deliberately loose: a very short entry token (a one-letter name
//! word, say) is contained in many queries and will match them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::{Fingerprint, IndexEntry, SearchIndex};
use crate::record::User;

pub const RESULT_CACHE_CAPACITY: usize = 100;
pub const RESULT_CACHE_EVICT_BATCH: usize = 20;

/// Trimmed, lower-cased query used as the cache key.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

fn query_tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Pluggable boolean match over one index entry.
pub trait MatchStrategy: Send + Sync {
    /// `normalized` is trimmed and lower-cased, `tokens` is its whitespace split.
    fn matches(&self, entry: &IndexEntry, normalized: &str, tokens: &[&str]) -> bool;

    fn name(&self) -> &'static str;
}

/// Containment over the text blob and token set.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenMatch;

impl MatchStrategy for TokenMatch {
    fn matches(&self, entry: &IndexEntry, normalized: &str, tokens: &[&str]) -> bool {
        if entry.searchable_text.contains(normalized) {
            return true;
        }

        if tokens.len() > 1 {
            return tokens
                .iter()
                .all(|query| entry.tokens.iter().any(|token| token.contains(query)));
        }

        entry
            .tokens
            .iter()
            .any(|token| token.contains(normalized) || normalized.contains(token.as_str()))
    }

    fn name(&self) -> &'static str {
        "token"
    }
}

/// Plain substring match on name, email, username or company name.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldMatch;

impl MatchStrategy for FieldMatch {
    fn matches(&self, entry: &IndexEntry, normalized: &str, _tokens: &[&str]) -> bool {
        let user = &entry.record;
        [&user.name, &user.email, &user.username, &user.company.name]
            .iter()
            .any(|field| field.to_lowercase().contains(normalized))
    }

    fn name(&self) -> &'static str {
        "field"
    }
}

/// Post-search restriction to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFilter {
    #[default]
    All,
    Name,
    Email,
    Company,
}

impl FieldFilter {
    /// Keep records whose chosen field contains `term` (case-insensitive).
    /// `All` and blank terms pass everything through.
    pub fn apply(self, records: Vec<Arc<User>>, term: &str) -> Vec<Arc<User>> {
        let needle = term.to_lowercase();
        if self == FieldFilter::All || needle.trim().is_empty() {
            return records;
        }
        records
            .into_iter()
            .filter(|user| {
                let field = match self {
                    FieldFilter::Name => &user.name,
                    FieldFilter::Email => &user.email,
                    FieldFilter::Company => &user.company.name,
                    FieldFilter::All => return true,
                };
                field.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldFilter::All => "all",
            FieldFilter::Name => "name",
            FieldFilter::Email => "email",
            FieldFilter::Company => "company",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SearchStats {
    pub total_results: usize,
    /// Computation time of the last cache miss.
    pub search_time_ms: f64,
    pub cache_hit: bool,
}

/// Normalized query to result list, evicting the oldest inserts in batches.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, Vec<Arc<User>>>,
    order: VecDeque<String>,
}

impl ResultCache {
    pub fn get(&self, key: &str) -> Option<&Vec<Arc<User>>> {
        self.entries.get(key)
    }

    /// Insert, then drop the oldest [`RESULT_CACHE_EVICT_BATCH`] keys once
    /// the size exceeds [`RESULT_CACHE_CAPACITY`].
    pub fn insert(&mut self, key: String, results: Vec<Arc<User>>) {
        if self.entries.insert(key.clone(), results).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > RESULT_CACHE_CAPACITY {
            for evicted in self.order.drain(..RESULT_CACHE_EVICT_BATCH) {
                self.entries.remove(&evicted);
            }
            debug!(remaining = self.entries.len(), "evicted oldest search results");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

pub struct SearchEngine {
    strategy: Box<dyn MatchStrategy>,
    cache: ResultCache,
    stats: SearchStats,
}

impl SearchEngine {
    pub fn new(strategy: Box<dyn MatchStrategy>) -> Self {
        Self {
            strategy,
            cache: ResultCache::default(),
            stats: SearchStats::default(),
        }
    }

    /// Records of `index` matching `query`, in index order.
    ///
    /// A blank query returns `all_records` untouched. The cache is keyed on
    /// the normalized query only, so callers must [`clear_cache`] whenever
    /// the index changes.
    ///
    /// [`clear_cache`]: SearchEngine::clear_cache
    pub fn search(
        &mut self,
        index: &SearchIndex,
        query: &str,
        all_records: &[Arc<User>],
    ) -> Vec<Arc<User>> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            self.stats = SearchStats {
                total_results: all_records.len(),
                search_time_ms: 0.0,
                cache_hit: false,
            };
            return all_records.to_vec();
        }

        if let Some(cached) = self.cache.get(&normalized) {
            debug!(query = %normalized, results = cached.len(), "search cache hit");
            self.stats.total_results = cached.len();
            self.stats.cache_hit = true;
            return cached.clone();
        }

        let started = Instant::now();
        let tokens = query_tokens(&normalized);
        let results: Vec<Arc<User>> = index
            .entries()
            .iter()
            .filter(|entry| self.strategy.matches(entry, &normalized, &tokens))
            .map(|entry| Arc::clone(&entry.record))
            .collect();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            query = %normalized,
            strategy = self.strategy.name(),
            results = results.len(),
            elapsed_ms,
            "search computed"
        );
        self.cache.insert(normalized, results.clone());
        self.stats = SearchStats {
            total_results: results.len(),
            search_time_ms: (elapsed_ms * 100.0).round() / 100.0,
            cache_hit: false,
        };
        results
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn clear_stats(&mut self, total_results: usize) {
        self.stats = SearchStats {
            total_results,
            search_time_ms: 0.0,
            cache_hit: false,
        };
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(Box::new(TokenMatch))
    }
}

/// One index and one engine for a page session.
///
/// The index is rebuilt (and the result cache dropped) only when the record
/// fingerprint changes.
#[derive(Default)]
pub struct SearchSession {
    records: Vec<Arc<User>>,
    index: SearchIndex,
    engine: SearchEngine,
}

impl SearchSession {
    pub fn new(strategy: Box<dyn MatchStrategy>) -> Self {
        Self {
            records: Vec::new(),
            index: SearchIndex::default(),
            engine: SearchEngine::new(strategy),
        }
    }

    /// Swap in a new record list. Returns whether the index was rebuilt.
    pub fn set_records(&mut self, records: Vec<Arc<User>>) -> bool {
        let fingerprint = Fingerprint::of(&records);
        let rebuild = fingerprint != self.index.fingerprint();
        if rebuild {
            self.index = SearchIndex::build(&records);
            self.engine.clear_cache();
        }
        self.records = records;
        rebuild
    }

    pub fn search(&mut self, query: &str) -> Vec<Arc<User>> {
        self.engine.search(&self.index, query, &self.records)
    }

    pub fn records(&self) -> &[Arc<User>] {
        &self.records
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SearchEngine {
        &mut self.engine
    }
}
