//! Scripted predictive search backend

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::fixture::Fixture;
use crate::domain::Product;
use crate::search::{SearchBackend, SearchError, SearchQuery, SearchResults};

/// Matches terms against product titles, with per-term latency
pub struct ScriptedSearch {
    catalog: Vec<Product>,
    latencies: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicU64,
}

impl Default for ScriptedSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSearch {
    /// Backend over the demo catalog
    pub fn new() -> Self {
        Self::with_catalog(Fixture::demo().products)
    }

    pub fn with_catalog(catalog: Vec<Product>) -> Self {
        Self {
            catalog,
            latencies: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn set_latency(&self, term: &str, latency: Duration) {
        self.latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(term.to_string(), latency);
    }

    pub fn fail_term(&self, term: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(term.to_string());
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    async fn predictive_search(&self, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self
            .latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&query.term)
            .copied()
            .unwrap_or_default();
        let fails = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&query.term);
        debug!(term = %query.term, ?latency, "ScriptedSearch::predictive_search: called");

        tokio::time::sleep(latency).await;
        if fails {
            return Err(SearchError::Backend(format!("query failed for \"{}\"", query.term)));
        }

        let needle = query.term.to_lowercase();
        let products: Vec<Product> = self
            .catalog
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .take(query.limit)
            .cloned()
            .collect();
        let queries = products
            .iter()
            .map(|p| p.title.to_lowercase())
            .filter(|title| *title != needle)
            .take(3)
            .collect();

        Ok(SearchResults {
            term: query.term.clone(),
            products,
            queries,
        })
    }
}
