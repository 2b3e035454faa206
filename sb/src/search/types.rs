//! Search request/response types and the backend boundary

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deferred::{Deferred, Suspense};
use crate::domain::Product;
use crate::mailbox::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Search backend error: {0}")]
    Backend(String),

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::Timeout(_))
    }
}

/// What caused a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTrigger {
    Input,
    Focus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub term: String,
    #[serde(default)]
    pub products: Vec<Product>,
    /// Suggested query completions
    #[serde(default)]
    pub queries: Vec<String>,
}

impl SearchResults {
    pub fn empty(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.queries.is_empty()
    }
}

/// Where predictive queries are answered
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn predictive_search(&self, query: &SearchQuery) -> Result<SearchResults, SearchError>;
}

/// One dispatched query: its generation and its deferred results
#[derive(Debug, Clone)]
pub struct SearchTicket {
    pub(crate) ticket: Ticket,
    pub term: String,
    pub trigger: SearchTrigger,
    pub deferred: Deferred<SearchResults>,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.ticket.generation()
    }

    /// Render this ticket's results through `projection`
    pub fn view<R>(&self, projection: impl Fn(&SearchResults) -> R + Send + Sync + 'static) -> Suspense<SearchResults, R>
    where
        R: Clone + Send + Sync + 'static,
    {
        Suspense::new("search-results", self.deferred.clone(), projection)
    }
}
