//! Predictive search over deferred results
//!
//! Every input or focus event dispatches a query and hands back a fresh
//! [`SearchTicket`]. Nothing is cancelled: the view binds to the newest
//! ticket and results for older ones are simply never shown.

mod client;
mod types;

pub use client::PredictiveSearchClient;
pub use types::{SearchBackend, SearchError, SearchQuery, SearchResults, SearchTicket, SearchTrigger};
