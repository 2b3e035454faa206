//! PredictiveSearchClient - debounced, last-ticket-wins query dispatch

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::types::{SearchBackend, SearchQuery, SearchResults, SearchTicket, SearchTrigger};
use crate::config::SearchConfig;
use crate::deferred::{Deferred, DeferredError};
use crate::mailbox::{Mailbox, Publish, Ticket};

struct ClientInner {
    backend: Arc<dyn SearchBackend>,
    config: SearchConfig,
    mailbox: Mailbox<SearchResults>,
    current: watch::Sender<Option<SearchTicket>>,
    backend_calls: AtomicU64,
    stale_discarded: AtomicU64,
}

/// Search box state for one page. Cloning shares it.
#[derive(Clone)]
pub struct PredictiveSearchClient {
    inner: Arc<ClientInner>,
}

impl PredictiveSearchClient {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &SearchConfig) -> Self {
        debug!(
            debounce_ms = config.debounce_ms,
            limit = config.limit,
            "PredictiveSearchClient::new: called"
        );
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(ClientInner {
                backend,
                config: config.clone(),
                mailbox: Mailbox::new(),
                current,
                backend_calls: AtomicU64::new(0),
                stale_discarded: AtomicU64::new(0),
            }),
        }
    }

    /// The search input changed
    pub fn on_input(&self, term: &str) -> SearchTicket {
        self.dispatch(term, SearchTrigger::Input)
    }

    /// The search input gained focus
    pub fn on_focus(&self, term: &str) -> SearchTicket {
        self.dispatch(term, SearchTrigger::Focus)
    }

    fn dispatch(&self, term: &str, trigger: SearchTrigger) -> SearchTicket {
        let ticket = self.inner.mailbox.ticket();
        let term = term.trim().to_string();
        debug!(generation = ticket.generation(), %term, ?trigger, "PredictiveSearchClient::dispatch: called");

        let deferred = if term.is_empty() {
            let cleared = SearchResults::empty("");
            self.inner.mailbox.publish_latest(ticket, cleared.clone());
            Deferred::resolved(cleared)
        } else {
            let inner = Arc::clone(&self.inner);
            let query_term = term.clone();
            Deferred::from_future(async move { inner.query(ticket, query_term).await })
        };

        let search_ticket = SearchTicket {
            ticket,
            term,
            trigger,
            deferred,
        };
        self.inner.current.send_replace(Some(search_ticket.clone()));
        search_ticket
    }

    /// The ticket the view is bound to
    pub fn current(&self) -> Option<SearchTicket> {
        self.inner.current.borrow().clone()
    }

    /// Wait until the newest ticket settles, then return the shown results
    ///
    /// Follows newer tickets dispatched while waiting. When the newest query
    /// failed this is the last results that did land.
    pub async fn results(&self) -> Option<SearchResults> {
        loop {
            let ticket = self.current()?;
            let _ = ticket.deferred.wait().await;
            if self.inner.mailbox.is_latest(ticket.ticket) {
                return self.inner.mailbox.current();
            }
        }
    }

    /// Most recent committed results, without waiting
    pub fn latest_results(&self) -> Option<SearchResults> {
        self.inner.mailbox.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SearchTicket>> {
        self.inner.current.subscribe()
    }

    pub fn backend_calls(&self) -> u64 {
        self.inner.backend_calls.load(Ordering::SeqCst)
    }

    pub fn stale_discarded(&self) -> u64 {
        self.inner.stale_discarded.load(Ordering::SeqCst)
    }
}

impl ClientInner {
    async fn query(&self, ticket: Ticket, term: String) -> Result<SearchResults, DeferredError> {
        if let Some(window) = self.config.debounce() {
            tokio::time::sleep(window).await;
            if !self.mailbox.is_latest(ticket) {
                debug!(generation = ticket.generation(), "ClientInner::query: superseded during debounce");
                return Err(DeferredError::Superseded);
            }
        }

        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        let query = SearchQuery {
            term,
            limit: self.config.limit,
        };
        let results = self.backend.predictive_search(&query).await.map_err(|e| {
            warn!(term = %query.term, error = %e, "Predictive search failed");
            DeferredError::Rejected(e.to_string())
        })?;

        if self.mailbox.publish_latest(ticket, results.clone()) == Publish::Stale {
            self.stale_discarded.fetch_add(1, Ordering::SeqCst);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedSearch;
    use std::time::Duration;

    fn client(backend: Arc<ScriptedSearch>, debounce_ms: u64) -> PredictiveSearchClient {
        let config = SearchConfig {
            debounce_ms,
            ..Default::default()
        };
        PredictiveSearchClient::new(backend, &config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_older_results_never_overwrite_newer() {
        let backend = Arc::new(ScriptedSearch::new());
        backend.set_latency("snow", Duration::from_millis(300));
        backend.set_latency("snowboard", Duration::from_millis(100));
        let search = client(backend.clone(), 0);

        let q1 = search.on_input("snow");
        let q2 = search.on_input("snowboard");

        let shown = search.results().await.unwrap();
        assert_eq!(shown.term, "snowboard");

        // Q1 still resolves on its own ticket, but is not shown.
        assert_eq!(q1.deferred.wait().await.unwrap().term, "snow");
        assert_eq!(search.latest_results().unwrap().term, "snowboard");
        assert_eq!(search.current().unwrap().generation(), q2.generation());
        assert_eq!(search.stale_discarded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_term_skips_backend() {
        let backend = Arc::new(ScriptedSearch::new());
        let search = client(backend.clone(), 0);

        let ticket = search.on_focus("   ");
        assert!(ticket.deferred.is_settled());
        assert!(search.results().await.unwrap().is_empty());
        assert_eq!(search.backend_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_skips_superseded_dispatch() {
        let backend = Arc::new(ScriptedSearch::new());
        let search = client(backend.clone(), 150);

        let first = search.on_input("s");
        tokio::time::sleep(Duration::from_millis(50)).await;
        search.on_input("sn");

        assert_eq!(first.deferred.wait().await.unwrap_err(), DeferredError::Superseded);
        assert_eq!(search.results().await.unwrap().term, "sn");
        assert_eq!(search.backend_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_rejects_ticket() {
        let backend = Arc::new(ScriptedSearch::new());
        backend.fail_term("boom");
        let search = client(backend, 0);

        let ticket = search.on_input("boom");
        let err = ticket.deferred.wait().await.unwrap_err();
        assert!(matches!(err, DeferredError::Rejected(_)));
        assert!(search.results().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_renders_placeholder_then_results() {
        let backend = Arc::new(ScriptedSearch::new());
        backend.set_latency("wax", Duration::from_millis(20));
        let search = client(backend, 0);

        let view = search
            .on_input("wax")
            .view(|r| format!("{} results for {}", r.products.len(), r.term))
            .fallback("Loading...".to_string());
        assert_eq!(view.render_now().unwrap().as_deref(), Some("Loading..."));
        assert!(view.resolve().await.unwrap().ends_with("for wax"));
    }
}
