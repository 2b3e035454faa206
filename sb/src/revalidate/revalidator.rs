//! Revalidator - re-runs the loader and keeps only the newest result

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::loader::{LoadError, Loader};
use crate::domain::{LoaderPayload, Route};
use crate::mailbox::{Mailbox, Publish, Slot, Ticket};

/// What happened to one revalidation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// The result is now the page data
    Committed { generation: u64 },
    /// A newer result committed first; this one was discarded
    Superseded { generation: u64 },
    /// The loader failed; the previous page data stays
    Failed { generation: u64, error: LoadError },
}

impl RevalidationOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Committed { generation } | Self::Superseded { generation } | Self::Failed { generation, .. } => {
                *generation
            }
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

struct RevalidatorInner {
    loader: Arc<dyn Loader>,
    route: Route,
    mailbox: Mailbox<LoaderPayload>,
    stale_discarded: AtomicU64,
    failures: AtomicU64,
}

/// Page-data owner for one route
///
/// Cloning shares the same page data.
#[derive(Clone)]
pub struct Revalidator {
    inner: Arc<RevalidatorInner>,
}

impl Revalidator {
    pub fn new(loader: Arc<dyn Loader>, route: Route) -> Self {
        debug!(path = %route.path, "Revalidator::new: called");
        Self {
            inner: Arc::new(RevalidatorInner {
                loader,
                route,
                mailbox: Mailbox::new(),
                stale_discarded: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Run the loader for the first navigation and wait for it
    pub async fn load_initial(&self) -> Result<LoaderPayload, LoadError> {
        debug!(path = %self.inner.route.path, "Revalidator::load_initial: called");
        let ticket = self.inner.mailbox.ticket();
        match self.inner.run(ticket).await {
            RevalidationOutcome::Failed { error, .. } => Err(error),
            _ => self.current().ok_or_else(|| LoadError::Failed("no page data committed".to_string())),
        }
    }

    /// Re-run the loader in the background
    ///
    /// Each call takes a new generation. The result only replaces the page
    /// data if nothing newer committed in the meantime.
    pub fn revalidate(&self) -> JoinHandle<RevalidationOutcome> {
        let ticket = self.inner.mailbox.ticket();
        debug!(generation = ticket.generation(), "Revalidator::revalidate: called");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(ticket).await })
    }

    /// The committed page data
    pub fn current(&self) -> Option<LoaderPayload> {
        self.inner.mailbox.current()
    }

    /// Generation of the committed page data (0 before the first load)
    pub fn generation(&self) -> u64 {
        self.inner.mailbox.committed()
    }

    pub fn requested(&self) -> u64 {
        self.inner.mailbox.latest_issued()
    }

    pub fn stale_discarded(&self) -> u64 {
        self.inner.stale_discarded.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    pub fn route(&self) -> &Route {
        &self.inner.route
    }

    /// Notified on every commit
    pub fn subscribe(&self) -> watch::Receiver<Slot<LoaderPayload>> {
        self.inner.mailbox.subscribe()
    }
}

impl RevalidatorInner {
    async fn run(&self, ticket: Ticket) -> RevalidationOutcome {
        let generation = ticket.generation();
        match self.loader.load(&self.route).await {
            Ok(payload) => match self.mailbox.publish(ticket, payload) {
                Publish::Accepted => {
                    info!(generation, path = %self.route.path, "Page data committed");
                    RevalidationOutcome::Committed { generation }
                }
                Publish::Stale => {
                    self.stale_discarded.fetch_add(1, Ordering::SeqCst);
                    debug!(generation, "RevalidatorInner::run: superseded result discarded");
                    RevalidationOutcome::Superseded { generation }
                }
            },
            Err(error) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                warn!(generation, %error, "Loader failed, keeping previous page data");
                RevalidationOutcome::Failed { generation, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Fixture, ScriptedLoader};
    use std::time::Duration;

    fn loader_with(latencies: &[u64]) -> Arc<ScriptedLoader> {
        let loader = ScriptedLoader::new(Fixture::demo());
        for ms in latencies {
            loader.push_latency(Duration::from_millis(*ms));
        }
        Arc::new(loader)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_initial_commits() {
        let revalidator = Revalidator::new(loader_with(&[10]), Route::new("/"));
        assert!(revalidator.current().is_none());

        let payload = revalidator.load_initial().await.unwrap();
        assert_eq!(payload.header.shop_name, Fixture::demo().header.shop_name);
        assert_eq!(revalidator.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_request_wins_when_it_resolves_first() {
        let loader = loader_with(&[0, 300, 100]);
        let revalidator = Revalidator::new(loader.clone(), Route::new("/"));
        revalidator.load_initial().await.unwrap();

        let slow = revalidator.revalidate();
        let fast = revalidator.revalidate();

        assert_eq!(fast.await.unwrap(), RevalidationOutcome::Committed { generation: 3 });
        assert_eq!(slow.await.unwrap(), RevalidationOutcome::Superseded { generation: 2 });
        assert_eq!(revalidator.generation(), 3);
        assert_eq!(revalidator.stale_discarded(), 1);
        assert_eq!(loader.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_order_results_both_commit() {
        let revalidator = Revalidator::new(loader_with(&[0, 100, 300]), Route::new("/"));
        revalidator.load_initial().await.unwrap();

        let first = revalidator.revalidate();
        let second = revalidator.revalidate();

        assert!(first.await.unwrap().is_committed());
        assert!(second.await.unwrap().is_committed());
        assert_eq!(revalidator.generation(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_payload() {
        let loader = loader_with(&[0]);
        let revalidator = Revalidator::new(loader.clone(), Route::new("/"));
        revalidator.load_initial().await.unwrap();

        loader.fail_next(LoadError::Failed("storefront API down".to_string()));
        let outcome = revalidator.revalidate().await.unwrap();

        assert!(matches!(outcome, RevalidationOutcome::Failed { generation: 2, .. }));
        assert_eq!(revalidator.generation(), 1);
        assert_eq!(revalidator.failures(), 1);
        assert!(revalidator.current().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_initial_failure() {
        let loader = loader_with(&[]);
        loader.fail_next(LoadError::NotFound("/nope".to_string()));
        let revalidator = Revalidator::new(loader, Route::new("/nope"));

        let err = revalidator.load_initial().await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
