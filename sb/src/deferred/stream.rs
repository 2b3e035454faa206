//! Deferred value and its resolver

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::error::DeferredError;

/// Settlement state of a deferred value
#[derive(Debug)]
pub enum DeferredState<T> {
    Pending,
    Resolved(Arc<T>),
    Rejected(DeferredError),
}

impl<T> DeferredState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeferredState::Pending)
    }
}

impl<T> Clone for DeferredState<T> {
    fn clone(&self) -> Self {
        match self {
            DeferredState::Pending => DeferredState::Pending,
            DeferredState::Resolved(v) => DeferredState::Resolved(Arc::clone(v)),
            DeferredState::Rejected(e) => DeferredState::Rejected(e.clone()),
        }
    }
}

/// A value the loader promised and may not have produced yet
///
/// Cheap to clone. All clones observe the same settlement.
pub struct Deferred<T> {
    rx: watch::Receiver<DeferredState<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.rx.borrow() {
            DeferredState::Pending => "pending",
            DeferredState::Resolved(_) => "resolved",
            DeferredState::Rejected(_) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T> Deferred<T> {
    /// Create a pending value and the resolver that settles it
    pub fn pending() -> (Resolver<T>, Deferred<T>) {
        let (tx, rx) = watch::channel(DeferredState::Pending);
        (Resolver { tx: Some(tx) }, Deferred { rx })
    }

    /// A value that is available at first render
    pub fn resolved(value: T) -> Self {
        let (_tx, rx) = watch::channel(DeferredState::Resolved(Arc::new(value)));
        Self { rx }
    }

    pub fn rejected(error: DeferredError) -> Self {
        let (_tx, rx) = watch::channel(DeferredState::Rejected(error));
        Self { rx }
    }

    /// Drive `fut` on the runtime and settle with its output
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, DeferredError>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let (resolver, deferred) = Self::pending();
        tokio::spawn(async move {
            match fut.await {
                Ok(value) => resolver.resolve(value),
                Err(e) => resolver.reject(e),
            }
        });
        deferred
    }

    /// Snapshot of the current state, without waiting
    pub fn peek(&self) -> DeferredState<T> {
        self.rx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        !self.rx.borrow().is_pending()
    }

    /// Suspend until the value settles
    pub async fn wait(&self) -> Result<Arc<T>, DeferredError> {
        let mut rx = self.rx.clone();
        match rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => match &*state {
                DeferredState::Resolved(v) => Ok(Arc::clone(v)),
                DeferredState::Rejected(e) => Err(e.clone()),
                DeferredState::Pending => Err(DeferredError::Dropped),
            },
            // Resolver drop always publishes a rejection first, so this is a
            // channel torn down from outside.
            Err(_) => Err(DeferredError::Dropped),
        }
    }
}

/// Settles exactly one [`Deferred`]
///
/// Dropping an unsettled resolver rejects with [`DeferredError::Dropped`].
pub struct Resolver<T> {
    tx: Option<watch::Sender<DeferredState<T>>>,
}

impl<T> Resolver<T> {
    pub fn resolve(mut self, value: T) {
        if let Some(tx) = self.tx.take() {
            debug!("Resolver::resolve: settling deferred value");
            tx.send_replace(DeferredState::Resolved(Arc::new(value)));
        }
    }

    pub fn reject(mut self, error: DeferredError) {
        if let Some(tx) = self.tx.take() {
            debug!(%error, "Resolver::reject: rejecting deferred value");
            tx.send_replace(DeferredState::Rejected(error));
        }
    }

    /// True when no [`Deferred`] clone is left to observe the result
    pub fn is_abandoned(&self) -> bool {
        self.tx.as_ref().map(|tx| tx.is_closed()).unwrap_or(true)
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(DeferredState::Rejected(DeferredError::Dropped));
        }
    }
}
