//! Page-scoped slots shared with the widget runtime

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, info};

use super::runtime::WidgetRuntime;
use crate::domain::{CustomerToken, IdentityPayload};

type RuntimeSlot = Option<Arc<dyn WidgetRuntime>>;

/// Where the runtime attaches itself, at any time after page load
///
/// Absent by default. Readers must check for presence on every access. The
/// scope also carries the identity slot the runtime reads on its own.
#[derive(Clone)]
pub struct GlobalScope {
    tx: Arc<watch::Sender<RuntimeSlot>>,
    identity: IdentitySlot,
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalScope")
            .field("installed", &self.is_installed())
            .field("identity", &self.identity)
            .finish()
    }
}

impl GlobalScope {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            identity: IdentitySlot::new(),
        }
    }

    /// Attach a runtime (what the third-party script does when it loads)
    pub fn install(&self, runtime: Arc<dyn WidgetRuntime>) {
        info!("GlobalScope::install: widget runtime attached");
        self.tx.send_replace(Some(runtime));
    }

    /// Detach the runtime, as on page teardown
    pub fn clear(&self) {
        debug!("GlobalScope::clear: called");
        self.tx.send_replace(None);
    }

    /// The runtime's call surface, if it exists right now
    pub fn runtime(&self) -> Option<Arc<dyn WidgetRuntime>> {
        self.tx.borrow().clone()
    }

    pub fn is_installed(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Notified on install and clear
    pub fn subscribe(&self) -> watch::Receiver<RuntimeSlot> {
        self.tx.subscribe()
    }

    pub fn identity(&self) -> &IdentitySlot {
        &self.identity
    }
}

/// Process-wide caller identity read by the widget runtime
///
/// One writer (the bridge), any number of readers. Readers get `None` when
/// no customer is signed in or nothing was written yet.
#[derive(Clone, Default)]
pub struct IdentitySlot {
    token: Arc<RwLock<Option<CustomerToken>>>,
    writes: Arc<AtomicU64>,
}

impl std::fmt::Debug for IdentitySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySlot")
            .field("token", &self.get())
            .field("writes", &self.write_count())
            .finish()
    }
}

impl IdentitySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the identity, returning whether the stored value changed
    ///
    /// Writing the value already stored is a no-op apart from the counter.
    pub fn set(&self, token: Option<CustomerToken>) -> bool {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        if *slot == token {
            debug!("IdentitySlot::set: unchanged");
            return false;
        }
        debug!(signed_in = token.is_some(), "IdentitySlot::set: updated");
        *slot = token;
        true
    }

    pub fn get(&self) -> Option<CustomerToken> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The slot contents in the shape `update_core` takes
    pub fn payload(&self) -> IdentityPayload {
        IdentityPayload::for_customer(self.get().as_ref())
    }

    /// Number of writes, including ones that changed nothing
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}
