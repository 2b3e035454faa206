//! WidgetBridge - readiness polling and gated calls into the widget runtime

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::gift::{GiftClassifier, GiftHeuristic};
use super::runtime::{CustomizeOptions, WidgetRuntime};
use super::scope::{GlobalScope, IdentitySlot};
use crate::config::WidgetConfig;
use crate::domain::{CustomerToken, IdentityPayload, Product, ProductRef};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error("Widget bridge already started")]
    AlreadyStarted,

    #[error("Widget runtime unavailable after {attempts} checks")]
    Unavailable { attempts: u32 },

    #[error("Widget runtime not ready after {0:?}")]
    Timeout(Duration),
}

impl WidgetError {
    /// True if waiting longer could still succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WidgetError::Timeout(_))
    }
}

/// Lifecycle of the bridge's view of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgePhase {
    /// Not started
    Absent,
    /// Waiting for the runtime to attach
    Polling,
    /// Runtime found and identified; calls go through
    Ready,
    /// Gave up; static heuristic only
    Unavailable,
}

impl BridgePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgePhase::Ready | BridgePhase::Unavailable)
    }
}

impl std::fmt::Display for BridgePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Polling => write!(f, "polling"),
            Self::Ready => write!(f, "ready"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Outcome of a fire-and-forget call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    Sent,
    /// Bridge not ready; the call was discarded, not queued
    Dropped,
}

/// Counters for the CLI and tests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub phase: Option<BridgePhase>,
    pub checks: u32,
    pub identity_pushes: u64,
    pub live_gift_checks: u64,
    pub static_gift_checks: u64,
    pub customize_sent: u64,
    pub customize_dropped: u64,
}

struct BridgeInner {
    scope: GlobalScope,
    identity: IdentitySlot,
    heuristic: GiftHeuristic,
    config: WidgetConfig,
    phase: watch::Sender<BridgePhase>,
    /// Captured once at the transition to Ready
    runtime: RwLock<Option<Arc<dyn WidgetRuntime>>>,
    /// Last payload handed to `update_core`; never held across the call
    last_pushed: Mutex<Option<IdentityPayload>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    checks: AtomicU32,
    identity_pushes: AtomicU64,
    live_gift_checks: AtomicU64,
    static_gift_checks: AtomicU64,
    customize_sent: AtomicU64,
    customize_dropped: AtomicU64,
}

/// One per page. Cloning shares the same bridge.
///
/// ```text
///   absent ──start()──► polling ──runtime found──► ready
///                          │
///                          └──max attempts──► unavailable
/// ```
#[derive(Clone)]
pub struct WidgetBridge {
    inner: Arc<BridgeInner>,
}

impl WidgetBridge {
    /// Bridge over `scope`, writing identity into the scope's slot
    pub fn new(scope: GlobalScope, config: &WidgetConfig) -> Self {
        debug!(
            first_check_delay_ms = config.first_check_delay_ms,
            max_attempts = config.max_attempts,
            "WidgetBridge::new: called"
        );
        let (phase, _) = watch::channel(BridgePhase::Absent);
        Self {
            inner: Arc::new(BridgeInner {
                identity: scope.identity().clone(),
                scope,
                heuristic: GiftHeuristic::from_config(config),
                config: config.clone(),
                phase,
                runtime: RwLock::new(None),
                last_pushed: Mutex::new(None),
                poll_task: Mutex::new(None),
                checks: AtomicU32::new(0),
                identity_pushes: AtomicU64::new(0),
                live_gift_checks: AtomicU64::new(0),
                static_gift_checks: AtomicU64::new(0),
                customize_sent: AtomicU64::new(0),
                customize_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Enter polling: write the identity slot now, check for the runtime later
    ///
    /// The slot write happens before this returns, so it lands ahead of the
    /// runtime's own initialization. Must be called inside a tokio runtime.
    pub fn start(&self, token: Option<CustomerToken>) -> Result<(), WidgetError> {
        debug!(signed_in = token.is_some(), "WidgetBridge::start: called");
        let started = self.inner.phase.send_if_modified(|phase| {
            if *phase != BridgePhase::Absent {
                return false;
            }
            *phase = BridgePhase::Polling;
            true
        });
        if !started {
            return Err(WidgetError::AlreadyStarted);
        }

        self.inner.identity.set(token);
        info!("Widget bridge polling for runtime");

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.poll().await });
        *self.inner.poll_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Record a new caller identity
    ///
    /// Always rewrites the slot. When ready and the identity differs from the
    /// last one pushed, the runtime is updated immediately; while polling the
    /// pending check picks the new value up.
    pub fn identify(&self, token: Option<CustomerToken>) {
        debug!(signed_in = token.is_some(), "WidgetBridge::identify: called");
        self.inner.identity.set(token);

        let Some(runtime) = self.inner.ready_runtime() else {
            return;
        };
        if self.inner.push_identity(runtime.as_ref(), false) {
            info!("Widget runtime identity updated");
        } else {
            debug!("WidgetBridge::identify: identity unchanged, not pushing");
        }
    }

    /// Ask the live runtime when ready, OR'd with the static heuristic
    pub fn check_item_is_gift(&self, product: &Product) -> bool {
        let fallback = self.inner.heuristic.matches(product);
        match self.inner.ready_runtime() {
            Some(runtime) => {
                self.inner.live_gift_checks.fetch_add(1, Ordering::Relaxed);
                runtime.check_item_is_gift(product) || fallback
            }
            None => {
                self.inner.static_gift_checks.fetch_add(1, Ordering::Relaxed);
                fallback
            }
        }
    }

    /// Forward to the runtime if ready; dropped otherwise
    pub fn render_customize_for_product(&self, items: &[ProductRef], options: &CustomizeOptions) -> Dispatch {
        debug!(items = items.len(), "WidgetBridge::render_customize_for_product: called");
        match self.inner.ready_runtime() {
            Some(runtime) => {
                runtime.render_customize_for_product(items, options);
                self.inner.customize_sent.fetch_add(1, Ordering::Relaxed);
                Dispatch::Sent
            }
            None => {
                warn!(phase = %self.phase(), "Widget runtime not ready, customize call dropped");
                self.inner.customize_dropped.fetch_add(1, Ordering::Relaxed);
                Dispatch::Dropped
            }
        }
    }

    /// Wait for the bridge to leave polling
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), WidgetError> {
        debug!(?timeout, "WidgetBridge::wait_ready: called");
        let mut rx = self.inner.phase.subscribe();
        let settled = tokio::time::timeout(timeout, async {
            rx.wait_for(BridgePhase::is_terminal).await.map(|phase| *phase)
        })
        .await;

        match settled {
            Ok(Ok(BridgePhase::Ready)) => Ok(()),
            Ok(_) => Err(WidgetError::Unavailable {
                attempts: self.inner.checks.load(Ordering::SeqCst),
            }),
            Err(_) => Err(WidgetError::Timeout(timeout)),
        }
    }

    pub fn phase(&self) -> BridgePhase {
        *self.inner.phase.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == BridgePhase::Ready
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<BridgePhase> {
        self.inner.phase.subscribe()
    }

    pub fn identity(&self) -> &IdentitySlot {
        &self.inner.identity
    }

    pub fn heuristic(&self) -> &GiftHeuristic {
        &self.inner.heuristic
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            phase: Some(self.phase()),
            checks: self.inner.checks.load(Ordering::SeqCst),
            identity_pushes: self.inner.identity_pushes.load(Ordering::SeqCst),
            live_gift_checks: self.inner.live_gift_checks.load(Ordering::Relaxed),
            static_gift_checks: self.inner.static_gift_checks.load(Ordering::Relaxed),
            customize_sent: self.inner.customize_sent.load(Ordering::Relaxed),
            customize_dropped: self.inner.customize_dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop polling and release the runtime handle
    pub fn teardown(&self) {
        debug!("WidgetBridge::teardown: called");
        if let Some(handle) = self.inner.poll_task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        *self.inner.runtime.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.phase.send_replace(BridgePhase::Absent);
        info!("Widget bridge torn down");
    }
}

impl GiftClassifier for WidgetBridge {
    fn check_item_is_gift(&self, product: &Product) -> bool {
        WidgetBridge::check_item_is_gift(self, product)
    }
}

impl BridgeInner {
    async fn poll(self: Arc<Self>) {
        let attempts = self.config.max_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.delay_for_attempt(attempt)).await;
            self.checks.fetch_add(1, Ordering::SeqCst);

            match self.scope.runtime() {
                Some(runtime) => {
                    self.become_ready(runtime, attempt);
                    return;
                }
                None => debug!(attempt, attempts, "BridgeInner::poll: runtime not present"),
            }
        }

        warn!(attempts, "Widget runtime never appeared, using static gift heuristic");
        self.phase.send_replace(BridgePhase::Unavailable);
    }

    fn become_ready(&self, runtime: Arc<dyn WidgetRuntime>, attempt: u32) {
        self.push_identity(runtime.as_ref(), true);

        *self.runtime.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&runtime));
        self.phase.send_replace(BridgePhase::Ready);
        info!(attempt, "Widget runtime ready");

        // Identity written between the push and Ready
        self.push_identity(runtime.as_ref(), false);
    }

    /// Hand the slot's identity to the runtime until it has seen the latest
    ///
    /// The runtime is called without any bridge lock held, so `update_core`
    /// may call back into the bridge. Returns whether anything was pushed.
    fn push_identity(&self, runtime: &dyn WidgetRuntime, force: bool) -> bool {
        let mut force = force;
        let mut pushed = false;
        loop {
            let payload = self.identity.payload();
            {
                let mut last = self.last_pushed.lock().unwrap_or_else(PoisonError::into_inner);
                if !force && last.as_ref() == Some(&payload) {
                    return pushed;
                }
                *last = Some(payload.clone());
            }
            force = false;

            runtime.update_core(&payload);
            self.identity_pushes.fetch_add(1, Ordering::SeqCst);
            pushed = true;
            if self.identity.payload() == payload {
                return pushed;
            }
        }
    }

    fn ready_runtime(&self) -> Option<Arc<dyn WidgetRuntime>> {
        if *self.phase.borrow() != BridgePhase::Ready {
            return None;
        }
        self.runtime.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use crate::sim::ScriptedRuntime;

    fn product(id: &str, handle: &str) -> Product {
        Product {
            id: id.to_string(),
            title: id.to_string(),
            handle: handle.to_string(),
            tags: vec![],
            price: Money::new("10.0", "USD"),
            image: None,
        }
    }

    fn bridge(config: WidgetConfig) -> (WidgetBridge, GlobalScope) {
        let scope = GlobalScope::new();
        let bridge = WidgetBridge::new(scope.clone(), &config);
        (bridge, scope)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_writes_identity_synchronously() {
        let (bridge, _scope) = bridge(WidgetConfig::default());
        bridge.start(Some(CustomerToken::new("tok123"))).unwrap();

        assert_eq!(bridge.identity().get(), Some(CustomerToken::new("tok123")));
        assert_eq!(bridge.phase(), BridgePhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let (bridge, _scope) = bridge(WidgetConfig::default());
        bridge.start(None).unwrap();
        assert_eq!(bridge.start(None), Err(WidgetError::AlreadyStarted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_first_check_when_present() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        let runtime = Arc::new(ScriptedRuntime::new());
        scope.install(runtime.clone());

        bridge.start(Some(CustomerToken::new("tok123"))).unwrap();
        bridge.wait_ready(Duration::from_secs(1)).await.unwrap();

        assert_eq!(runtime.identity_pushes(), vec![IdentityPayload::for_customer(Some(&"tok123".into()))]);
        assert_eq!(bridge.stats().checks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_after_max_attempts() {
        let config = WidgetConfig {
            max_attempts: 3,
            ..Default::default()
        };
        let (bridge, _scope) = bridge(config);
        bridge.start(None).unwrap();

        let err = bridge.wait_ready(Duration::from_secs(60)).await.unwrap_err();
        assert_eq!(err, WidgetError::Unavailable { attempts: 3 });
        assert_eq!(bridge.phase(), BridgePhase::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_times_out() {
        let (bridge, _scope) = bridge(WidgetConfig::default());
        bridge.start(None).unwrap();

        let err = bridge.wait_ready(Duration::from_millis(100)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_before_ready_use_fallback_or_drop() {
        let (bridge, _scope) = bridge(WidgetConfig::default());

        assert!(bridge.check_item_is_gift(&product("1", "tee-sca_clone_freegift")));
        assert!(!bridge.check_item_is_gift(&product("2", "tee")));
        assert_eq!(
            bridge.render_customize_for_product(&[ProductRef { id: "2".into() }], &CustomizeOptions::collection()),
            Dispatch::Dropped
        );
        assert_eq!(bridge.stats().static_gift_checks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_ors_runtime_and_heuristic() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        let runtime = Arc::new(ScriptedRuntime::new().with_gift_ids(["2"]));
        scope.install(runtime.clone());
        bridge.start(None).unwrap();
        bridge.wait_ready(Duration::from_secs(1)).await.unwrap();

        assert!(bridge.check_item_is_gift(&product("1", "tee-sca_clone_freegift")));
        assert!(bridge.check_item_is_gift(&product("2", "tee")));
        assert!(!bridge.check_item_is_gift(&product("3", "tee")));

        let items = [ProductRef { id: "3".into() }];
        assert_eq!(
            bridge.render_customize_for_product(&items, &CustomizeOptions::collection()),
            Dispatch::Sent
        );
        assert_eq!(runtime.customize_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_pushes_only_on_change_when_ready() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        let runtime = Arc::new(ScriptedRuntime::new());
        scope.install(runtime.clone());
        bridge.start(Some("a".into())).unwrap();
        bridge.wait_ready(Duration::from_secs(1)).await.unwrap();

        bridge.identify(Some("a".into()));
        bridge.identify(Some("b".into()));
        bridge.identify(Some("b".into()));

        let pushed: Vec<_> = runtime.identity_pushes().into_iter().map(|p| p.customer).collect();
        assert_eq!(pushed, vec![Some("a".to_string()), Some("b".to_string())]);
    }

    /// Switches the caller identity from inside `update_core`
    struct ReentrantRuntime {
        bridge: std::sync::OnceLock<WidgetBridge>,
        pushes: Mutex<Vec<IdentityPayload>>,
    }

    impl WidgetRuntime for ReentrantRuntime {
        fn update_core(&self, identity: &IdentityPayload) {
            self.pushes.lock().unwrap().push(identity.clone());
            if identity.customer.as_deref() == Some("a")
                && let Some(bridge) = self.bridge.get()
            {
                bridge.identify(Some("b".into()));
            }
        }

        fn check_item_is_gift(&self, _product: &Product) -> bool {
            false
        }

        fn render_customize_for_product(&self, _items: &[ProductRef], _options: &CustomizeOptions) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_may_call_back_from_update_core() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        let runtime = Arc::new(ReentrantRuntime {
            bridge: std::sync::OnceLock::new(),
            pushes: Mutex::new(Vec::new()),
        });
        let _ = runtime.bridge.set(bridge.clone());
        scope.install(runtime.clone());
        bridge.start(Some("x".into())).unwrap();
        bridge.wait_ready(Duration::from_secs(1)).await.unwrap();

        bridge.identify(Some("a".into()));

        let pushed: Vec<_> = runtime.pushes.lock().unwrap().iter().map(|p| p.customer.clone()).collect();
        assert_eq!(
            pushed,
            vec![Some("x".to_string()), Some("a".to_string()), Some("b".to_string())]
        );
        assert_eq!(bridge.identity().get(), Some(CustomerToken::new("b")));
        assert_eq!(bridge.stats().identity_pushes, 3);
        bridge.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_while_polling_is_picked_up_by_check() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        let runtime = Arc::new(ScriptedRuntime::new());
        bridge.start(Some("old".into())).unwrap();
        bridge.identify(Some("new".into()));
        scope.install(runtime.clone());

        bridge.wait_ready(Duration::from_secs(1)).await.unwrap();
        let pushed: Vec<_> = runtime.identity_pushes().into_iter().map(|p| p.customer).collect();
        assert_eq!(pushed, vec![Some("new".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_polling() {
        let (bridge, scope) = bridge(WidgetConfig::default());
        bridge.start(None).unwrap();
        bridge.teardown();

        scope.install(Arc::new(ScriptedRuntime::new()));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(bridge.phase(), BridgePhase::Absent);
        assert_eq!(bridge.stats().checks, 0);
    }
}
