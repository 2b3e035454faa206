//! RevalidationChannel - reacts to "gifts updated" from the widget runtime

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::revalidator::Revalidator;
use crate::config::RevalidationConfig;
use crate::overlay::OverlayRegistry;
use crate::signal::{Signal, SignalBus, SignalEnvelope};

/// Counters reported by the channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevalidationStats {
    pub signals_seen: u64,
    pub overlay_opens: u64,
    pub revalidations_requested: u64,
    pub stale_results_discarded: u64,
    /// Signals folded into an earlier one by the debounce window
    pub signals_collapsed: u64,
    pub signals_lagged: u64,
}

#[derive(Default)]
struct StatsInner {
    signals_seen: AtomicU64,
    overlay_opens: AtomicU64,
    revalidations_requested: AtomicU64,
    signals_collapsed: AtomicU64,
    signals_lagged: AtomicU64,
}

/// Listens on the bus; on every "gifts updated" opens the cart overlay, then
/// revalidates
///
/// The overlay open always comes first so the (stale) cart is visible before
/// fresh data arrives.
pub struct RevalidationChannel {
    stats: Arc<StatsInner>,
    revalidator: Revalidator,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

struct Listener {
    rx: Receiver<SignalEnvelope>,
    overlays: OverlayRegistry,
    revalidator: Revalidator,
    debounce: Option<Duration>,
    stats: Arc<StatsInner>,
}

impl RevalidationChannel {
    /// Subscribe to `bus` and start listening
    ///
    /// The subscription is taken before this returns, so any signal emitted
    /// afterwards is handled.
    pub fn spawn(
        bus: &SignalBus,
        overlays: OverlayRegistry,
        revalidator: Revalidator,
        config: &RevalidationConfig,
    ) -> Self {
        debug!(debounce_ms = config.debounce_ms, "RevalidationChannel::spawn: called");
        let stats = Arc::new(StatsInner::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let listener = Listener {
            rx: bus.subscribe(),
            overlays,
            revalidator: revalidator.clone(),
            debounce: config.debounce(),
            stats: Arc::clone(&stats),
        };
        let handle = tokio::spawn(listener.run(shutdown_rx));

        Self {
            stats,
            revalidator,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn stats(&self) -> RevalidationStats {
        RevalidationStats {
            signals_seen: self.stats.signals_seen.load(Ordering::SeqCst),
            overlay_opens: self.stats.overlay_opens.load(Ordering::SeqCst),
            revalidations_requested: self.stats.revalidations_requested.load(Ordering::SeqCst),
            stale_results_discarded: self.revalidator.stale_discarded(),
            signals_collapsed: self.stats.signals_collapsed.load(Ordering::SeqCst),
            signals_lagged: self.stats.signals_lagged.load(Ordering::SeqCst),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop listening and wait for the listener to exit
    pub async fn shutdown(&mut self) {
        debug!("RevalidationChannel::shutdown: called");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Revalidation listener ended abnormally");
        }
    }
}

impl Drop for RevalidationChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Listener {
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!("Revalidation channel listening");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Revalidation channel shutdown requested");
                    break;
                }
                recv = self.rx.recv() => match recv {
                    Ok(envelope) => {
                        if envelope.signal != Signal::GiftsUpdated {
                            continue;
                        }
                        self.stats.signals_seen.fetch_add(1, Ordering::SeqCst);
                        if !self.collapse_window().await {
                            self.resync();
                            break;
                        }
                        self.resync();
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Missed signals may include gift updates; resync once.
                        warn!(missed, "Revalidation channel lagged behind the signal bus");
                        self.stats.signals_lagged.fetch_add(missed, Ordering::SeqCst);
                        self.resync();
                    }
                    Err(RecvError::Closed) => {
                        info!("Signal bus closed, revalidation channel stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Swallow further "gifts updated" signals inside the debounce window
    ///
    /// Returns false if the bus closed while waiting.
    async fn collapse_window(&mut self) -> bool {
        let Some(window) = self.debounce else {
            return true;
        };
        let deadline = Instant::now() + window;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                recv = self.rx.recv() => match recv {
                    Ok(envelope) if envelope.signal == Signal::GiftsUpdated => {
                        self.stats.signals_seen.fetch_add(1, Ordering::SeqCst);
                        self.stats.signals_collapsed.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        self.stats.signals_lagged.fetch_add(missed, Ordering::SeqCst);
                    }
                    Err(RecvError::Closed) => return false,
                }
            }
        }
    }

    fn resync(&self) {
        match self.overlays.open_cart() {
            Ok(()) => {
                self.stats.overlay_opens.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => warn!(error = %e, "Could not open cart overlay"),
        }
        let generation = self.revalidator.requested() + 1;
        drop(self.revalidator.revalidate());
        self.stats.revalidations_requested.fetch_add(1, Ordering::SeqCst);
        debug!(generation, "Listener::resync: revalidation requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::config::OverlayConfig;
    use crate::domain::{LoaderPayload, Route};
    use crate::revalidate::{LoadError, Loader};
    use crate::overlay::Location;
    use crate::signal::SignalOrigin;
    use crate::sim::{Fixture, ScriptedLoader};

    struct Harness {
        bus: SignalBus,
        overlays: OverlayRegistry,
        loader: Arc<ScriptedLoader>,
        revalidator: Revalidator,
    }

    async fn harness() -> Harness {
        let loader = Arc::new(ScriptedLoader::new(Fixture::demo()));
        let revalidator = Revalidator::new(loader.clone(), Route::new("/"));
        revalidator.load_initial().await.unwrap();
        Harness {
            bus: SignalBus::with_default_capacity(),
            overlays: OverlayRegistry::from_config(&OverlayConfig::default(), Location::new()),
            loader,
            revalidator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gifts_updated_opens_cart_then_revalidates() {
        let h = harness().await;
        let channel = RevalidationChannel::spawn(
            &h.bus,
            h.overlays.clone(),
            h.revalidator.clone(),
            &RevalidationConfig::default(),
        );

        h.bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.overlays.is_open("cart-aside"));
        assert_eq!(h.loader.calls(), 2);
        let stats = channel.stats();
        assert_eq!(stats.signals_seen, 1);
        assert_eq!(stats.overlay_opens, 1);
        assert_eq!(stats.revalidations_requested, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_signals_ignored() {
        let h = harness().await;
        let channel = RevalidationChannel::spawn(
            &h.bus,
            h.overlays.clone(),
            h.revalidator.clone(),
            &RevalidationConfig::default(),
        );

        h.bus.emitter_for(SignalOrigin::Core).bundle_page_init("offer-1");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.overlays.active().active_id.is_none());
        assert_eq!(channel.stats(), RevalidationStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_signal_handled_without_debounce() {
        let h = harness().await;
        let channel = RevalidationChannel::spawn(
            &h.bus,
            h.overlays.clone(),
            h.revalidator.clone(),
            &RevalidationConfig::default(),
        );

        h.bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        h.bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.overlays.location().write_count(), 2);
        assert_eq!(channel.stats().revalidations_requested, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_burst() {
        let h = harness().await;
        let config = RevalidationConfig { debounce_ms: 100 };
        let channel = RevalidationChannel::spawn(&h.bus, h.overlays.clone(), h.revalidator.clone(), &config);

        for _ in 0..3 {
            h.bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = channel.stats();
        assert_eq!(stats.signals_seen, 3);
        assert_eq!(stats.signals_collapsed, 2);
        assert_eq!(stats.revalidations_requested, 1);
        assert_eq!(h.overlays.location().write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_listener() {
        let h = harness().await;
        let mut channel = RevalidationChannel::spawn(
            &h.bus,
            h.overlays.clone(),
            h.revalidator.clone(),
            &RevalidationConfig::default(),
        );
        assert!(channel.is_running());

        channel.shutdown().await;
        assert!(!channel.is_running());

        h.bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.loader.calls(), 1);
    }

    /// Notes whether the cart overlay was open each time the page loads
    struct CartStateLoader {
        overlays: OverlayRegistry,
        cart_open_at_load: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Loader for CartStateLoader {
        async fn load(&self, _route: &Route) -> Result<LoaderPayload, LoadError> {
            let open = self.overlays.is_open(self.overlays.cart_id());
            self.cart_open_at_load.lock().unwrap().push(open);
            Ok(Fixture::demo().payload())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_open_before_revalidation_load() {
        let overlays = OverlayRegistry::from_config(&OverlayConfig::default(), Location::new());
        let loader = Arc::new(CartStateLoader {
            overlays: overlays.clone(),
            cart_open_at_load: Mutex::new(Vec::new()),
        });
        let revalidator = Revalidator::new(loader.clone(), Route::new("/"));
        revalidator.load_initial().await.unwrap();

        let bus = SignalBus::with_default_capacity();
        let _channel = RevalidationChannel::spawn(&bus, overlays, revalidator, &RevalidationConfig::default());
        bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(*loader.cart_open_at_load.lock().unwrap(), vec![false, true]);
    }
}
