//! Signal Bus - pub/sub between the rendering core and the widget runtime
//!
//! The bus uses a tokio broadcast channel, so every subscriber sees every
//! signal emitted after it subscribed. Emitting with no subscribers drops
//! the signal, the way a DOM event with no listeners goes nowhere.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{Signal, SignalEnvelope, SignalError, SignalNames, SignalOrigin};
use crate::config::SignalConfig;

/// Default channel capacity (signals)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Central signal bus for one page
pub struct SignalBus {
    tx: broadcast::Sender<SignalEnvelope>,
    names: SignalNames,
}

impl SignalBus {
    pub fn new(capacity: usize, names: SignalNames) -> Self {
        debug!(capacity, "SignalBus::new: creating signal bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, names }
    }

    pub fn from_config(config: &SignalConfig) -> Self {
        Self::new(config.channel_capacity, SignalNames::from_config(config))
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, SignalNames::default())
    }

    /// Emit a signal to all current subscribers
    ///
    /// Fire-and-forget: returns how many subscribers it reached.
    pub fn emit(&self, envelope: SignalEnvelope) -> usize {
        debug!(
            name = self.names.name_of(&envelope.signal),
            origin = %envelope.origin,
            "SignalBus::emit"
        );
        self.tx.send(envelope).unwrap_or(0)
    }

    pub fn dispatch(&self, origin: SignalOrigin, signal: Signal) -> usize {
        self.emit(SignalEnvelope::new(origin, signal))
    }

    /// Dispatch by wire name, as the external runtime does
    pub fn dispatch_named(&self, origin: SignalOrigin, name: &str, detail: Value) -> Result<usize, SignalError> {
        let signal = self.names.decode(name, detail)?;
        Ok(self.dispatch(origin, signal))
    }

    /// Subscribe to signals emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEnvelope> {
        debug!("SignalBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Emitter bound to one origin
    pub fn emitter_for(&self, origin: SignalOrigin) -> SignalEmitter {
        SignalEmitter {
            tx: self.tx.clone(),
            origin,
        }
    }

    pub fn names(&self) -> &SignalNames {
        &self.names
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for one side of the bus to emit without owning it
#[derive(Clone)]
pub struct SignalEmitter {
    tx: broadcast::Sender<SignalEnvelope>,
    origin: SignalOrigin,
}

impl SignalEmitter {
    pub fn origin(&self) -> SignalOrigin {
        self.origin
    }

    pub fn emit(&self, signal: Signal) -> usize {
        self.tx.send(SignalEnvelope::new(self.origin, signal)).unwrap_or(0)
    }

    pub fn gifts_updated(&self) -> usize {
        self.emit(Signal::GiftsUpdated)
    }

    pub fn bundle_page_init(&self, offer_id: &str) -> usize {
        self.emit(Signal::BundlePageInit {
            offer_id: Some(offer_id.to_string()),
        })
    }
}

/// Create a signal bus wrapped in an Arc for shared ownership
pub fn create_signal_bus(config: &SignalConfig) -> Arc<SignalBus> {
    Arc::new(SignalBus::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_bus_subscribe_count() {
        let bus = SignalBus::with_default_capacity();
        assert_eq!(bus.subscriber_count(), 0);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let bus = SignalBus::with_default_capacity();
        assert_eq!(bus.dispatch(SignalOrigin::Widget, Signal::GiftsUpdated), 0);
    }

    #[tokio::test]
    async fn test_dispatch_named_decodes() {
        let bus = SignalBus::with_default_capacity();
        let mut rx = bus.subscribe();

        let reached = bus.dispatch_named(SignalOrigin::Widget, "fg-gifts:updated", Value::Null).unwrap();
        assert_eq!(reached, 1);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.signal, Signal::GiftsUpdated);
        assert_eq!(envelope.origin, SignalOrigin::Widget);
    }

    #[tokio::test]
    async fn test_dispatch_named_bare_bundle_page_init() {
        let bus = SignalBus::with_default_capacity();
        let mut rx = bus.subscribe();

        bus.dispatch_named(SignalOrigin::Core, "bogos:bundle-page-init", Value::Null)
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().signal, Signal::BundlePageInit { offer_id: None });
    }

    #[tokio::test]
    async fn test_emitter_convenience_methods() {
        let bus = SignalBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let core = bus.emitter_for(SignalOrigin::Core);

        core.bundle_page_init("offer-9");
        core.gifts_updated();

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first.signal,
            Signal::BundlePageInit {
                offer_id: Some("offer-9".to_string())
            }
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(second.signal, Signal::GiftsUpdated);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = SignalBus::with_default_capacity();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.dispatch_named(SignalOrigin::Widget, "fg-other", json!({"x": 1})).unwrap();

        assert_eq!(rx1.recv().await.unwrap().signal, rx2.recv().await.unwrap().signal);
    }

    #[test]
    fn test_configured_names() {
        let config = SignalConfig {
            gifts_updated: "promo:changed".to_string(),
            ..Default::default()
        };
        let bus = SignalBus::from_config(&config);
        let mut rx = bus.subscribe();

        bus.dispatch_named(SignalOrigin::Widget, "promo:changed", Value::Null).unwrap();
        assert_eq!(rx.try_recv().unwrap().signal, Signal::GiftsUpdated);
    }
}
