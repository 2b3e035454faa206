//! In-process stand-in for the promotions runtime

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::{IdentityPayload, Product, ProductRef};
use crate::signal::{Signal, SignalBus, SignalEmitter, SignalOrigin};
use crate::widget::{CustomizeOptions, WidgetRuntime};

type CustomizeCall = (Vec<ProductRef>, CustomizeOptions);

/// Records every call it receives and classifies gifts by product id
#[derive(Default)]
pub struct ScriptedRuntime {
    gift_ids: Mutex<HashSet<String>>,
    identity_pushes: Mutex<Vec<IdentityPayload>>,
    customize_calls: Mutex<Vec<CustomizeCall>>,
    bundle_inits: Mutex<Vec<String>>,
    gift_checks: AtomicU64,
    emitter: Option<SignalEmitter>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gift_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_gift_ids(ids);
        self
    }

    /// Let the runtime dispatch signals on `bus`
    pub fn with_bus(mut self, bus: &SignalBus) -> Self {
        self.emitter = Some(bus.emitter_for(SignalOrigin::Widget));
        self
    }

    pub fn set_gift_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.gift_ids.lock().unwrap_or_else(PoisonError::into_inner) = ids.into_iter().map(Into::into).collect();
    }

    /// Dispatch "gifts updated", as the runtime does after changing the cart
    pub fn gifts_updated(&self) -> usize {
        match &self.emitter {
            Some(emitter) => emitter.gifts_updated(),
            None => 0,
        }
    }

    /// Listen for bundle page mounts on `bus`
    pub fn listen(self: &Arc<Self>, bus: &SignalBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if let Signal::BundlePageInit { offer_id } = envelope.signal {
                            // Bare dispatches leave the offer to the mount point, recorded as ""
                            let offer_id = offer_id.unwrap_or_default();
                            info!(%offer_id, "Runtime rendering bundle page");
                            runtime.bundle_inits.lock().unwrap_or_else(PoisonError::into_inner).push(offer_id);
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn identity_pushes(&self) -> Vec<IdentityPayload> {
        self.identity_pushes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn customize_calls(&self) -> Vec<CustomizeCall> {
        self.customize_calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn bundle_inits(&self) -> Vec<String> {
        self.bundle_inits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn gift_checks(&self) -> u64 {
        self.gift_checks.load(Ordering::SeqCst)
    }
}

impl WidgetRuntime for ScriptedRuntime {
    fn update_core(&self, identity: &IdentityPayload) {
        debug!(signed_in = identity.customer.is_some(), "ScriptedRuntime::update_core: called");
        self.identity_pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity.clone());
    }

    fn check_item_is_gift(&self, product: &Product) -> bool {
        self.gift_checks.fetch_add(1, Ordering::SeqCst);
        self.gift_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&product.id)
    }

    fn render_customize_for_product(&self, items: &[ProductRef], options: &CustomizeOptions) {
        debug!(items = items.len(), "ScriptedRuntime::render_customize_for_product: called");
        self.customize_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((items.to_vec(), options.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Fixture;

    #[test]
    fn test_records_calls() {
        let runtime = ScriptedRuntime::new().with_gift_ids(["gid://shopify/Product/4"]);
        let products = Fixture::demo().products;

        runtime.update_core(&IdentityPayload::default());
        assert!(runtime.check_item_is_gift(&products[3]));
        assert!(!runtime.check_item_is_gift(&products[0]));
        runtime.render_customize_for_product(&[products[0].to_ref()], &CustomizeOptions::collection());

        assert_eq!(runtime.identity_pushes().len(), 1);
        assert_eq!(runtime.gift_checks(), 2);
        assert_eq!(runtime.customize_calls()[0].0[0].id, products[0].id);
    }

    #[tokio::test]
    async fn test_dispatches_and_listens() {
        let bus = SignalBus::with_default_capacity();
        let runtime = Arc::new(ScriptedRuntime::new().with_bus(&bus));
        let mut rx = bus.subscribe();
        let listener = runtime.listen(&bus);

        assert_eq!(runtime.gifts_updated(), 2);
        assert_eq!(rx.recv().await.unwrap().signal, Signal::GiftsUpdated);

        bus.emitter_for(SignalOrigin::Core).bundle_page_init("offer-1");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(runtime.bundle_inits(), vec!["offer-1".to_string()]);
        listener.abort();
    }

    #[test]
    fn test_without_bus_dispatch_reaches_nobody() {
        assert_eq!(ScriptedRuntime::new().gifts_updated(), 0);
    }
}
