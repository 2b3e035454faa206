//! Bundle page: a mount point the widget runtime fills in

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::signal::{SignalBus, SignalOrigin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePage {
    offer_id: Option<String>,
}

impl BundlePage {
    pub fn new(offer_id: Option<&str>) -> Self {
        Self {
            offer_id: offer_id.filter(|id| !id.is_empty()).map(str::to_string),
        }
    }

    pub fn offer_id(&self) -> Option<&str> {
        self.offer_id.as_deref()
    }

    /// Announce the mount point to the runtime after `delay`
    ///
    /// Nothing is announced when there is no offer id.
    pub fn mount(&self, bus: &SignalBus, delay: Duration) -> Option<JoinHandle<()>> {
        let offer_id = self.offer_id.clone()?;
        debug!(%offer_id, ?delay, "BundlePage::mount: called");
        let emitter = bus.emitter_for(SignalOrigin::Core);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reached = emitter.bundle_page_init(&offer_id);
            debug!(%offer_id, reached, "BundlePage: init signal dispatched");
        }))
    }

    pub fn render(&self) -> String {
        match &self.offer_id {
            Some(id) => format!(r#"<div id="bogos-bundle-page-view" data-offer-id="{}"></div>"#, id),
            None => "No bundle page".to_string(),
        }
    }
}
