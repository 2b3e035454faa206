//! PageSession - wires loader, bridge, overlays and revalidation for one page

use std::sync::Arc;

use eyre::{Context, Result};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::bundle::BundlePage;
use super::components::{self, RecommendedProducts};
use super::layout::{AsideBlock, Frame};
use crate::config::Config;
use crate::deferred::RenderError;
use crate::domain::{CustomerToken, LoaderPayload, Route};
use crate::mailbox::Slot;
use crate::overlay::{Location, OverlayRegistry, Panel};
use crate::revalidate::{Loader, RevalidationChannel, RevalidationStats, Revalidator};
use crate::search::{PredictiveSearchClient, SearchBackend};
use crate::signal::SignalBus;
use crate::widget::{BridgeStats, GlobalScope, WidgetBridge};

/// Snapshot of the session's counters
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub generation: u64,
    pub bridge: BridgeStats,
    pub revalidation: RevalidationStats,
    #[serde(rename = "search-backend-calls")]
    pub search_backend_calls: u64,
}

pub struct PageSession {
    config: Config,
    initial: LoaderPayload,
    bus: Arc<SignalBus>,
    overlays: OverlayRegistry,
    bridge: WidgetBridge,
    revalidator: Revalidator,
    channel: RevalidationChannel,
    recommended: Arc<RecommendedProducts>,
    bundle: Option<BundlePage>,
    search: Option<PredictiveSearchClient>,
    tasks: Vec<JoinHandle<()>>,
}

impl PageSession {
    /// Load the route and bring up everything around it
    ///
    /// The identity slot is written as soon as the payload is in, before the
    /// deferred parts of it settle and before the runtime is known to exist.
    pub async fn start(
        loader: Arc<dyn Loader>,
        route: Route,
        scope: GlobalScope,
        bus: Arc<SignalBus>,
        config: &Config,
    ) -> Result<Self> {
        info!(path = %route.path, "Starting page session");
        let revalidator = Revalidator::new(loader, route.clone());
        let initial = revalidator
            .load_initial()
            .await
            .context(format!("Failed to load {}", route.path))?;

        let bridge = WidgetBridge::new(scope, &config.widget);
        bridge
            .start(initial.customer_token.clone())
            .context("Failed to start widget bridge")?;

        let overlays = OverlayRegistry::from_config(&config.overlays, Location::new());
        let channel = RevalidationChannel::spawn(&bus, overlays.clone(), revalidator.clone(), &config.revalidation);

        let mut tasks = vec![watch_identity(
            revalidator.subscribe(),
            bridge.clone(),
            initial.customer_token.clone(),
        )];

        let bundle = route
            .path
            .starts_with("/bundle-page")
            .then(|| BundlePage::new(route.param("id")));
        if let Some(handle) = bundle
            .as_ref()
            .and_then(|page| page.mount(&bus, config.signals.bundle_init_delay()))
        {
            tasks.push(handle);
        }

        let recommended = RecommendedProducts::new(bridge.clone(), &config.widget);

        Ok(Self {
            config: config.clone(),
            initial,
            bus,
            overlays,
            bridge,
            revalidator,
            channel,
            recommended,
            bundle,
            search: None,
            tasks,
        })
    }

    /// Give the search overlay a backend
    pub fn attach_search(&mut self, backend: Arc<dyn SearchBackend>) -> PredictiveSearchClient {
        debug!("PageSession::attach_search: called");
        let client = PredictiveSearchClient::new(backend, &self.config.search);
        self.search = Some(client.clone());
        client
    }

    /// The newest committed payload
    pub fn payload(&self) -> LoaderPayload {
        self.revalidator.current().unwrap_or_else(|| self.initial.clone())
    }

    /// Render the page as it stands right now
    ///
    /// Pending regions show their placeholders. A rejection in a region
    /// without an error boundary fails the whole render.
    pub fn render(&self) -> Result<Frame, RenderError> {
        let payload = self.payload();
        let generation = self.revalidator.generation();

        let badge = components::cart_badge(&payload.cart).render_now()?.unwrap_or_default();
        let active = self.overlays.active();
        let asides = self
            .overlays
            .panels()
            .iter()
            .map(|panel| -> Result<AsideBlock, RenderError> {
                Ok(AsideBlock {
                    id: panel.id.clone(),
                    heading: panel.heading.clone(),
                    body: self.render_aside(panel, &payload)?,
                    open: active.active_id.as_deref() == Some(panel.id.as_str()),
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        let (featured, main) = match &self.bundle {
            Some(page) => (String::new(), page.render()),
            None => (
                components::featured_collection(payload.featured_collection.as_ref()),
                self.recommended
                    .view(&payload.recommended_products, generation)
                    .render_now()?
                    .unwrap_or_default(),
            ),
        };
        let footer = components::footer(&payload.footer).render_now()?.unwrap_or_default();

        Ok(Frame {
            header: components::header(&payload.header, &badge),
            asides,
            featured,
            main,
            footer,
        })
    }

    fn render_aside(&self, panel: &Panel, payload: &LoaderPayload) -> Result<String, RenderError> {
        let ids = &self.config.overlays;
        if panel.id == ids.cart_id {
            Ok(components::cart_aside(&payload.cart).render_now()?.unwrap_or_default())
        } else if panel.id == ids.search_id {
            let ticket = self.search.as_ref().and_then(PredictiveSearchClient::current);
            components::search_aside(ticket.as_ref())
        } else if panel.id == ids.menu_id {
            Ok(components::menu_aside(&payload.header))
        } else {
            Ok(String::new())
        }
    }

    /// Wait for every deferred value of the current payload to settle
    pub async fn settled(&self) {
        self.payload().settled().await;
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            generation: self.revalidator.generation(),
            bridge: self.bridge.stats(),
            revalidation: self.channel.stats(),
            search_backend_calls: self.search.as_ref().map(|s| s.backend_calls()).unwrap_or(0),
        }
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    pub fn bridge(&self) -> &WidgetBridge {
        &self.bridge
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    pub fn recommended(&self) -> &RecommendedProducts {
        &self.recommended
    }

    pub fn search(&self) -> Option<&PredictiveSearchClient> {
        self.search.as_ref()
    }

    /// Stop background work and release the runtime
    pub async fn teardown(&mut self) {
        info!("Tearing down page session");
        self.channel.shutdown().await;
        self.bridge.teardown();
        self.recommended.teardown();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Re-identify the bridge whenever a committed payload carries a new token
fn watch_identity(
    mut rx: watch::Receiver<Slot<LoaderPayload>>,
    bridge: WidgetBridge,
    mut last: Option<CustomerToken>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let token = rx
                .borrow_and_update()
                .value
                .as_ref()
                .map(|payload| payload.customer_token.clone());
            let Some(token) = token else {
                continue;
            };
            if token != last {
                debug!(signed_in = token.is_some(), "watch_identity: customer token changed");
                bridge.identify(token.clone());
                last = token;
            }
        }
    })
}
