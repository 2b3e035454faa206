//! Overlay panels addressed through the URL fragment

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use super::location::{Location, LocationState};
use crate::config::OverlayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),
}

/// A registered overlay panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub id: String,
    pub heading: String,
}

/// Which overlay is open; `None` means all closed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlayState {
    pub active_id: Option<String>,
}

/// Named overlay panels, opened by writing their id into the fragment
///
/// There is no other open path: anything watching the location sees every
/// transition, and the fragment holds one id so at most one overlay is open.
#[derive(Clone)]
pub struct OverlayRegistry {
    location: Location,
    panels: Vec<Panel>,
    cart_id: String,
}

impl OverlayRegistry {
    pub fn new(location: Location, panels: Vec<Panel>, cart_id: impl Into<String>) -> Self {
        Self {
            location,
            panels,
            cart_id: cart_id.into(),
        }
    }

    /// Cart, search and mobile menu panels
    pub fn from_config(config: &OverlayConfig, location: Location) -> Self {
        let panels = vec![
            Panel {
                id: config.cart_id.clone(),
                heading: "CART".to_string(),
            },
            Panel {
                id: config.search_id.clone(),
                heading: "SEARCH".to_string(),
            },
            Panel {
                id: config.menu_id.clone(),
                heading: "MENU".to_string(),
            },
        ];
        Self::new(location, panels, config.cart_id.clone())
    }

    pub fn open(&self, id: &str) -> Result<(), OverlayError> {
        debug!(%id, "OverlayRegistry::open: called");
        if self.panel(id).is_none() {
            return Err(OverlayError::UnknownOverlay(id.to_string()));
        }
        self.location.set_fragment(Some(id));
        info!(%id, "Overlay opened");
        Ok(())
    }

    pub fn open_cart(&self) -> Result<(), OverlayError> {
        let id = self.cart_id.clone();
        self.open(&id)
    }

    pub fn close(&self) {
        debug!("OverlayRegistry::close: called");
        self.location.set_fragment(None);
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.active().active_id.as_deref() == Some(id)
    }

    pub fn active(&self) -> OverlayState {
        Self::derive(&self.panels, &self.location.state())
    }

    pub fn panel(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn cart_id(&self) -> &str {
        &self.cart_id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn subscribe(&self) -> OverlayWatcher {
        OverlayWatcher {
            rx: self.location.subscribe(),
            panels: self.panels.clone(),
        }
    }

    // A fragment that names no panel leaves every overlay closed.
    fn derive(panels: &[Panel], state: &LocationState) -> OverlayState {
        let active_id = state
            .fragment()
            .filter(|f| panels.iter().any(|p| p.id == *f))
            .map(str::to_string);
        OverlayState { active_id }
    }
}

/// Follows overlay state across navigation
pub struct OverlayWatcher {
    rx: watch::Receiver<LocationState>,
    panels: Vec<Panel>,
}

impl OverlayWatcher {
    /// Wait for the next location write; `None` once the location is gone
    pub async fn changed(&mut self) -> Option<OverlayState> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }

    pub fn current(&self) -> OverlayState {
        OverlayRegistry::derive(&self.panels, &self.rx.borrow())
    }
}
