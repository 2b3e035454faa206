//! Gift classification
//!
//! Gift products are clones the promotions runtime adds to carts. Listings
//! hide them. A product counts as a gift when the live runtime says so OR
//! when the static heuristic matches, and once a tile decided "gift" it
//! stays hidden for as long as it lives.

use tracing::debug;

use crate::config::WidgetConfig;
use crate::domain::Product;

/// Static fallback used whenever the runtime cannot be asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftHeuristic {
    handle_marker: String,
    tags: Vec<String>,
}

impl Default for GiftHeuristic {
    fn default() -> Self {
        Self::from_config(&WidgetConfig::default())
    }
}

impl GiftHeuristic {
    pub fn new(handle_marker: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            handle_marker: handle_marker.into(),
            tags,
        }
    }

    pub fn from_config(config: &WidgetConfig) -> Self {
        Self::new(config.gift_handle_marker.clone(), config.gift_tags.clone())
    }

    /// Handle contains the marker, or any gift tag is present
    pub fn matches(&self, product: &Product) -> bool {
        let by_handle = !self.handle_marker.is_empty() && product.handle.contains(&self.handle_marker);
        by_handle || self.tags.iter().any(|tag| product.has_tag(tag))
    }
}

/// Per-product gift flag, latched once true
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GiftFlag {
    state: Option<bool>,
}

impl GiftFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a classification and return the flag
    ///
    /// `false` after `true` is ignored.
    pub fn observe(&mut self, is_gift: bool) -> bool {
        let latched = self.is_gift() || is_gift;
        self.state = Some(latched);
        latched
    }

    pub fn is_gift(&self) -> bool {
        self.state == Some(true)
    }

    /// False until the first classification lands
    pub fn is_evaluated(&self) -> bool {
        self.state.is_some()
    }
}

/// Anything that can answer "is this product a gift"
pub trait GiftClassifier {
    fn check_item_is_gift(&self, product: &Product) -> bool;

    /// Run the check and latch the result into `flag`
    fn classify(&self, product: &Product, flag: &mut GiftFlag) -> bool {
        let observed = self.check_item_is_gift(product);
        let latched = flag.observe(observed);
        if latched != observed {
            debug!(product = %product.id, "GiftClassifier::classify: keeping latched gift flag");
        }
        latched
    }
}

impl GiftClassifier for GiftHeuristic {
    fn check_item_is_gift(&self, product: &Product) -> bool {
        self.matches(product)
    }
}
