//! Call surface of the external promotions runtime

use serde::{Deserialize, Serialize};

use crate::domain::{IdentityPayload, Product, ProductRef};

/// Options for `render_customize_for_product`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomizeOptions {
    /// Rendering inside a collection or listing
    pub collection: bool,

    /// Rendering on a product detail page
    pub product: bool,

    #[serde(rename = "selected-variants")]
    pub selected_variants: Vec<String>,
}

impl CustomizeOptions {
    pub fn collection() -> Self {
        Self {
            collection: true,
            ..Default::default()
        }
    }
}

/// The runtime as seen from the page once it has attached itself
///
/// The runtime is third-party code: the core never constructs one, it only
/// finds one in the [`GlobalScope`](super::GlobalScope).
pub trait WidgetRuntime: Send + Sync {
    /// Hand the runtime the current caller identity
    fn update_core(&self, identity: &IdentityPayload);

    /// Runtime's own gift classification
    fn check_item_is_gift(&self, product: &Product) -> bool;

    /// Fire-and-forget request to decorate product tiles
    fn render_customize_for_product(&self, items: &[ProductRef], options: &CustomizeOptions);
}
