//! Page regions, each rendered to a text block

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::WidgetConfig;
use crate::deferred::{Deferred, RenderError, Suspense};
use crate::domain::{Cart, Collection, Footer, Header, Menu, Product, ProductList};
use crate::search::{SearchResults, SearchTicket};
use crate::widget::{CustomizeOptions, GiftClassifier, GiftFlag, WidgetBridge};

pub const CART_FALLBACK: &str = "Loading cart ...";
pub const CART_ERROR: &str = "Unable to load cart";
pub const PRODUCTS_FALLBACK: &str = "Loading...";
pub const PRODUCTS_ERROR: &str = "Unable to load products";
pub const SEARCH_IDLE: &str = "Search the store";

/// Cart overlay body
pub fn cart_aside(cart: &Deferred<Option<Cart>>) -> Suspense<Option<Cart>, String> {
    Suspense::new("cart-aside", cart.clone(), |cart: &Option<Cart>| cart_main(cart.as_ref()))
        .fallback(CART_FALLBACK.to_string())
        .error_boundary(|_| CART_ERROR.to_string())
}

fn cart_main(cart: Option<&Cart>) -> String {
    let Some(cart) = cart.filter(|c| !c.lines.is_empty()) else {
        return "Your cart is empty".to_string();
    };
    let lines: Vec<String> = cart
        .lines
        .iter()
        .map(|line| format!("{} x {}", line.quantity, line.product.title))
        .collect();
    format!("{} | Subtotal {}", lines.join(", "), cart.cost)
}

/// Cart count in the header; shows zero until the cart is known
pub fn cart_badge(cart: &Deferred<Option<Cart>>) -> Suspense<Option<Cart>, String> {
    Suspense::new("cart-badge", cart.clone(), |cart: &Option<Cart>| {
        format!("Cart {}", cart.as_ref().map(Cart::total_quantity).unwrap_or(0))
    })
    .fallback("Cart 0".to_string())
    .error_boundary(|_| "Cart".to_string())
}

pub fn header(header: &Header, badge: &str) -> String {
    match header.menu.as_ref().filter(|m| !m.items.is_empty()) {
        Some(menu) => format!("{} | {} | {}", header.shop_name, menu_titles(menu), badge),
        None => format!("{} | {}", header.shop_name, badge),
    }
}

pub fn featured_collection(collection: Option<&Collection>) -> String {
    collection
        .map(|c| format!("{} /collections/{}", c.title, c.handle))
        .unwrap_or_default()
}

/// Footer has no placeholder: nothing renders until it resolves
pub fn footer(footer: &Deferred<Footer>) -> Suspense<Footer, String> {
    Suspense::new("footer", footer.clone(), |footer: &Footer| {
        footer.menu.as_ref().map(menu_titles).unwrap_or_default()
    })
}

pub fn menu_aside(header: &Header) -> String {
    header
        .menu
        .as_ref()
        .filter(|m| !m.items.is_empty())
        .map(menu_titles)
        .unwrap_or_else(|| "No menu".to_string())
}

fn menu_titles(menu: &Menu) -> String {
    menu.items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>().join(" · ")
}

/// Search overlay body, bound to the newest ticket only
pub fn search_aside(ticket: Option<&SearchTicket>) -> Result<String, RenderError> {
    let Some(ticket) = ticket else {
        return Ok(SEARCH_IDLE.to_string());
    };
    let view = ticket
        .view(search_results)
        .fallback(PRODUCTS_FALLBACK.to_string())
        .error_boundary(|_| "Search unavailable".to_string());
    Ok(view.render_now()?.unwrap_or_default())
}

fn search_results(results: &SearchResults) -> String {
    if results.term.is_empty() {
        return SEARCH_IDLE.to_string();
    }
    if results.is_empty() {
        return format!("No results for \"{}\"", results.term);
    }
    let titles: Vec<&str> = results.products.iter().map(|p| p.title.as_str()).collect();
    let mut text = format!("\"{}\": {}", results.term, titles.join(", "));
    if !results.queries.is_empty() {
        text.push_str(&format!(" | try: {}", results.queries.join(", ")));
    }
    text
}

struct Tile {
    generation: u64,
    flag: GiftFlag,
    customize: Option<JoinHandle<()>>,
}

/// Recommended products grid
///
/// Each product gets a tile with its own gift flag. Tiles flagged as gifts
/// render nothing; the rest ask the runtime to decorate them once, after a
/// delay.
pub struct RecommendedProducts {
    bridge: WidgetBridge,
    customize_delay: Duration,
    tiles: Mutex<HashMap<String, Tile>>,
}

impl RecommendedProducts {
    pub fn new(bridge: WidgetBridge, config: &WidgetConfig) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            customize_delay: config.customize_delay(),
            tiles: Mutex::new(HashMap::new()),
        })
    }

    /// View over one payload's product list
    ///
    /// `generation` identifies the payload; a new one re-runs classification
    /// for tiles that are not already latched as gifts.
    pub fn view(self: &Arc<Self>, products: &Deferred<ProductList>, generation: u64) -> Suspense<ProductList, String> {
        let this = Arc::clone(self);
        Suspense::new("recommended-products", products.clone(), move |list: &ProductList| {
            this.render_tiles(list, generation)
        })
        .fallback(PRODUCTS_FALLBACK.to_string())
        .error_boundary(|_| PRODUCTS_ERROR.to_string())
    }

    fn render_tiles(&self, list: &ProductList, generation: u64) -> String {
        let mut tiles = self.tiles.lock().unwrap_or_else(PoisonError::into_inner);
        tiles.retain(|id, tile| {
            let listed = list.products.iter().any(|p| &p.id == id);
            if !listed && let Some(handle) = tile.customize.take() {
                handle.abort();
            }
            listed
        });
        let visible: Vec<String> = list
            .products
            .iter()
            .filter_map(|product| {
                let tile = tiles.entry(product.id.clone()).or_insert_with(|| Tile {
                    generation,
                    flag: GiftFlag::new(),
                    customize: None,
                });
                if !tile.flag.is_evaluated() || tile.generation != generation {
                    self.bridge.classify(product, &mut tile.flag);
                    tile.generation = generation;
                }
                if tile.flag.is_gift() {
                    return None;
                }
                if tile.customize.is_none() {
                    tile.customize = Some(self.schedule_customize(product));
                }
                Some(tile_text(product))
            })
            .collect();

        if visible.is_empty() {
            "No recommended products".to_string()
        } else {
            visible.join(" | ")
        }
    }

    fn schedule_customize(&self, product: &Product) -> JoinHandle<()> {
        debug!(product = %product.id, "RecommendedProducts::schedule_customize: called");
        let bridge = self.bridge.clone();
        let delay = self.customize_delay;
        let items = vec![product.to_ref()];
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bridge.render_customize_for_product(&items, &CustomizeOptions::collection());
        })
    }

    /// True once the product's tile latched as a gift
    pub fn is_hidden(&self, product_id: &str) -> bool {
        self.tiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .is_some_and(|t| t.flag.is_gift())
    }

    pub fn teardown(&self) {
        let mut tiles = self.tiles.lock().unwrap_or_else(PoisonError::into_inner);
        for tile in tiles.values_mut() {
            if let Some(handle) = tile.customize.take() {
                handle.abort();
            }
        }
    }
}

fn tile_text(product: &Product) -> String {
    format!("{} ({}) /products/{}", product.title, product.price, product.handle)
}
