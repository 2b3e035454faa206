//! Demo storefront data

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deferred::{Deferred, DeferredError};
use crate::domain::{
    Cart, CartLine, Collection, CustomerToken, Footer, Header, LoaderPayload, Menu, MenuItem, Money, Product, ProductList,
};

/// What the scripted loader serves, and how slowly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub header: Header,
    pub footer: Footer,
    pub cart: Option<Cart>,
    pub products: Vec<Product>,

    #[serde(rename = "featured-collection")]
    pub featured_collection: Option<Collection>,

    #[serde(rename = "customer-token")]
    pub customer_token: Option<String>,

    #[serde(rename = "cart-latency-ms")]
    pub cart_latency_ms: u64,

    #[serde(rename = "footer-latency-ms")]
    pub footer_latency_ms: u64,

    #[serde(rename = "products-latency-ms")]
    pub products_latency_ms: u64,

    /// Reject the cart with this message instead of resolving it
    #[serde(rename = "cart-error")]
    pub cart_error: Option<String>,

    #[serde(rename = "footer-error")]
    pub footer_error: Option<String>,

    #[serde(rename = "products-error")]
    pub products_error: Option<String>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::demo()
    }
}

impl Fixture {
    /// A small snowboard shop with one gift clone among its products
    pub fn demo() -> Self {
        let products = vec![
            product(1, "The Collection Snowboard: Hydrogen", "the-collection-snowboard-hydrogen", &[], "600.00"),
            product(2, "The Multi-managed Snowboard", "the-multi-managed-snowboard", &["premium"], "629.95"),
            product(
                3,
                "Snowboard Wax - Free Gift",
                "snowboard-wax-sca_clone_freegift",
                &["bogos-gift"],
                "0.00",
            ),
            product(4, "Gift Card", "gift-card", &[], "10.00"),
        ];
        let cart = Cart {
            id: "gid://shopify/Cart/demo".to_string(),
            lines: vec![CartLine {
                id: "gid://shopify/CartLine/1".to_string(),
                product: products[0].clone(),
                quantity: 2,
            }],
            cost: Money::new("1200.00", "USD"),
            checkout_url: Some("https://demo.example/checkouts/demo".to_string()),
        };

        Self {
            header: Header {
                shop_name: "Hydrogen Demo".to_string(),
                menu: Some(menu("main-menu", &["Collections", "Blog", "Policies"])),
            },
            footer: Footer {
                menu: Some(menu("footer", &["Search", "Privacy Policy", "Terms of Service"])),
            },
            cart: Some(cart),
            products,
            featured_collection: Some(Collection {
                id: "gid://shopify/Collection/1".to_string(),
                title: "Winter Collection".to_string(),
                handle: "winter".to_string(),
                image: None,
            }),
            customer_token: None,
            cart_latency_ms: 0,
            footer_latency_ms: 0,
            products_latency_ms: 0,
            cart_error: None,
            footer_error: None,
            products_error: None,
        }
    }

    /// Build a payload whose deferred parts settle after their latencies
    pub fn payload(&self) -> LoaderPayload {
        LoaderPayload {
            cart: deferred(self.cart.clone(), self.cart_latency_ms, &self.cart_error),
            footer: deferred(self.footer.clone(), self.footer_latency_ms, &self.footer_error),
            recommended_products: deferred(
                ProductList {
                    products: self.products.clone(),
                },
                self.products_latency_ms,
                &self.products_error,
            ),
            header: self.header.clone(),
            featured_collection: self.featured_collection.clone(),
            customer_token: self.customer_token.as_deref().map(CustomerToken::new),
        }
    }
}

fn deferred<T: Send + Sync + 'static>(value: T, latency_ms: u64, error: &Option<String>) -> Deferred<T> {
    let outcome = match error {
        Some(message) => Err(DeferredError::Rejected(message.clone())),
        None => Ok(value),
    };
    if latency_ms == 0 {
        return match outcome {
            Ok(value) => Deferred::resolved(value),
            Err(e) => Deferred::rejected(e),
        };
    }
    Deferred::from_future(async move {
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        outcome
    })
}

fn product(n: u32, title: &str, handle: &str, tags: &[&str], amount: &str) -> Product {
    Product {
        id: format!("gid://shopify/Product/{}", n),
        title: title.to_string(),
        handle: handle.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        price: Money::new(amount, "USD"),
        image: None,
    }
}

fn menu(id: &str, titles: &[&str]) -> Menu {
    Menu {
        id: id.to_string(),
        items: titles
            .iter()
            .enumerate()
            .map(|(i, title)| MenuItem {
                id: format!("{}-{}", id, i),
                title: title.to_string(),
                url: format!("/{}", title.to_lowercase().replace(' ', "-")),
            })
            .collect(),
    }
}
