//! Catalog, cart and menu records

use serde::{Deserialize, Serialize};

/// Price as returned by the storefront API (decimal string + ISO currency)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: String,
    #[serde(rename = "currency-code")]
    pub currency_code: String,
}

impl Money {
    pub fn new(amount: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency_code: currency_code.into(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(rename = "alt-text", default)]
    pub alt_text: Option<String>,
}

/// A product as listed in collections and recommendations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub handle: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price: Money,
    #[serde(default)]
    pub image: Option<Image>,
}

impl Product {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn to_ref(&self) -> ProductRef {
        ProductRef { id: self.id.clone() }
    }
}

/// Minimal product reference handed to the widget runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
}

/// Collection promoted on the home page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub handle: String,
    #[serde(default)]
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub product: Product,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    #[serde(default)]
    pub lines: Vec<CartLine>,
    pub cost: Money,
    #[serde(rename = "checkout-url", default)]
    pub checkout_url: Option<String>,
}

impl Cart {
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

/// Header data, always available synchronously
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "shop-name")]
    pub shop_name: String,
    #[serde(default)]
    pub menu: Option<Menu>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    #[serde(default)]
    pub menu: Option<Menu>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(handle: &str, tags: &[&str]) -> Product {
        Product {
            id: format!("gid://shopify/Product/{}", handle),
            title: handle.to_string(),
            handle: handle.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            price: Money::new("10.0", "USD"),
            image: None,
        }
    }

    #[test]
    fn test_has_tag() {
        let p = product("snowboard", &["winter", "bogos-gift"]);
        assert!(p.has_tag("bogos-gift"));
        assert!(!p.has_tag("bogos"));
    }

    #[test]
    fn test_cart_total_quantity() {
        let cart = Cart {
            id: "cart-1".to_string(),
            lines: vec![
                CartLine {
                    id: "l1".to_string(),
                    product: product("a", &[]),
                    quantity: 2,
                },
                CartLine {
                    id: "l2".to_string(),
                    product: product("b", &[]),
                    quantity: 3,
                },
            ],
            cost: Money::new("50.0", "USD"),
            checkout_url: None,
        };
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_product_yaml_defaults() {
        let yaml = r#"
id: p1
title: Board
handle: board
price: { amount: "9.99", currency-code: EUR }
"#;
        let p: Product = serde_yaml::from_str(yaml).unwrap();
        assert!(p.tags.is_empty());
        assert!(p.image.is_none());
        assert_eq!(p.price.to_string(), "9.99 EUR");
    }
}
