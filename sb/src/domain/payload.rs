//! Per-navigation loader output

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{Cart, Collection, Footer, Header, ProductList};
use super::identity::CustomerToken;
use crate::deferred::Deferred;

/// Route the loader is keyed on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse `/bundle-page/<id>` style paths into a route with an `id` param
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed.strip_prefix("/bundle-page/") {
            Some(id) if !id.is_empty() && !id.contains('/') => Self::new(path).with_param("id", id),
            _ => Self::new(if trimmed.is_empty() { "/" } else { trimmed }),
        }
    }
}

/// Everything the loader produced for one navigation
///
/// Immutable once built. The deferred fields may still be pending.
#[derive(Debug, Clone)]
pub struct LoaderPayload {
    pub cart: Deferred<Option<Cart>>,
    pub footer: Deferred<Footer>,
    pub recommended_products: Deferred<ProductList>,
    pub header: Header,
    /// Resolved with the page, never deferred
    pub featured_collection: Option<Collection>,
    pub customer_token: Option<CustomerToken>,
}

impl LoaderPayload {
    /// A payload whose deferred values are all already resolved
    pub fn ready(cart: Option<Cart>, footer: Footer, products: ProductList, header: Header) -> Self {
        Self {
            cart: Deferred::resolved(cart),
            footer: Deferred::resolved(footer),
            recommended_products: Deferred::resolved(products),
            header,
            featured_collection: None,
            customer_token: None,
        }
    }

    pub fn with_featured(mut self, collection: Option<Collection>) -> Self {
        self.featured_collection = collection;
        self
    }

    pub fn with_customer(mut self, token: Option<CustomerToken>) -> Self {
        self.customer_token = token;
        self
    }

    /// True once every deferred field has resolved or rejected
    pub fn is_settled(&self) -> bool {
        self.cart.is_settled() && self.footer.is_settled() && self.recommended_products.is_settled()
    }

    /// Wait for every deferred field to settle, ignoring rejections
    pub async fn settled(&self) {
        let _ = self.cart.wait().await;
        let _ = self.footer.wait().await;
        let _ = self.recommended_products.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse_bundle_page() {
        let route = Route::parse("/bundle-page/offer-42");
        assert_eq!(route.param("id"), Some("offer-42"));

        let home = Route::parse("/");
        assert_eq!(home.path, "/");
        assert!(home.param("id").is_none());

        let bare = Route::parse("/bundle-page/");
        assert!(bare.param("id").is_none());
    }

    #[tokio::test]
    async fn test_ready_payload_is_settled() {
        let payload = LoaderPayload::ready(None, Footer::default(), ProductList::default(), Header::default())
            .with_customer(Some(CustomerToken::new("tok")));
        assert!(payload.is_settled());
        payload.settled().await;
        assert_eq!(payload.customer_token.as_ref().map(|t| t.expose()), Some("tok"));
        assert!(payload.featured_collection.is_none());
    }
}
