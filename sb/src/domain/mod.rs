//! Domain types for the storefront page
//!
//! Catalog and cart records as the loader hands them over, plus the
//! per-navigation [`LoaderPayload`] that mixes resolved and deferred values.

mod catalog;
mod identity;
mod payload;

pub use catalog::{Cart, CartLine, Collection, Footer, Header, Image, Menu, MenuItem, Money, Product, ProductList, ProductRef};
pub use identity::{CustomerToken, IdentityPayload};
pub use payload::{LoaderPayload, Route};
