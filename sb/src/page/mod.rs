//! Page composition
//!
//! A [`PageSession`] owns everything one page needs: the loaded payload,
//! the widget bridge, the overlay registry and the revalidation channel.
//! [`PageSession::render`] turns the current state into a [`Frame`].

mod bundle;
mod components;
mod layout;
mod session;

pub use bundle::BundlePage;
pub use components::{
    CART_ERROR, CART_FALLBACK, PRODUCTS_ERROR, PRODUCTS_FALLBACK, RecommendedProducts, SEARCH_IDLE, cart_aside,
    cart_badge, footer, header, menu_aside, search_aside,
};
pub use layout::{AsideBlock, Frame};
pub use session::{PageSession, SessionStats};
