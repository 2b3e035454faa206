//! Overlay panels (cart, search, mobile menu)
//!
//! Overlays open by URL: `open(id)` writes `#id` into the [`Location`], and
//! the open overlay is whatever the fragment names. That keeps openers (user
//! clicks, the revalidation channel) decoupled from the panels themselves and
//! makes every transition back/forward navigable.

mod location;
mod registry;

pub use location::{Location, LocationState};
pub use registry::{OverlayError, OverlayRegistry, OverlayState, OverlayWatcher, Panel};
