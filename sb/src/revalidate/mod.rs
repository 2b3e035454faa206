//! Revalidation: keep loader-owned page data in step with the widget runtime
//!
//! ```text
//!   SignalBus ──GiftsUpdated──► RevalidationChannel
//!                                  │ 1. OverlayRegistry::open_cart()
//!                                  │ 2. Revalidator::revalidate()
//!                                  ▼
//!                      Loader ──► Mailbox<LoaderPayload> (newest generation wins)
//! ```

mod channel;
mod loader;
mod revalidator;

pub use channel::{RevalidationChannel, RevalidationStats};
pub use loader::{LoadError, Loader};
pub use revalidator::{RevalidationOutcome, Revalidator};
