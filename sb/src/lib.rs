//! Storefront Bridge - deferred page data and widget runtime synchronization
//!
//! The core of a storefront page that streams part of its data and shares the
//! page with a third-party promotions runtime it does not control.
//!
//! # Core Concepts
//!
//! - **Deferred data**: slow payload parts render a fallback, then resolve in place
//! - **Late runtime**: the widget runtime is polled for, never assumed present
//! - **Identity first**: the customer token is written before the runtime exists
//! - **Latest wins**: revalidations and searches discard results that lost a race
//!
//! # Modules
//!
//! - [`deferred`] - Deferred values and suspense boundaries
//! - [`mailbox`] - Generation-tagged latest-wins slots
//! - [`domain`] - Storefront data types
//! - [`signal`] - Named signals shared with the runtime
//! - [`widget`] - Runtime bridge, identity slot and gift classification
//! - [`overlay`] - Cart, search and menu panels
//! - [`revalidate`] - Loader re-runs driven by runtime signals
//! - [`search`] - Predictive search
//! - [`page`] - Page session and rendering
//! - [`sim`] - Scripted collaborators and scenarios
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod deferred;
pub mod domain;
pub mod mailbox;
pub mod overlay;
pub mod page;
pub mod revalidate;
pub mod search;
pub mod signal;
pub mod sim;
pub mod widget;

// Re-export commonly used types
pub use config::Config;
pub use deferred::{Deferred, DeferredError, DeferredState, RenderError, Suspense};
pub use domain::{Cart, CustomerToken, IdentityPayload, LoaderPayload, Product, Route};
pub use mailbox::{Mailbox, Publish, Slot, Ticket};
pub use overlay::{OverlayRegistry, Panel};
pub use page::{Frame, PageSession, SessionStats};
pub use revalidate::{LoadError, Loader, RevalidationChannel, Revalidator};
pub use search::{PredictiveSearchClient, SearchBackend, SearchResults};
pub use signal::{Signal, SignalBus, SignalOrigin, create_signal_bus};
pub use widget::{BridgePhase, GlobalScope, WidgetBridge, WidgetRuntime};
