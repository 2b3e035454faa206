//! Typed signal channel between the rendering core and the widget runtime
//!
//! Replaces document-level custom events. The event name stays the
//! discriminator on the wire; inside the core signals are a typed enum.
//!
//! ```text
//!   widget runtime ── "fg-gifts:updated" ──►┐
//!                                           ├── SignalBus (broadcast) ──► RevalidationChannel
//!   BundlePage ── "bogos:bundle-page-init" ►┘                       └──► widget runtime
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, SignalBus, SignalEmitter, create_signal_bus};
pub use types::{Signal, SignalEnvelope, SignalError, SignalNames, SignalOrigin};
