//! Bridge to the externally loaded promotions runtime
//!
//! The runtime is third-party script that attaches itself to the page scope
//! some time after load. The bridge writes the caller identity up front,
//! polls for the runtime with bounded backoff, and gates every call on it
//! having been found.

mod bridge;
mod gift;
mod runtime;
mod scope;

pub use bridge::{BridgePhase, BridgeStats, Dispatch, WidgetBridge, WidgetError};
pub use gift::{GiftClassifier, GiftFlag, GiftHeuristic};
pub use runtime::{CustomizeOptions, WidgetRuntime};
pub use scope::{GlobalScope, IdentitySlot};
