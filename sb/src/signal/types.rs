//! Signal vocabulary shared with the widget runtime
//!
//! On the wire a signal is just a name (plus an optional detail object).
//! Inside the core it is a typed [`Signal`]; [`SignalNames`] maps between
//! the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SignalConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("Signal name must not be empty")]
    EmptyName,

    #[error("Signal {name} has an invalid detail field {field}")]
    InvalidDetail { name: String, field: &'static str },
}

/// Who dispatched a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalOrigin {
    /// The rendering core
    Core,
    /// The external widget runtime
    Widget,
}

impl std::fmt::Display for SignalOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Widget => write!(f, "widget"),
        }
    }
}

/// Typed signal, discriminated by its wire name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signal {
    /// The runtime changed the gifts attached to the cart
    GiftsUpdated,
    /// A bundle page mounted and is ready for the runtime to fill in
    ///
    /// The runtime reads the offer from the mount point; the id here is only
    /// present when the dispatcher chose to attach it.
    BundlePageInit {
        #[serde(rename = "offer-id", default)]
        offer_id: Option<String>,
    },
    /// Any name outside the fixed contract, passed through untouched
    Custom { name: String, detail: Value },
}

/// A signal as it travels on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub id: Uuid,
    pub origin: SignalOrigin,
    pub signal: Signal,
    #[serde(rename = "emitted-at")]
    pub emitted_at: DateTime<Utc>,
}

impl SignalEnvelope {
    pub fn new(origin: SignalOrigin, signal: Signal) -> Self {
        Self {
            id: Uuid::now_v7(),
            origin,
            signal,
            emitted_at: Utc::now(),
        }
    }
}

/// Wire names for the fixed signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalNames {
    pub gifts_updated: String,
    pub bundle_page_init: String,
}

impl Default for SignalNames {
    fn default() -> Self {
        Self::from_config(&SignalConfig::default())
    }
}

impl SignalNames {
    pub fn from_config(config: &SignalConfig) -> Self {
        Self {
            gifts_updated: config.gifts_updated.clone(),
            bundle_page_init: config.bundle_page_init.clone(),
        }
    }

    pub fn name_of<'a>(&'a self, signal: &'a Signal) -> &'a str {
        match signal {
            Signal::GiftsUpdated => &self.gifts_updated,
            Signal::BundlePageInit { .. } => &self.bundle_page_init,
            Signal::Custom { name, .. } => name,
        }
    }

    /// Detail object that accompanies `signal` on the wire
    pub fn detail_of(&self, signal: &Signal) -> Value {
        match signal {
            Signal::GiftsUpdated => Value::Null,
            Signal::BundlePageInit { offer_id: None } => Value::Null,
            Signal::BundlePageInit { offer_id: Some(id) } => serde_json::json!({ "offerId": id }),
            Signal::Custom { detail, .. } => detail.clone(),
        }
    }

    /// Decode a wire name and detail into a typed signal
    pub fn decode(&self, name: &str, detail: Value) -> Result<Signal, SignalError> {
        if name.is_empty() {
            return Err(SignalError::EmptyName);
        }
        if name == self.gifts_updated {
            return Ok(Signal::GiftsUpdated);
        }
        if name == self.bundle_page_init {
            let offer_id = match detail.get("offerId") {
                None | Some(Value::Null) => None,
                Some(Value::String(id)) => Some(id.clone()),
                Some(_) => {
                    return Err(SignalError::InvalidDetail {
                        name: name.to_string(),
                        field: "offerId",
                    });
                }
            };
            return Ok(Signal::BundlePageInit { offer_id });
        }
        Ok(Signal::Custom {
            name: name.to_string(),
            detail,
        })
    }

    pub fn all(&self) -> Vec<(&str, &'static str)> {
        vec![
            (self.gifts_updated.as_str(), "widget -> core: gifts in cart changed"),
            (self.bundle_page_init.as_str(), "core -> widget: bundle page mounted"),
        ]
    }
}
