//! Deferred value errors

use thiserror::Error;

/// Why a deferred value did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError {
    #[error("Deferred value rejected: {0}")]
    Rejected(String),

    #[error("Resolver dropped before settling")]
    Dropped,

    #[error("Superseded by a newer request")]
    Superseded,
}

impl DeferredError {
    /// Superseded values are expected under last-write-wins and are not failures
    pub fn is_superseded(&self) -> bool {
        matches!(self, DeferredError::Superseded)
    }
}

/// Render failures surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Unhandled rejection in {region}: {source}")]
    UnhandledRejection {
        region: String,
        #[source]
        source: DeferredError,
    },
}
