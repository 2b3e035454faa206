//! Loader boundary: where page data comes from

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{LoaderPayload, Route};

/// Errors a loader can report for a whole navigation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("No loader data for route {0}")]
    NotFound(String),

    #[error("Loader failed: {0}")]
    Failed(String),

    #[error("Loader timed out after {0:?}")]
    Timeout(Duration),
}

impl LoadError {
    /// Check if running the loader again could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::NotFound(_) => false,
            LoadError::Failed(_) => true,
            LoadError::Timeout(_) => true,
        }
    }
}

/// Produces the payload for one navigation
///
/// Implementations may return a payload whose deferred fields are still
/// pending; the page renders them as they settle.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, route: &Route) -> Result<LoaderPayload, LoadError>;
}
