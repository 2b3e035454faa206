//! Suspense: placeholder first, projection once the value is there

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use super::error::{DeferredError, RenderError};
use super::stream::{Deferred, DeferredState};

type Projection<T, R> = Arc<dyn Fn(&T) -> R + Send + Sync>;
type Boundary<R> = Arc<dyn Fn(&DeferredError) -> R + Send + Sync>;

/// Renders a [`Deferred`] as a placeholder, then as a projection of its value
///
/// The projection only ever sees a resolved value. A rejection goes to the
/// error boundary when one is set and is reported as
/// [`RenderError::UnhandledRejection`] otherwise.
pub struct Suspense<T, R> {
    region: String,
    deferred: Deferred<T>,
    projection: Projection<T, R>,
    fallback: Option<R>,
    boundary: Option<Boundary<R>>,
}

impl<T, R> Suspense<T, R>
where
    T: Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(
        region: impl Into<String>,
        deferred: Deferred<T>,
        projection: impl Fn(&T) -> R + Send + Sync + 'static,
    ) -> Self {
        Self {
            region: region.into(),
            deferred,
            projection: Arc::new(projection),
            fallback: None,
            boundary: None,
        }
    }

    /// Placeholder rendered while the value is pending
    pub fn fallback(mut self, placeholder: R) -> Self {
        self.fallback = Some(placeholder);
        self
    }

    /// Render rejections through `handler` instead of failing
    pub fn error_boundary(mut self, handler: impl Fn(&DeferredError) -> R + Send + Sync + 'static) -> Self {
        self.boundary = Some(Arc::new(handler));
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Render synchronously from the current state
    ///
    /// `Ok(None)` means "pending with no fallback": render nothing.
    pub fn render_now(&self) -> Result<Option<R>, RenderError> {
        match self.deferred.peek() {
            DeferredState::Pending => Ok(self.fallback.clone()),
            DeferredState::Resolved(value) => Ok(Some((self.projection)(&value))),
            DeferredState::Rejected(error) => self.catch(error).map(Some),
        }
    }

    /// Suspend until the value settles and render the outcome
    pub async fn resolve(&self) -> Result<R, RenderError> {
        match self.deferred.wait().await {
            Ok(value) => Ok((self.projection)(&value)),
            Err(error) => self.catch(error),
        }
    }

    /// The render sequence: the current frame, then the settled frame if the
    /// value was still pending
    pub fn into_stream(self) -> BoxStream<'static, Result<Option<R>, RenderError>> {
        let first = self.render_now();
        if self.deferred.is_settled() {
            return stream::iter([first]).boxed();
        }

        debug!(region = %self.region, "Suspense::into_stream: pending, placeholder first");
        stream::iter([first])
            .chain(stream::once(async move { self.resolve().await.map(Some) }))
            .boxed()
    }

    fn catch(&self, error: DeferredError) -> Result<R, RenderError> {
        match &self.boundary {
            Some(handler) => {
                debug!(region = %self.region, %error, "Suspense: rejection caught by boundary");
                Ok(handler(&error))
            }
            None => {
                warn!(region = %self.region, %error, "Suspense: unhandled rejection");
                Err(RenderError::UnhandledRejection {
                    region: self.region.clone(),
                    source: error,
                })
            }
        }
    }
}
