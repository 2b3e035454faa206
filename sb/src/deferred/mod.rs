//! Deferred values and suspense rendering
//!
//! A [`Deferred`] is a value the loader promised but has not produced yet.
//! It renders as a placeholder until it resolves, then as a projection of the
//! resolved value:
//!
//! ```text
//!   loader ──► Resolver::resolve(v) ──► watch channel ──► Deferred (clones)
//!                                                          │
//!                               Suspense::render_now ◄─────┘  fallback | projection | boundary
//! ```
//!
//! Every clone observes the same resolution. Rejections are never swallowed:
//! a [`Suspense`] without an error boundary reports
//! [`RenderError::UnhandledRejection`].

mod error;
mod stream;
mod suspense;

pub use error::{DeferredError, RenderError};
pub use stream::{Deferred, DeferredState, Resolver};
pub use suspense::Suspense;
