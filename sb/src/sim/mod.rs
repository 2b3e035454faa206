//! Scripted collaborators for driving a page without a storefront
//!
//! A [`Scenario`] wires a [`ScriptedLoader`], a [`ScriptedRuntime`] that
//! attaches late (or never), and a [`ScriptedSearch`] backend around a
//! [`PageSession`](crate::page::PageSession), then samples frames on a fixed
//! tick. The integration tests and `sb simulate` both run on top of it.

mod fixture;
mod loader;
mod runtime;
mod scenario;
mod search;

pub use fixture::Fixture;
pub use loader::ScriptedLoader;
pub use runtime::ScriptedRuntime;
pub use scenario::{Scenario, ScenarioReport, ScriptedInput, ScriptedSignal, run};
pub use search::ScriptedSearch;
