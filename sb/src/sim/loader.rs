//! Scripted loader with per-call latency and failure injection

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::fixture::Fixture;
use crate::domain::{LoaderPayload, Route};
use crate::revalidate::{LoadError, Loader};

/// Serves a [`Fixture`]
///
/// Each `load` call takes the next queued latency (zero when the queue is
/// empty) and the next queued failure, in call order.
pub struct ScriptedLoader {
    fixture: Mutex<Fixture>,
    latencies: Mutex<VecDeque<Duration>>,
    failures: Mutex<VecDeque<LoadError>>,
    default_latency: Duration,
    calls: AtomicU64,
}

impl ScriptedLoader {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Mutex::new(fixture),
            latencies: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            default_latency: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    /// Latency used once the queue runs dry
    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    pub fn push_latency(&self, latency: Duration) {
        self.latencies.lock().unwrap_or_else(PoisonError::into_inner).push_back(latency);
    }

    pub fn fail_next(&self, error: LoadError) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).push_back(error);
    }

    /// Change what later loads serve
    pub fn update_fixture(&self, update: impl FnOnce(&mut Fixture)) {
        update(&mut self.fixture.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader for ScriptedLoader {
    async fn load(&self, route: &Route) -> Result<LoaderPayload, LoadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let latency = self
            .latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.default_latency);
        let failure = self.failures.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        let fixture = self.fixture.lock().unwrap_or_else(PoisonError::into_inner).clone();
        debug!(call, path = %route.path, ?latency, "ScriptedLoader::load: called");

        tokio::time::sleep(latency).await;
        match failure {
            Some(error) => Err(error),
            None => Ok(fixture.payload()),
        }
    }
}
