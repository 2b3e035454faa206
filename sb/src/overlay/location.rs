//! URL fragment with back/forward history

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

/// Most history entries kept; the oldest fall off first
pub const MAX_HISTORY: usize = 50;

/// History of fragments with a cursor at the current entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationState {
    entries: Vec<Option<String>>,
    cursor: usize,
}

impl LocationState {
    fn new() -> Self {
        Self {
            entries: vec![None],
            cursor: 0,
        }
    }

    /// Current fragment without the leading `#`
    pub fn fragment(&self) -> Option<&str> {
        self.entries.get(self.cursor).and_then(|f| f.as_deref())
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The page location, reduced to the part overlays care about: the fragment
///
/// Cloning shares the same location. Every write notifies subscribers, even
/// when it repeats the current fragment.
#[derive(Clone)]
pub struct Location {
    tx: Arc<watch::Sender<LocationState>>,
    writes: Arc<AtomicU64>,
}

impl Default for Location {
    fn default() -> Self {
        Self::new()
    }
}

impl Location {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LocationState::new());
        Self {
            tx: Arc::new(tx),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Write the fragment (`None` or empty clears it)
    ///
    /// Writing the current value again keeps history unchanged.
    pub fn set_fragment(&self, fragment: Option<&str>) {
        let fragment = fragment.map(|f| f.trim_start_matches('#')).filter(|f| !f.is_empty());
        debug!(?fragment, "Location::set_fragment: called");
        self.writes.fetch_add(1, Ordering::SeqCst);

        self.tx.send_modify(|state| {
            if state.fragment() == fragment {
                return;
            }
            state.entries.truncate(state.cursor + 1);
            state.entries.push(fragment.map(str::to_string));
            let overflow = state.entries.len().saturating_sub(MAX_HISTORY);
            state.entries.drain(..overflow);
            state.cursor = state.entries.len() - 1;
        });
    }

    /// Step back in history, returning false at the first entry
    pub fn back(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.can_go_back() {
                return false;
            }
            state.cursor -= 1;
            true
        })
    }

    pub fn forward(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.can_go_forward() {
                return false;
            }
            state.cursor += 1;
            true
        })
    }

    pub fn fragment(&self) -> Option<String> {
        self.tx.borrow().fragment().map(str::to_string)
    }

    /// `#id`, or an empty string when no fragment is set
    pub fn hash(&self) -> String {
        self.fragment().map(|f| format!("#{}", f)).unwrap_or_default()
    }

    /// Number of fragment writes, including repeats
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LocationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.tx.subscribe()
    }
}
