//! Append-only record of every breakpoint the compiler has reported.
//!
//! The listing endpoint returns the *entire* history on every poll and the
//! store diffs by length: only strict growth appends the trailing delta.
//! Entries are never reordered, rewritten, or evicted; each entry's snapshot
//! cache goes `None → Some` at most once.

use std::sync::Arc;

use lorgnette_types::{Breakpoint, CompilationState};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub breakpoint: Breakpoint,
    pub cached_state: Option<Arc<CompilationState>>,
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, idx: usize) -> Option<&HistoryEntry> {
        self.entries.get(idx)
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.entries
            .iter()
            .map(|entry| entry.breakpoint.clone())
            .collect()
    }

    pub fn cached_state(&self, idx: usize) -> Option<Arc<CompilationState>> {
        self.entries.get(idx).and_then(|e| e.cached_state.clone())
    }

    /// Absorbs a full listing from the server. Returns whether history grew.
    ///
    /// Already-recorded positions are authoritative here, not in the
    /// listing: a shorter listing is a server-contract violation and is
    /// ignored, and a listing that rewrites old positions appends only the
    /// suffix beyond the current length.
    pub fn absorb_listing(&mut self, listing: Vec<Breakpoint>) -> bool {
        if listing.len() < self.entries.len() {
            warn!(
                listing = listing.len(),
                recorded = self.entries.len(),
                "breakpoint listing shrank, ignoring"
            );
            return false;
        }
        if listing.len() == self.entries.len() {
            return false;
        }
        for breakpoint in listing.into_iter().skip(self.entries.len()) {
            self.entries.push(HistoryEntry {
                breakpoint,
                cached_state: None,
            });
        }
        true
    }

    /// Write-once snapshot cache for one entry. Returns whether the write
    /// took effect.
    ///
    /// A payload whose embedded breakpoint does not match the recorded one
    /// is a misaligned fetch and is dropped. An already-cached entry is left
    /// untouched, so overlapping duplicate fetches cannot corrupt it.
    pub fn cache_state(&mut self, idx: usize, state: CompilationState) -> bool {
        let Some(entry) = self.entries.get_mut(idx) else {
            warn!(idx, "snapshot arrived for unknown history index");
            return false;
        };
        if entry.cached_state.is_some() {
            return false;
        }
        if state.breakpoint != entry.breakpoint {
            warn!(
                idx,
                recorded = %entry.breakpoint,
                received = %state.breakpoint,
                "snapshot breakpoint does not match history entry, dropping"
            );
            return false;
        }
        entry.cached_state = Some(Arc::new(state));
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lorgnette_types::Graph;

    use super::*;

    fn bp(label: &str, line: u32) -> Breakpoint {
        Breakpoint {
            label: label.into(),
            file: "a.mj".into(),
            line,
            column: 0,
        }
    }

    fn state_for(breakpoint: Breakpoint) -> CompilationState {
        let mut graphs = BTreeMap::new();
        graphs.insert(
            "mj_main".to_string(),
            Graph {
                name: "mj_main".into(),
                source_text: "digraph {}".into(),
            },
        );
        CompilationState { breakpoint, graphs }
    }

    #[test]
    fn only_strict_growth_appends() {
        let mut store = HistoryStore::new();
        assert!(store.absorb_listing(vec![bp("a", 1), bp("b", 2)]));
        assert_eq!(store.len(), 2);

        // Same length: nothing happens, even if content differs.
        assert!(!store.absorb_listing(vec![bp("x", 9), bp("y", 9)]));
        assert_eq!(store.entry(0).unwrap().breakpoint, bp("a", 1));

        // Growth appends only the suffix; earlier positions stay untouched.
        assert!(store.absorb_listing(vec![bp("x", 9), bp("y", 9), bp("c", 3)]));
        assert_eq!(store.len(), 3);
        assert_eq!(store.entry(0).unwrap().breakpoint, bp("a", 1));
        assert_eq!(store.entry(2).unwrap().breakpoint, bp("c", 3));
    }

    #[test]
    fn shrunken_listing_is_ignored() {
        let mut store = HistoryStore::new();
        store.absorb_listing(vec![bp("a", 1), bp("b", 2)]);
        assert!(!store.absorb_listing(vec![bp("a", 1)]));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn repeated_locations_stay_distinct_entries() {
        let mut store = HistoryStore::new();
        store.absorb_listing(vec![bp("loop", 5), bp("loop", 5), bp("loop", 5)]);
        assert_eq!(store.len(), 3);
        assert!(
            store
                .entry(1)
                .unwrap()
                .breakpoint
                .same_location(&store.entry(2).unwrap().breakpoint)
        );
    }

    #[test]
    fn cache_is_write_once() {
        let mut store = HistoryStore::new();
        store.absorb_listing(vec![bp("a", 1)]);

        assert!(store.cache_state(0, state_for(bp("a", 1))));
        let first = store.cached_state(0).unwrap();

        // A second completion for the same index is a no-op.
        let mut second = state_for(bp("a", 1));
        second.graphs.clear();
        assert!(!store.cache_state(0, second));
        assert!(Arc::ptr_eq(&first, &store.cached_state(0).unwrap()));
    }

    #[test]
    fn misaligned_snapshot_is_rejected() {
        let mut store = HistoryStore::new();
        store.absorb_listing(vec![bp("a", 1)]);
        assert!(!store.cache_state(0, state_for(bp("other", 42))));
        assert!(store.cached_state(0).is_none());
    }

    #[test]
    fn snapshot_for_unknown_index_is_rejected() {
        let mut store = HistoryStore::new();
        assert!(!store.cache_state(3, state_for(bp("a", 1))));
        assert!(store.is_empty());
    }
}
