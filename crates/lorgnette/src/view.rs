//! Pure derivations: preference + history ⇒ active index, graphs +
//! preference ⇒ active method. Stepping operations live here too so their
//! clamp/snap rules can be tested without a running session.

use std::collections::BTreeMap;

use lorgnette_types::{DEFAULT_ENTRY_POINT, Graph, SnapshotPreference};

/// Resolves the user preference against the current history length.
///
/// `Latest` follows the newest entry; a pinned index outside
/// `[0, len)` resolves to no active breakpoint at all.
pub fn resolve_active_index(pref: SnapshotPreference, len: usize) -> Option<usize> {
    match pref {
        SnapshotPreference::Latest => len.checked_sub(1),
        SnapshotPreference::Index(idx) if idx < len => Some(idx),
        SnapshotPreference::Index(_) => None,
    }
}

/// One step back, clamped at 0. Without a resolved index there is nothing
/// to step from and the preference is unchanged.
pub fn step_previous(pref: SnapshotPreference, len: usize) -> SnapshotPreference {
    match resolve_active_index(pref, len) {
        Some(idx) => SnapshotPreference::Index(idx.saturating_sub(1)),
        None => pref,
    }
}

/// One step forward. Stepping onto the last available index snaps the
/// preference to `Latest` so the view resumes following new breakpoints;
/// stepping at the tip is a no-op.
pub fn step_next(pref: SnapshotPreference, len: usize) -> SnapshotPreference {
    match resolve_active_index(pref, len) {
        Some(idx) if idx + 1 > len - 1 => pref,
        Some(idx) if idx + 1 == len - 1 => SnapshotPreference::Latest,
        Some(idx) => SnapshotPreference::Index(idx + 1),
        None => pref,
    }
}

/// Picks the active method key: the preferred one if the mapping has it,
/// else the well-known entry point, else the first key in map order.
pub fn resolve_active_method<'a>(
    graphs: &'a BTreeMap<String, Graph>,
    pref: Option<&str>,
) -> Option<&'a str> {
    if let Some(pref) = pref
        && let Some((key, _)) = graphs.get_key_value(pref)
    {
        return Some(key.as_str());
    }
    if let Some((key, _)) = graphs.get_key_value(DEFAULT_ENTRY_POINT) {
        return Some(key.as_str());
    }
    graphs.keys().next().map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphs(keys: &[&str]) -> BTreeMap<String, Graph> {
        keys.iter()
            .map(|key| {
                (
                    key.to_string(),
                    Graph {
                        name: key.to_string(),
                        source_text: format!("digraph {key} {{}}"),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn latest_tracks_tip() {
        assert_eq!(resolve_active_index(SnapshotPreference::Latest, 0), None);
        assert_eq!(resolve_active_index(SnapshotPreference::Latest, 3), Some(2));
    }

    #[test]
    fn pinned_index_is_range_checked() {
        assert_eq!(
            resolve_active_index(SnapshotPreference::Index(1), 3),
            Some(1)
        );
        assert_eq!(resolve_active_index(SnapshotPreference::Index(3), 3), None);
        assert_eq!(resolve_active_index(SnapshotPreference::Index(0), 0), None);
    }

    #[test]
    fn step_previous_clamps_at_zero() {
        assert_eq!(
            step_previous(SnapshotPreference::Index(2), 5),
            SnapshotPreference::Index(1)
        );
        assert_eq!(
            step_previous(SnapshotPreference::Index(0), 5),
            SnapshotPreference::Index(0)
        );
        assert_eq!(
            step_previous(SnapshotPreference::Latest, 5),
            SnapshotPreference::Index(3)
        );
        // Empty history: nothing resolved, nothing to step.
        assert_eq!(
            step_previous(SnapshotPreference::Latest, 0),
            SnapshotPreference::Latest
        );
    }

    #[test]
    fn step_next_snaps_to_latest_at_second_to_last() {
        assert_eq!(
            step_next(SnapshotPreference::Index(0), 5),
            SnapshotPreference::Index(1)
        );
        assert_eq!(
            step_next(SnapshotPreference::Index(3), 5),
            SnapshotPreference::Latest
        );
    }

    #[test]
    fn step_next_at_tip_is_a_no_op() {
        assert_eq!(
            step_next(SnapshotPreference::Latest, 5),
            SnapshotPreference::Latest
        );
        assert_eq!(
            step_next(SnapshotPreference::Index(4), 5),
            SnapshotPreference::Index(4)
        );
        // Single-entry history: the only index is the tip.
        assert_eq!(
            step_next(SnapshotPreference::Index(0), 1),
            SnapshotPreference::Index(0)
        );
    }

    #[test]
    fn preferred_method_wins_when_present() {
        let graphs = graphs(&["foo", "mj_main", "zzz"]);
        assert_eq!(resolve_active_method(&graphs, Some("zzz")), Some("zzz"));
    }

    #[test]
    fn entry_point_beats_map_order() {
        let graphs = graphs(&["aaa", "mj_main"]);
        assert_eq!(resolve_active_method(&graphs, None), Some("mj_main"));
        // Unknown preference falls through to the entry point too.
        assert_eq!(resolve_active_method(&graphs, Some("gone")), Some("mj_main"));
    }

    #[test]
    fn falls_back_to_first_key() {
        let graphs = graphs(&["beta", "alpha"]);
        assert_eq!(resolve_active_method(&graphs, None), Some("alpha"));
    }

    #[test]
    fn empty_mapping_has_no_active_method() {
        assert_eq!(resolve_active_method(&BTreeMap::new(), None), None);
        assert_eq!(resolve_active_method(&BTreeMap::new(), Some("x")), None);
    }
}
