//! Pure snapshot-vs-known-set diffing, plus the anomaly threshold and
//! confirmation intersection. No I/O here; the worker owns side effects.

use std::collections::{HashMap, HashSet};

use vigil_common::types::TrackedItem;

/// Result of diffing one snapshot against the known set.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    /// Present in the snapshot, absent from the known set.
    pub added: Vec<TrackedItem>,
    /// Present in the known set, absent from the snapshot. Empty for
    /// domains that don't track removals.
    pub removed: Vec<TrackedItem>,
}

impl Diff {
    pub fn size(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff a fresh snapshot against the known baseline.
///
/// Duplicate ids within the snapshot (possible across pages) collapse to
/// the first occurrence. Removed items keep their stored display fields so
/// the removal notification can describe what disappeared.
pub fn compute_diff(known: &[TrackedItem], snapshot: &[TrackedItem], track_removals: bool) -> Diff {
    let known_ids: HashSet<&str> = known.iter().map(|i| i.id.as_str()).collect();

    let mut seen = HashSet::new();
    let mut added = Vec::new();
    for item in snapshot {
        if !seen.insert(item.id.as_str()) {
            continue;
        }
        if !known_ids.contains(item.id.as_str()) {
            added.push(item.clone());
        }
    }

    let removed = if track_removals {
        known
            .iter()
            .filter(|i| !seen.contains(i.id.as_str()))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    Diff { added, removed }
}

/// `max(floor, known_count × ratio)`. Proportional so a 10k-subscription
/// account doesn't trip the guard on ordinary churn, floored so small
/// accounts still get protection.
pub fn anomaly_threshold(known_count: usize, floor: usize, ratio: f64) -> usize {
    let proportional = (known_count as f64 * ratio).floor() as usize;
    proportional.max(floor)
}

/// Intersect two independent diffs taken against the same baseline.
/// Only ids present in both are trusted; display fields come from the first.
pub fn confirmed(first: &Diff, second: &Diff) -> Diff {
    let added2: HashSet<&str> = second.added.iter().map(|i| i.id.as_str()).collect();
    let removed2: HashSet<&str> = second.removed.iter().map(|i| i.id.as_str()).collect();

    Diff {
        added: first
            .added
            .iter()
            .filter(|i| added2.contains(i.id.as_str()))
            .cloned()
            .collect(),
        removed: first
            .removed
            .iter()
            .filter(|i| removed2.contains(i.id.as_str()))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> TrackedItem {
        TrackedItem {
            id: id.to_string(),
            title: format!("title {id}"),
            channel_id: None,
            channel_title: None,
            duration_seconds: None,
            thumbnail: None,
        }
    }

    fn items(ids: &[&str]) -> Vec<TrackedItem> {
        ids.iter().map(|id| item(id)).collect()
    }

    fn ids(diff_side: &[TrackedItem]) -> Vec<&str> {
        diff_side.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn basic_diff() {
        let known = items(&["a", "b", "c"]);
        let snapshot = items(&["b", "c", "d"]);
        let diff = compute_diff(&known, &snapshot, true);
        assert_eq!(ids(&diff.added), vec!["d"]);
        assert_eq!(ids(&diff.removed), vec!["a"]);
    }

    #[test]
    fn unchanged_snapshot_is_empty_diff() {
        let known = items(&["a", "b"]);
        let diff = compute_diff(&known, &known.clone(), true);
        assert!(diff.is_empty());
    }

    #[test]
    fn removals_ignored_when_not_tracked() {
        let known = items(&["a", "b", "c"]);
        let snapshot = items(&["c"]);
        let diff = compute_diff(&known, &snapshot, false);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn duplicate_snapshot_ids_collapse() {
        let known = items(&["a"]);
        let snapshot = items(&["a", "b", "b"]);
        let diff = compute_diff(&known, &snapshot, true);
        assert_eq!(ids(&diff.added), vec!["b"]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn removed_items_keep_stored_fields() {
        let mut gone = item("a");
        gone.title = "stored title".to_string();
        let diff = compute_diff(&[gone], &[], true);
        assert_eq!(diff.removed[0].title, "stored title");
    }

    #[test]
    fn threshold_math() {
        // known=100, floor=15, ratio=3% → max(15, 3) = 15
        assert_eq!(anomaly_threshold(100, 15, 0.03), 15);
        // large set: proportional part dominates
        assert_eq!(anomaly_threshold(10_000, 15, 0.03), 300);
        // empty set: floor
        assert_eq!(anomaly_threshold(0, 15, 0.03), 15);
    }

    #[test]
    fn confirmation_intersection() {
        let first = Diff {
            added: items(&["a", "b"]),
            removed: items(&["x", "y"]),
        };
        let second = Diff {
            added: items(&["b", "c"]),
            removed: items(&["y", "z"]),
        };
        let conf = confirmed(&first, &second);
        assert_eq!(ids(&conf.added), vec!["b"]);
        assert_eq!(ids(&conf.removed), vec!["y"]);
    }

    #[test]
    fn disjoint_confirmation_is_empty() {
        let first = Diff {
            added: items(&["a"]),
            removed: items(&["x"]),
        };
        let second = Diff {
            added: items(&["b"]),
            removed: items(&["y"]),
        };
        assert!(confirmed(&first, &second).is_empty());
    }
}
