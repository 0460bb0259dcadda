//! Recursive key propagation
//!
//! A key-value pair is written into a mapping and every mapping reachable
//! from it through object values and array elements. Existing keys are never
//! overwritten, so annotating twice with different values keeps the first.
//!
//! Dispatch is on the JSON variant:
//! - object: insert if absent, then visit every value
//! - array reached from an object: visit every element that is an object
//! - anything else: nothing to do
//!
//! Injected values are not traversed themselves. The key is appended after
//! the mapping's existing keys.

use serde_json::{Map, Value};

/// Counters collected while annotating a tree
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateStats {
    /// Mapping nodes visited
    pub visited: usize,
    /// Mapping nodes that received the key
    pub inserted: usize,
}

impl AnnotateStats {
    /// Accumulate another run's counters
    pub fn merge(&mut self, other: AnnotateStats) {
        self.visited += other.visited;
        self.inserted += other.inserted;
    }
}

/// Set `key` on `map` unless it is already present
///
/// Returns `true` when the key was inserted.
pub fn insert_if_absent(map: &mut Map<String, Value>, key: &str, value: &Value) -> bool {
    if map.contains_key(key) {
        return false;
    }
    map.insert(key.to_string(), value.clone());
    true
}

/// Propagate `key: value` into `node` and all nested mappings
///
/// A `node` that is not an object is left untouched.
pub fn annotate(node: &mut Value, key: &str, value: &Value) -> AnnotateStats {
    let mut stats = AnnotateStats::default();
    if let Value::Object(map) = node {
        annotate_map_into(map, key, value, &mut stats);
    }
    stats
}

/// Same as [`annotate`] for a mapping that is already unwrapped
pub fn annotate_map(map: &mut Map<String, Value>, key: &str, value: &Value) -> AnnotateStats {
    let mut stats = AnnotateStats::default();
    annotate_map_into(map, key, value, &mut stats);
    stats
}

fn annotate_map_into(
    root: &mut Map<String, Value>,
    key: &str,
    value: &Value,
    stats: &mut AnnotateStats,
) {
    // Explicit work list; document depth is unbounded.
    let mut pending = vec![root];

    while let Some(map) = pending.pop() {
        stats.visited += 1;
        let inserted = insert_if_absent(map, key, value);
        if inserted {
            stats.inserted += 1;
        }

        for (name, child) in map {
            if inserted && name == key {
                continue;
            }
            match child {
                Value::Object(inner) => pending.push(inner),
                Value::Array(items) => {
                    pending.extend(items.iter_mut().filter_map(|item| match item {
                        Value::Object(inner) => Some(inner),
                        _ => None,
                    }))
                }
                _ => {}
            }
        }
    }
}
