//! Deterministic map traversal
//!
//! Every observable walk over a keyed collection goes through
//! [`sorted_keys`], so iteration order never depends on hashing.

use std::collections::HashMap;

/// Keys of `map` in ascending order
pub fn sorted_keys<K: Ord, V, S>(map: &HashMap<K, V, S>) -> Vec<&K> {
    let mut keys: Vec<&K> = map.keys().collect();
    keys.sort_unstable();
    keys
}
