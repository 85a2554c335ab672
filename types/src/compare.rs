//! Equality helpers shared by the per-kind drift checks.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Order-insensitive comparison that still counts duplicates.
#[must_use]
pub fn same_multiset<T: Eq + Hash>(left: &[T], right: &[T]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut counts: HashMap<&T, isize> = HashMap::with_capacity(left.len());
    for item in left {
        *counts.entry(item).or_default() += 1;
    }
    for item in right {
        match counts.get_mut(item) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return false,
        }
    }
    true
}

/// Claim maps compare by content. Absent and empty are the same thing on the
/// wire, so this is plain map equality.
#[must_use]
pub fn same_claims(left: &BTreeMap<String, String>, right: &BTreeMap<String, String>) -> bool {
    left == right
}
