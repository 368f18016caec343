//! Three-way diff of two object listings.
//!
//! Pure classification, no I/O: given the previous listing snapshot and a
//! fresh one, partition paths into added / removed / updated. The index
//! reconciler uses the result to touch only what changed.

use std::collections::HashMap;

use crate::object::Object;

/// The outcome of diffing two object listings.
///
/// The three sets are disjoint by path: a path that persists across both
/// listings with changed meta is an update, never a remove + add. No
/// ordering is guaranteed within any set.
#[derive(Debug, Clone, Default)]
pub struct ObjectSliceDiff {
    /// Objects present only in the new listing.
    pub added: Vec<Object>,
    /// Objects present only in the old listing.
    pub removed: Vec<Object>,
    /// Objects present in both listings whose meta differs. Carries the
    /// new listing's entry.
    pub updated: Vec<Object>,
}

impl ObjectSliceDiff {
    /// Whether the two listings differ at all. Callers use this as the
    /// short-circuit for no-op reconciles.
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty())
    }
}

/// Compare two listings and classify every path.
///
/// O(n + m): both listings are indexed by path once. Entries are cloned
/// into the result so the diff owns its data independently of either input.
pub fn diff(old: &[Object], new: &[Object]) -> ObjectSliceDiff {
    let old_by_path: HashMap<&str, &Object> =
        old.iter().map(|o| (o.path.as_str(), o)).collect();
    let new_by_path: HashMap<&str, &Object> =
        new.iter().map(|o| (o.path.as_str(), o)).collect();

    let mut result = ObjectSliceDiff::default();

    for object in new {
        match old_by_path.get(object.path.as_str()) {
            None => result.added.push(object.clone()),
            Some(previous) if !previous.same_meta(object) => {
                result.updated.push(object.clone());
            }
            Some(_) => {}
        }
    }

    for object in old {
        if !new_by_path.contains_key(object.path.as_str()) {
            result.removed.push(object.clone());
        }
    }

    result
}
