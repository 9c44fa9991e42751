//! Version cache and known-version set.
//!
//! Two layers, both derived from the repository's branch list, which
//! remains the source of truth: the known-id set answers `has_version` /
//! `versions` cheaply, and the resolved map memoizes fully loaded
//! [`Version`] values. Any detected change invalidates the resolved map
//! wholesale; precision is traded away because a pull can change
//! everything at once.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{compare_version_ids, Version};

/// Caches resolved versions and the set of known version ids.
#[derive(Debug)]
pub struct VersionCache {
    default_branch: String,
    resolved: Mutex<HashMap<String, Arc<Version>>>,
    known: Mutex<BTreeSet<String>>,
}

impl VersionCache {
    /// Creates an empty cache. The default branch is never a version and
    /// is filtered out of the known set.
    pub fn new(default_branch: impl Into<String>) -> Self {
        Self {
            default_branch: default_branch.into(),
            resolved: Mutex::new(HashMap::new()),
            known: Mutex::new(BTreeSet::new()),
        }
    }

    /// The cached resolved version, when present.
    pub fn cached(&self, version_id: &str) -> Option<Arc<Version>> {
        self.resolved.lock().get(version_id).cloned()
    }

    /// Stores a freshly resolved version and returns the shared handle.
    pub fn insert(&self, version: Version) -> Arc<Version> {
        let shared = Arc::new(version);
        self.resolved
            .lock()
            .insert(shared.id().to_string(), Arc::clone(&shared));
        shared
    }

    /// Drops every resolved version.
    pub fn invalidate_all(&self) {
        self.resolved.lock().clear();
    }

    /// Records a version id as known. The default branch is ignored.
    pub fn add_known(&self, version_id: &str) {
        if version_id != self.default_branch {
            self.known.lock().insert(version_id.to_string());
        }
    }

    /// Forgets a version entirely: resolved entry and known id.
    pub fn remove(&self, version_id: &str) {
        self.resolved.lock().remove(version_id);
        self.known.lock().remove(version_id);
    }

    /// Replaces the known set from a branch listing.
    pub fn replace_known<I, S>(&self, branch_names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known = self.known.lock();
        known.clear();
        for name in branch_names {
            let name = name.into();
            if name != self.default_branch {
                known.insert(name);
            }
        }
    }

    /// Whether a version id is known.
    pub fn contains(&self, version_id: &str) -> bool {
        self.known.lock().contains(version_id)
    }

    /// Known version ids in version order.
    pub fn known_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.known.lock().iter().cloned().collect();
        ids.sort_by(|a, b| compare_version_ids(a, b));
        ids
    }
}
