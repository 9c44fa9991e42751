//! Value types shared across the repository boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use uuid::Uuid;

/// Number of hex characters in an abbreviated commit id.
pub const COMMIT_SHORT_LENGTH: usize = 7;

/// An opaque commit identifier.
///
/// The store compares ids for equality and abbreviates them for display;
/// it never inspects their structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(String);

impl CommitId {
    /// Wraps an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh synthetic id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The full id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The abbreviated id used as a last-modified marker.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(COMMIT_SHORT_LENGTH);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The local and remote-tracking branches of a repository, each mapped to
/// its tip commit.
#[derive(Debug, Clone, Default)]
pub struct Branches {
    /// Local branches (`refs/heads/*`).
    pub local: BTreeMap<String, CommitId>,
    /// Remote-tracking branches (`refs/remotes/<remote>/*`).
    pub remote: BTreeMap<String, CommitId>,
}

impl Branches {
    /// All branch names seen on either side, deduplicated and sorted.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.local.keys().cloned().collect();
        for name in self.remote.keys() {
            if !self.local.contains_key(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }
}

/// Strategy applied when merging a remote commit into the current branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// The incoming commit wins every conflict.
    Theirs,
    /// The current branch wins every conflict.
    Ours,
}

/// Result of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The branch already contained the incoming commit.
    AlreadyUpToDate,
    /// The branch tip was moved forward without a merge commit.
    FastForward,
    /// A merge commit was created.
    Merged,
}

impl MergeOutcome {
    /// Returns true when the merge changed nothing.
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, MergeOutcome::AlreadyUpToDate)
    }
}

/// The kind of change a diff entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Path exists only in the newer tree.
    Added,
    /// Path exists in both trees with different contents.
    Modified,
    /// Path exists only in the older tree.
    Deleted,
}

/// One changed path between two commit trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Repository-relative path.
    pub path: String,
    /// What happened to the path.
    pub kind: DiffKind,
}

/// One entry of a working-tree directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (single path segment).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Credentials presented to the remote transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a username/password pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Anonymous access (empty username and password).
    pub fn anonymous() -> Self {
        Self::new("", "")
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password or token.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Options for fetch and push: bounded timeout plus credentials.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Maximum time the transport may take before failing the operation.
    pub timeout: Duration,
    /// Credentials presented to the remote.
    pub credentials: Credentials,
}

impl TransportOptions {
    /// Creates transport options.
    pub fn new(timeout: Duration, credentials: Credentials) -> Self {
        Self {
            timeout,
            credentials,
        }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Credentials::anonymous())
    }
}
