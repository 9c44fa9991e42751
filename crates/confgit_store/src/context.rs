//! Per-operation synchronization context.

/// Describes which synchronization phases one top-level operation needs,
/// tracks which have run, and accumulates the commit message.
///
/// Each phase may be claimed at most once per context, and only when it
/// was required. Violations are programming errors and panic.
#[derive(Debug, Default)]
pub struct GitContext {
    require_pull: bool,
    delete_branches: bool,
    require_commit: bool,
    require_push: bool,
    pull_claimed: bool,
    commit_claimed: bool,
    push_claimed: bool,
    message: String,
}

impl GitContext {
    /// Creates a context requiring no phases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a pull, with local-branch deletion disabled.
    pub fn require_pull(mut self) -> Self {
        self.require_pull = true;
        self.delete_branches = false;
        self
    }

    /// Requires a pull that also deletes local branches absent from the
    /// remote. Reserved for explicit remote-URL-change handling.
    pub fn require_pull_with_deletions(mut self) -> Self {
        self.require_pull = true;
        self.delete_branches = true;
        self
    }

    /// Requires a commit.
    pub fn require_commit(mut self) -> Self {
        self.require_commit = true;
        self
    }

    /// Requires a push.
    pub fn require_push(mut self) -> Self {
        self.require_push = true;
        self
    }

    /// Whether this context needs the write lock (pull or commit).
    pub fn requires_write(&self) -> bool {
        self.require_pull || self.require_commit
    }

    /// Whether a pull is required.
    pub fn is_pull_required(&self) -> bool {
        self.require_pull
    }

    /// Whether a commit is required.
    pub fn is_commit_required(&self) -> bool {
        self.require_commit
    }

    /// Whether a push is required.
    pub fn is_push_required(&self) -> bool {
        self.require_push
    }

    /// Whether the pull may delete local branches.
    pub fn delete_branches(&self) -> bool {
        self.delete_branches
    }

    /// Appends a line to the commit message.
    pub fn commit_message(&mut self, line: impl AsRef<str>) {
        if !self.message.is_empty() {
            self.message.push('\n');
        }
        self.message.push_str(line.as_ref());
    }

    /// The accumulated commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Claims the pull phase.
    ///
    /// # Panics
    ///
    /// Panics when pull was not required or was already performed.
    pub fn claim_pull(&mut self) {
        assert!(self.require_pull, "pull not required in context");
        assert!(!self.pull_claimed, "pull already performed in context");
        self.pull_claimed = true;
    }

    /// Claims the commit phase.
    ///
    /// # Panics
    ///
    /// Panics when commit was not required or was already performed.
    pub fn claim_commit(&mut self) {
        assert!(self.require_commit, "commit not required in context");
        assert!(!self.commit_claimed, "commit already performed in context");
        self.commit_claimed = true;
    }

    /// Claims the push phase.
    ///
    /// # Panics
    ///
    /// Panics when push was not required or was already performed.
    pub fn claim_push(&mut self) {
        assert!(self.require_push, "push not required in context");
        assert!(!self.push_claimed, "push already performed in context");
        self.push_claimed = true;
    }
}
