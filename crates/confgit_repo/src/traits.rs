//! Repository capability trait definition.

use crate::error::RepoResult;
use crate::types::{
    Branches, CommitId, DiffEntry, DirEntry, MergeOutcome, MergeStrategy, TransportOptions,
};

/// The backing version-control repository, as seen by the store.
///
/// A repository holds named branches, an immutable commit graph and one
/// shared working tree. The store drives it through coarse operations and
/// never reaches into its internals.
///
/// # Invariants
///
/// - Exactly one branch is checked out at a time; `checkout` replaces the
///   working tree with that branch's tip tree
/// - `commit` stages the entire working tree and advances the checked-out
///   branch's tip
/// - `fetch` refreshes the remote-tracking view to mirror the remote's
///   current branch set; `push_all` publishes every local branch
/// - `diff` compares the trees of two commits, not their ids
/// - Implementations must be `Send + Sync`; the store serializes mutations
///   through its own lock and performs no concurrent working-tree writes
///
/// # Implementors
///
/// - [`crate::MemoryRepository`] - in-memory, for tests and embedding
pub trait Repository: Send + Sync {
    /// Lists local and remote-tracking branches with their tips.
    fn branches(&self) -> RepoResult<Branches>;

    /// The name of the currently checked-out branch.
    fn current_branch(&self) -> RepoResult<String>;

    /// Creates a branch from `start` (a branch name) or from the current
    /// checkout when `start` is `None`. Does not switch to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch already exists or `start` is unknown.
    fn create_branch(&self, name: &str, start: Option<&str>) -> RepoResult<()>;

    /// Creates a local branch tracking `refs/remotes/<remote>/<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if no such remote-tracking branch exists.
    fn create_tracking_branch(&self, name: &str, remote: &str) -> RepoResult<()>;

    /// Force-deletes a local branch. Deleting an absent branch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RepoError::CannotDeleteCurrentBranch`] when the
    /// branch is checked out; callers switch away and retry.
    fn delete_branch(&self, name: &str) -> RepoResult<()>;

    /// Force-checks-out a branch, replacing the working tree.
    fn checkout(&self, name: &str) -> RepoResult<()>;

    /// Discards uncommitted working-tree modifications.
    fn reset_hard(&self) -> RepoResult<()>;

    /// Removes untracked files and directories from the working tree.
    fn clean(&self) -> RepoResult<()>;

    /// Merges `commit` into the checked-out branch with the given strategy.
    fn merge(&self, commit: &CommitId, strategy: MergeStrategy) -> RepoResult<MergeOutcome>;

    /// Stages the entire working tree and commits it with `message`.
    fn commit(&self, message: &str) -> RepoResult<CommitId>;

    /// Fetches from the named remote, refreshing remote-tracking branches.
    ///
    /// # Errors
    ///
    /// Returns a transport error on timeout or connectivity failure.
    fn fetch(&self, remote: &str, options: &TransportOptions) -> RepoResult<()>;

    /// Pushes all local branches to the named remote.
    ///
    /// # Errors
    ///
    /// Returns a transport error on timeout or connectivity failure.
    fn push_all(&self, remote: &str, options: &TransportOptions) -> RepoResult<()>;

    /// Pushes the deletion of a branch to the named remote and drops the
    /// matching remote-tracking branch.
    ///
    /// # Errors
    ///
    /// Returns a transport error on timeout or connectivity failure.
    fn push_branch_deletion(
        &self,
        remote: &str,
        name: &str,
        options: &TransportOptions,
    ) -> RepoResult<()>;

    /// The content differences between the trees of two commits.
    fn diff(&self, old: &CommitId, new: &CommitId) -> RepoResult<Vec<DiffEntry>>;

    /// Compacts repository storage (`git gc`).
    fn gc(&self) -> RepoResult<()>;

    /// Reads a repository configuration value (for example
    /// `remote.origin.url`).
    fn config_value(&self, key: &str) -> RepoResult<Option<String>>;

    /// Writes a repository configuration value.
    fn set_config_value(&self, key: &str, value: &str) -> RepoResult<()>;

    /// Reads a working-tree file, or `None` when absent.
    fn read_file(&self, path: &str) -> RepoResult<Option<Vec<u8>>>;

    /// Writes a working-tree file, creating parent directories as needed.
    fn write_file(&self, path: &str, contents: &[u8]) -> RepoResult<()>;

    /// Removes a working-tree file or directory tree. Returns whether
    /// anything was removed.
    fn remove_path(&self, path: &str) -> RepoResult<bool>;

    /// Lists the immediate children of a working-tree directory, sorted by
    /// name. An absent directory lists as empty.
    fn list_dir(&self, path: &str) -> RepoResult<Vec<DirEntry>>;

    /// Whether a working-tree path exists (as file or directory).
    fn path_exists(&self, path: &str) -> RepoResult<bool>;

    /// The most recent commit on the checked-out branch that touched
    /// `path`, or `None` when no commit did.
    fn last_commit_touching(&self, path: &str) -> RepoResult<Option<CommitId>>;
}
