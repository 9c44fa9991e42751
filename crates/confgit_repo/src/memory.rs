//! In-memory repository and remote.
//!
//! [`MemoryRepository`] implements the full [`Repository`] contract over
//! plain maps: branches point at commits, commits snapshot a whole working
//! tree. A [`MemoryRemote`] holds the shared state that `fetch` and
//! `push_all` exchange, so several repositories attached to the same
//! remote converge exactly like peers sharing a git server. Failure
//! injection and call counters make transport behavior testable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{RepoError, RepoResult};
use crate::traits::Repository;
use crate::types::{
    Branches, CommitId, DiffEntry, DiffKind, DirEntry, MergeOutcome, MergeStrategy,
    TransportOptions,
};

type Tree = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone)]
struct StoredCommit {
    id: CommitId,
    parents: Vec<CommitId>,
    tree: Tree,
    message: String,
}

#[derive(Debug, Default)]
struct RemoteState {
    branches: BTreeMap<String, CommitId>,
    commits: HashMap<String, StoredCommit>,
}

/// Shared remote state for [`MemoryRepository`] instances.
///
/// Tests seed it with branch content, point one or more repositories at it
/// and drive convergence through fetch/push. Transport failures can be
/// injected per direction.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    fetch_error: Mutex<Option<String>>,
    push_error: Mutex<Option<String>>,
    fetch_count: AtomicU64,
    push_count: AtomicU64,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a commit with the given full tree to a remote branch,
    /// creating the branch when absent. Returns the new tip.
    pub fn seed_branch(&self, name: &str, files: &[(&str, &[u8])], message: &str) -> CommitId {
        let mut state = self.state.lock();
        let parents = state.branches.get(name).cloned().into_iter().collect();
        let tree = files
            .iter()
            .map(|(path, contents)| ((*path).to_string(), contents.to_vec()))
            .collect();
        let commit = StoredCommit {
            id: CommitId::generate(),
            parents,
            tree,
            message: message.to_string(),
        };
        let id = commit.id.clone();
        state.commits.insert(id.as_str().to_string(), commit);
        state.branches.insert(name.to_string(), id.clone());
        id
    }

    /// Appends a commit that changes nothing: same tree, new id. Used to
    /// exercise no-op change detection.
    pub fn seed_empty_commit(&self, name: &str, message: &str) -> CommitId {
        let mut state = self.state.lock();
        let tip = state
            .branches
            .get(name)
            .cloned()
            .expect("seed_empty_commit on missing branch");
        let tree = state.commits[tip.as_str()].tree.clone();
        let commit = StoredCommit {
            id: CommitId::generate(),
            parents: vec![tip],
            tree,
            message: message.to_string(),
        };
        let id = commit.id.clone();
        state.commits.insert(id.as_str().to_string(), commit);
        state.branches.insert(name.to_string(), id.clone());
        id
    }

    /// Removes a branch from the remote.
    pub fn delete_branch(&self, name: &str) {
        self.state.lock().branches.remove(name);
    }

    /// The tip of a remote branch, when present.
    pub fn tip(&self, name: &str) -> Option<CommitId> {
        self.state.lock().branches.get(name).cloned()
    }

    /// Sorted remote branch names.
    pub fn branch_names(&self) -> Vec<String> {
        self.state.lock().branches.keys().cloned().collect()
    }

    /// The commit message of a remote commit, when present.
    pub fn message_of(&self, id: &CommitId) -> Option<String> {
        self.state
            .lock()
            .commits
            .get(id.as_str())
            .map(|c| c.message.clone())
    }

    /// Injects a fetch failure; `None` restores normal operation.
    pub fn set_fetch_error(&self, message: Option<&str>) {
        *self.fetch_error.lock() = message.map(str::to_string);
    }

    /// Injects a push failure; `None` restores normal operation.
    pub fn set_push_error(&self, message: Option<&str>) {
        *self.push_error.lock() = message.map(str::to_string);
    }

    /// Number of successful fetches served.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of successful pushes received.
    pub fn push_count(&self) -> u64 {
        self.push_count.load(Ordering::SeqCst)
    }

    fn serve_fetch(&self) -> RepoResult<(BTreeMap<String, CommitId>, Vec<StoredCommit>)> {
        if let Some(message) = self.fetch_error.lock().clone() {
            return Err(RepoError::transport(message));
        }
        let state = self.state.lock();
        let commits = state.commits.values().cloned().collect();
        let branches = state.branches.clone();
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok((branches, commits))
    }

    fn receive_push(
        &self,
        branches: &BTreeMap<String, CommitId>,
        commits: Vec<StoredCommit>,
    ) -> RepoResult<()> {
        if let Some(message) = self.push_error.lock().clone() {
            return Err(RepoError::transport(message));
        }
        let mut state = self.state.lock();
        for commit in commits {
            state
                .commits
                .entry(commit.id.as_str().to_string())
                .or_insert(commit);
        }
        for (name, tip) in branches {
            state.branches.insert(name.clone(), tip.clone());
        }
        self.push_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn receive_deletion(&self, name: &str) -> RepoResult<()> {
        if let Some(message) = self.push_error.lock().clone() {
            return Err(RepoError::transport(message));
        }
        self.state.lock().branches.remove(name);
        Ok(())
    }
}

#[derive(Debug)]
struct RepoState {
    branches: BTreeMap<String, CommitId>,
    tracking: BTreeMap<String, CommitId>,
    commits: HashMap<String, StoredCommit>,
    head: String,
    worktree: Tree,
    config: BTreeMap<String, String>,
}

/// An in-memory [`Repository`].
#[derive(Debug)]
pub struct MemoryRepository {
    state: Mutex<RepoState>,
    remote: Mutex<Option<Arc<MemoryRemote>>>,
    gc_count: AtomicU64,
}

impl MemoryRepository {
    /// Creates a repository with a single empty commit on `default_branch`,
    /// checked out.
    pub fn init(default_branch: &str) -> Self {
        let root = StoredCommit {
            id: CommitId::generate(),
            parents: Vec::new(),
            tree: Tree::new(),
            message: "init".to_string(),
        };
        let mut branches = BTreeMap::new();
        branches.insert(default_branch.to_string(), root.id.clone());
        let mut commits = HashMap::new();
        commits.insert(root.id.as_str().to_string(), root);
        Self {
            state: Mutex::new(RepoState {
                branches,
                tracking: BTreeMap::new(),
                commits,
                head: default_branch.to_string(),
                worktree: Tree::new(),
                config: BTreeMap::new(),
            }),
            remote: Mutex::new(None),
            gc_count: AtomicU64::new(0),
        }
    }

    /// Attaches a shared remote under `name` and records its URL in the
    /// repository configuration, which is what enables pull and push.
    pub fn attach_remote(&self, name: &str, url: &str, remote: Arc<MemoryRemote>) {
        *self.remote.lock() = Some(remote);
        let mut state = self.state.lock();
        state.config.insert(format!("remote.{name}.url"), url.to_string());
    }

    /// The tip of a local branch, when present.
    pub fn branch_tip(&self, name: &str) -> Option<CommitId> {
        self.state.lock().branches.get(name).cloned()
    }

    /// The commit message of a local commit, when present.
    pub fn message_of(&self, id: &CommitId) -> Option<String> {
        self.state
            .lock()
            .commits
            .get(id.as_str())
            .map(|c| c.message.clone())
    }

    /// Number of compaction runs performed.
    pub fn gc_count(&self) -> u64 {
        self.gc_count.load(Ordering::SeqCst)
    }

    fn is_ancestor(commits: &HashMap<String, StoredCommit>, older: &CommitId, tip: &CommitId) -> bool {
        let mut queue = vec![tip.clone()];
        while let Some(id) = queue.pop() {
            if &id == older {
                return true;
            }
            if let Some(commit) = commits.get(id.as_str()) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    fn subtree<'a>(tree: &'a Tree, path: &str) -> BTreeMap<&'a str, &'a Vec<u8>> {
        let prefix = format!("{path}/");
        tree.iter()
            .filter(|(key, _)| key.as_str() == path || key.starts_with(&prefix))
            .map(|(key, value)| (key.as_str(), value))
            .collect()
    }
}

impl Repository for MemoryRepository {
    fn branches(&self) -> RepoResult<Branches> {
        let state = self.state.lock();
        Ok(Branches {
            local: state.branches.clone(),
            remote: state.tracking.clone(),
        })
    }

    fn current_branch(&self) -> RepoResult<String> {
        Ok(self.state.lock().head.clone())
    }

    fn create_branch(&self, name: &str, start: Option<&str>) -> RepoResult<()> {
        let mut state = self.state.lock();
        if state.branches.contains_key(name) {
            return Err(RepoError::branch_exists(name));
        }
        let tip = match start {
            Some(start) => state
                .branches
                .get(start)
                .cloned()
                .ok_or_else(|| RepoError::branch_not_found(start))?,
            None => state.branches[&state.head].clone(),
        };
        state.branches.insert(name.to_string(), tip);
        Ok(())
    }

    fn create_tracking_branch(&self, name: &str, remote: &str) -> RepoResult<()> {
        let mut state = self.state.lock();
        let tip = state
            .tracking
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::branch_not_found(format!("{remote}/{name}")))?;
        state.branches.insert(name.to_string(), tip);
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> RepoResult<()> {
        let mut state = self.state.lock();
        if state.head == name {
            return Err(RepoError::CannotDeleteCurrentBranch {
                name: name.to_string(),
            });
        }
        state.branches.remove(name);
        Ok(())
    }

    fn checkout(&self, name: &str) -> RepoResult<()> {
        let mut state = self.state.lock();
        let tip = state
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::branch_not_found(name))?;
        state.head = name.to_string();
        state.worktree = state.commits[tip.as_str()].tree.clone();
        Ok(())
    }

    fn reset_hard(&self) -> RepoResult<()> {
        let mut state = self.state.lock();
        let tip = state.branches[&state.head].clone();
        state.worktree = state.commits[tip.as_str()].tree.clone();
        Ok(())
    }

    fn clean(&self) -> RepoResult<()> {
        self.reset_hard()
    }

    fn merge(&self, commit: &CommitId, strategy: MergeStrategy) -> RepoResult<MergeOutcome> {
        let mut state = self.state.lock();
        if !state.commits.contains_key(commit.as_str()) {
            return Err(RepoError::unknown_commit(commit.as_str()));
        }
        let head = state.head.clone();
        let tip = state.branches[&head].clone();
        if tip == *commit || Self::is_ancestor(&state.commits, commit, &tip) {
            return Ok(MergeOutcome::AlreadyUpToDate);
        }
        if Self::is_ancestor(&state.commits, &tip, commit) {
            let tree = state.commits[commit.as_str()].tree.clone();
            state.branches.insert(head, commit.clone());
            state.worktree = tree;
            return Ok(MergeOutcome::FastForward);
        }
        let tree = match strategy {
            MergeStrategy::Theirs => state.commits[commit.as_str()].tree.clone(),
            MergeStrategy::Ours => state.commits[tip.as_str()].tree.clone(),
        };
        let merged = StoredCommit {
            id: CommitId::generate(),
            parents: vec![tip, commit.clone()],
            tree: tree.clone(),
            message: format!("Merge commit {}", commit.short()),
        };
        let id = merged.id.clone();
        state.commits.insert(id.as_str().to_string(), merged);
        state.branches.insert(head, id);
        state.worktree = tree;
        Ok(MergeOutcome::Merged)
    }

    fn commit(&self, message: &str) -> RepoResult<CommitId> {
        let mut state = self.state.lock();
        let head = state.head.clone();
        let parent = state.branches[&head].clone();
        let commit = StoredCommit {
            id: CommitId::generate(),
            parents: vec![parent],
            tree: state.worktree.clone(),
            message: message.to_string(),
        };
        let id = commit.id.clone();
        state.commits.insert(id.as_str().to_string(), commit);
        state.branches.insert(head, id.clone());
        Ok(id)
    }

    fn fetch(&self, remote: &str, _options: &TransportOptions) -> RepoResult<()> {
        let shared = self
            .remote
            .lock()
            .clone()
            .ok_or_else(|| RepoError::NoRemote {
                name: remote.to_string(),
            })?;
        let (branches, commits) = shared.serve_fetch()?;
        let mut state = self.state.lock();
        for commit in commits {
            state
                .commits
                .entry(commit.id.as_str().to_string())
                .or_insert(commit);
        }
        state.tracking = branches;
        Ok(())
    }

    fn push_all(&self, remote: &str, _options: &TransportOptions) -> RepoResult<()> {
        let shared = self
            .remote
            .lock()
            .clone()
            .ok_or_else(|| RepoError::NoRemote {
                name: remote.to_string(),
            })?;
        let (branches, commits) = {
            let state = self.state.lock();
            (
                state.branches.clone(),
                state.commits.values().cloned().collect::<Vec<_>>(),
            )
        };
        shared.receive_push(&branches, commits)?;
        // Pushed refs become the new remote-tracking view.
        let mut state = self.state.lock();
        for (name, tip) in &branches {
            state.tracking.insert(name.clone(), tip.clone());
        }
        Ok(())
    }

    fn push_branch_deletion(
        &self,
        remote: &str,
        name: &str,
        _options: &TransportOptions,
    ) -> RepoResult<()> {
        let shared = self
            .remote
            .lock()
            .clone()
            .ok_or_else(|| RepoError::NoRemote {
                name: remote.to_string(),
            })?;
        shared.receive_deletion(name)?;
        self.state.lock().tracking.remove(name);
        Ok(())
    }

    fn diff(&self, old: &CommitId, new: &CommitId) -> RepoResult<Vec<DiffEntry>> {
        let state = self.state.lock();
        let old_tree = &state
            .commits
            .get(old.as_str())
            .ok_or_else(|| RepoError::unknown_commit(old.as_str()))?
            .tree;
        let new_tree = &state
            .commits
            .get(new.as_str())
            .ok_or_else(|| RepoError::unknown_commit(new.as_str()))?
            .tree;
        let mut entries = Vec::new();
        for (path, contents) in old_tree {
            match new_tree.get(path) {
                None => entries.push(DiffEntry {
                    path: path.clone(),
                    kind: DiffKind::Deleted,
                }),
                Some(new_contents) if new_contents != contents => entries.push(DiffEntry {
                    path: path.clone(),
                    kind: DiffKind::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in new_tree.keys() {
            if !old_tree.contains_key(path) {
                entries.push(DiffEntry {
                    path: path.clone(),
                    kind: DiffKind::Added,
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn gc(&self) -> RepoResult<()> {
        self.gc_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn config_value(&self, key: &str) -> RepoResult<Option<String>> {
        Ok(self.state.lock().config.get(key).cloned())
    }

    fn set_config_value(&self, key: &str, value: &str) -> RepoResult<()> {
        self.state
            .lock()
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read_file(&self, path: &str) -> RepoResult<Option<Vec<u8>>> {
        Ok(self.state.lock().worktree.get(path).cloned())
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> RepoResult<()> {
        if path.is_empty() {
            return Err(RepoError::invalid_operation("empty path"));
        }
        self.state
            .lock()
            .worktree
            .insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn remove_path(&self, path: &str) -> RepoResult<bool> {
        let mut state = self.state.lock();
        let prefix = format!("{path}/");
        let doomed: Vec<String> = state
            .worktree
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &doomed {
            state.worktree.remove(key);
        }
        Ok(!doomed.is_empty())
    }

    fn list_dir(&self, path: &str) -> RepoResult<Vec<DirEntry>> {
        let state = self.state.lock();
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        for key in state.worktree.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                Some((name, _)) => {
                    children.insert(name.to_string(), true);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(false);
                }
            }
        }
        Ok(children
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn path_exists(&self, path: &str) -> RepoResult<bool> {
        let state = self.state.lock();
        let prefix = format!("{path}/");
        Ok(state
            .worktree
            .keys()
            .any(|key| key.as_str() == path || key.starts_with(&prefix)))
    }

    fn last_commit_touching(&self, path: &str) -> RepoResult<Option<CommitId>> {
        let state = self.state.lock();
        let mut cursor = Some(state.branches[&state.head].clone());
        while let Some(id) = cursor {
            let commit = state
                .commits
                .get(id.as_str())
                .ok_or_else(|| RepoError::unknown_commit(id.as_str()))?;
            let here = Self::subtree(&commit.tree, path);
            let before = match commit.parents.first() {
                Some(parent) => {
                    let parent_commit = state
                        .commits
                        .get(parent.as_str())
                        .ok_or_else(|| RepoError::unknown_commit(parent.as_str()))?;
                    Self::subtree(&parent_commit.tree, path)
                }
                None => BTreeMap::new(),
            };
            if here != before {
                return Ok(Some(id));
            }
            cursor = commit.parents.first().cloned();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> MemoryRepository {
        MemoryRepository::init("master")
    }

    #[test]
    fn init_checks_out_default_branch() {
        let repo = repo();
        assert_eq!(repo.current_branch().unwrap(), "master");
        assert!(repo.branch_tip("master").is_some());
    }

    #[test]
    fn commit_advances_branch_tip() {
        let repo = repo();
        let before = repo.branch_tip("master").unwrap();
        repo.write_file("a.txt", b"one").unwrap();
        let id = repo.commit("add a").unwrap();
        assert_ne!(before, id);
        assert_eq!(repo.branch_tip("master").unwrap(), id);
        assert_eq!(repo.message_of(&id).unwrap(), "add a");
    }

    #[test]
    fn checkout_replaces_worktree() {
        let repo = repo();
        repo.write_file("a.txt", b"one").unwrap();
        repo.commit("add a").unwrap();
        repo.create_branch("1.0", None).unwrap();
        repo.checkout("1.0").unwrap();
        repo.write_file("b.txt", b"two").unwrap();
        repo.commit("add b").unwrap();
        repo.checkout("master").unwrap();
        assert!(repo.read_file("b.txt").unwrap().is_none());
        assert_eq!(repo.read_file("a.txt").unwrap().unwrap(), b"one");
    }

    #[test]
    fn checkout_missing_branch() {
        let repo = repo();
        assert!(matches!(
            repo.checkout("nope"),
            Err(RepoError::BranchNotFound { .. })
        ));
    }

    #[test]
    fn reset_hard_discards_uncommitted_changes() {
        let repo = repo();
        repo.write_file("a.txt", b"one").unwrap();
        repo.commit("add a").unwrap();
        repo.write_file("a.txt", b"dirty").unwrap();
        repo.write_file("untracked.txt", b"x").unwrap();
        repo.reset_hard().unwrap();
        assert_eq!(repo.read_file("a.txt").unwrap().unwrap(), b"one");
        assert!(repo.read_file("untracked.txt").unwrap().is_none());
    }

    #[test]
    fn delete_current_branch_is_refused() {
        let repo = repo();
        repo.create_branch("1.0", None).unwrap();
        repo.checkout("1.0").unwrap();
        assert!(matches!(
            repo.delete_branch("1.0"),
            Err(RepoError::CannotDeleteCurrentBranch { .. })
        ));
        repo.checkout("master").unwrap();
        repo.delete_branch("1.0").unwrap();
        assert!(repo.branch_tip("1.0").is_none());
    }

    #[test]
    fn delete_missing_branch_is_noop() {
        let repo = repo();
        repo.delete_branch("ghost").unwrap();
    }

    #[test]
    fn merge_theirs_takes_remote_tree() {
        let repo = repo();
        repo.write_file("shared.txt", b"local").unwrap();
        repo.commit("local change").unwrap();

        // Build a divergent commit directly in the commit graph.
        let remote = Arc::new(MemoryRemote::new());
        repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        let theirs = remote.seed_branch("master", &[("shared.txt", b"remote")], "remote change");
        repo.fetch("origin", &TransportOptions::default()).unwrap();

        let outcome = repo.merge(&theirs, MergeStrategy::Theirs).unwrap();
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(repo.read_file("shared.txt").unwrap().unwrap(), b"remote");
    }

    #[test]
    fn merge_already_up_to_date() {
        let repo = repo();
        let tip = repo.branch_tip("master").unwrap();
        assert_eq!(
            repo.merge(&tip, MergeStrategy::Theirs).unwrap(),
            MergeOutcome::AlreadyUpToDate
        );
    }

    #[test]
    fn fetch_and_tracking_branch_roundtrip() {
        let repo = repo();
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_branch("1.0", &[("profiles/p.profile/f", b"x")], "seed");
        repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        repo.fetch("origin", &TransportOptions::default()).unwrap();

        let branches = repo.branches().unwrap();
        assert!(branches.remote.contains_key("1.0"));
        assert!(!branches.local.contains_key("1.0"));

        repo.create_tracking_branch("1.0", "origin").unwrap();
        repo.checkout("1.0").unwrap();
        assert_eq!(
            repo.read_file("profiles/p.profile/f").unwrap().unwrap(),
            b"x"
        );
    }

    #[test]
    fn fetch_prunes_stale_tracking_branches() {
        let repo = repo();
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_branch("1.0", &[], "seed");
        repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        repo.fetch("origin", &TransportOptions::default()).unwrap();
        assert!(repo.branches().unwrap().remote.contains_key("1.0"));

        remote.delete_branch("1.0");
        repo.fetch("origin", &TransportOptions::default()).unwrap();
        assert!(!repo.branches().unwrap().remote.contains_key("1.0"));
    }

    #[test]
    fn fetch_failure_injection() {
        let repo = repo();
        let remote = Arc::new(MemoryRemote::new());
        repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        remote.set_fetch_error(Some("connection refused"));
        let err = repo.fetch("origin", &TransportOptions::default()).unwrap_err();
        assert!(matches!(err, RepoError::Transport { .. }));
        remote.set_fetch_error(None);
        repo.fetch("origin", &TransportOptions::default()).unwrap();
        assert_eq!(remote.fetch_count(), 1);
    }

    #[test]
    fn push_publishes_local_branches() {
        let repo = repo();
        let remote = Arc::new(MemoryRemote::new());
        repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        repo.write_file("a.txt", b"one").unwrap();
        let tip = repo.commit("add a").unwrap();
        repo.push_all("origin", &TransportOptions::default()).unwrap();
        assert_eq!(remote.tip("master").unwrap(), tip);
        assert_eq!(remote.message_of(&tip).unwrap(), "add a");
    }

    #[test]
    fn diff_reports_adds_modifies_deletes() {
        let repo = repo();
        repo.write_file("keep.txt", b"same").unwrap();
        repo.write_file("change.txt", b"before").unwrap();
        repo.write_file("drop.txt", b"bye").unwrap();
        let old = repo.commit("first").unwrap();
        repo.write_file("change.txt", b"after").unwrap();
        repo.write_file("new.txt", b"hi").unwrap();
        repo.remove_path("drop.txt").unwrap();
        let new = repo.commit("second").unwrap();

        let entries = repo.diff(&old, &new).unwrap();
        let kinds: Vec<(&str, DiffKind)> = entries
            .iter()
            .map(|e| (e.path.as_str(), e.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("change.txt", DiffKind::Modified),
                ("drop.txt", DiffKind::Deleted),
                ("new.txt", DiffKind::Added),
            ]
        );
    }

    #[test]
    fn diff_of_identical_trees_is_empty() {
        let repo = repo();
        repo.write_file("a.txt", b"x").unwrap();
        let first = repo.commit("first").unwrap();
        let second = repo.commit("empty").unwrap();
        assert!(repo.diff(&first, &second).unwrap().is_empty());
    }

    #[test]
    fn list_dir_and_exists() {
        let repo = repo();
        repo.write_file("profiles/default.profile/meta", b"").unwrap();
        repo.write_file("profiles/net/dns.profile/meta", b"").unwrap();
        repo.write_file("top.txt", b"").unwrap();

        let root = repo.list_dir("").unwrap();
        let names: Vec<&str> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["profiles", "top.txt"]);
        assert!(root[0].is_dir);
        assert!(!root[1].is_dir);

        let profiles = repo.list_dir("profiles").unwrap();
        let names: Vec<&str> = profiles.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["default.profile", "net"]);

        assert!(repo.path_exists("profiles/net").unwrap());
        assert!(!repo.path_exists("profiles/web").unwrap());
    }

    #[test]
    fn remove_path_recurses() {
        let repo = repo();
        repo.write_file("dir/a", b"1").unwrap();
        repo.write_file("dir/sub/b", b"2").unwrap();
        repo.write_file("other", b"3").unwrap();
        assert!(repo.remove_path("dir").unwrap());
        assert!(!repo.path_exists("dir").unwrap());
        assert!(repo.path_exists("other").unwrap());
        assert!(!repo.remove_path("dir").unwrap());
    }

    #[test]
    fn last_commit_touching_tracks_path_changes() {
        let repo = repo();
        repo.write_file("profiles/a.profile/f", b"1").unwrap();
        let first = repo.commit("touch a").unwrap();
        repo.write_file("profiles/b.profile/f", b"2").unwrap();
        repo.commit("touch b").unwrap();

        assert_eq!(
            repo.last_commit_touching("profiles/a.profile").unwrap(),
            Some(first)
        );
        assert_eq!(repo.last_commit_touching("profiles/none").unwrap(), None);
    }
}
