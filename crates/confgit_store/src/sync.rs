//! The repository synchronization engine.
//!
//! Every top-level operation runs through [`SyncEngine::execute`] with a
//! [`GitContext`] describing which phases it needs: pull, then the
//! operation body, then commit, then push. A successful pull or commit
//! that changed stored content invalidates the whole version cache and
//! notifies listeners exactly once.
//!
//! Pull never fails the operation: a fetch problem is logged once per
//! distinct message and treated as "no change this cycle" — the next
//! scheduled cycle retries. Push failures are likewise swallowed; an
//! unpushed commit is published by a later cycle.

use std::sync::Arc;

use confgit_repo::{MergeStrategy, RepoError, Repository, TransportOptions};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{resolve_credentials, TokenSource};
use crate::cache::VersionCache;
use crate::config::StoreConfig;
use crate::context::GitContext;
use crate::error::StoreResult;
use crate::listener::ListenerRegistry;
use crate::lock::StoreLock;

/// Runs the pull/commit/push protocol around store operations.
pub struct SyncEngine {
    repo: Arc<dyn Repository>,
    lock: Arc<StoreLock>,
    cache: Arc<VersionCache>,
    listeners: Arc<ListenerRegistry>,
    config: StoreConfig,
    tokens: Option<Arc<dyn TokenSource>>,
    remote_name: Mutex<String>,
    last_fetch_warning: Mutex<Option<String>>,
    commits_until_gc: Mutex<i64>,
}

impl SyncEngine {
    /// Creates an engine over the shared repository, lock, cache and
    /// listener registry.
    pub fn new(
        repo: Arc<dyn Repository>,
        lock: Arc<StoreLock>,
        cache: Arc<VersionCache>,
        listeners: Arc<ListenerRegistry>,
        config: StoreConfig,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        let remote_name = config.remote_name.clone();
        let commits_until_gc = i64::from(config.gc_commit_limit);
        Self {
            repo,
            lock,
            cache,
            listeners,
            config,
            tokens,
            remote_name: Mutex::new(remote_name),
            last_fetch_warning: Mutex::new(None),
            commits_until_gc: Mutex::new(commits_until_gc),
        }
    }

    /// The remote used for fetch and push.
    pub fn remote_name(&self) -> String {
        self.remote_name.lock().clone()
    }

    /// Replaces the remote used for fetch and push.
    pub fn set_remote_name(&self, name: impl Into<String>) {
        *self.remote_name.lock() = name.into();
    }

    /// Executes one top-level operation under its context.
    ///
    /// The caller must already hold the lock level the context implies:
    /// write when a pull or commit is required, read otherwise.
    pub fn execute<T, F>(&self, context: &mut GitContext, operation: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn Repository, &mut GitContext) -> StoreResult<T>,
    {
        if context.requires_write() {
            self.lock.assert_write_held();
        } else {
            self.lock.assert_read_held();
        }

        let mut changed = false;
        if context.is_pull_required() {
            changed = self.pull_phase(context);
        }

        let result = operation(self.repo.as_ref(), context)?;

        if context.is_commit_required() {
            self.commit_phase(context)?;
            changed = true;
        }
        if context.is_push_required() {
            self.push_phase(context);
        }

        if changed {
            self.fire_change_notification();
        }
        Ok(result)
    }

    /// Invalidate everything and tell listeners stored content changed.
    pub(crate) fn fire_change_notification(&self) {
        self.cache.invalidate_all();
        self.listeners.notify_store_changed();
    }

    /// Runs the pull phase, claiming it on the context. Returns whether
    /// stored content changed; failures are logged and count as "no
    /// change".
    pub(crate) fn pull_phase(&self, context: &mut GitContext) -> bool {
        self.lock.assert_write_held();
        context.claim_pull();
        match self.do_pull(context.delete_branches()) {
            Ok(changed) => changed,
            Err(err) => {
                warn!("pull failed: {err}. This failure is ignored.");
                false
            }
        }
    }

    /// Runs the push phase, claiming it on the context. Failures are
    /// logged and swallowed; the next cycle retries.
    pub(crate) fn push_phase(&self, context: &mut GitContext) {
        self.lock.assert_read_held();
        context.claim_push();
        let remote = self.remote_name();
        let url = match self.repo.config_value(&self.config.remote_url_key()) {
            Ok(url) => url,
            Err(err) => {
                warn!("push skipped, cannot read remote configuration: {err}");
                return;
            }
        };
        match url.filter(|url| !url.trim().is_empty()) {
            None => {
                info!("no remote repository defined, not doing a push");
            }
            Some(_) => {
                if let Err(err) = self.repo.push_all(&remote, &self.transport_options()) {
                    warn!("failed to push to {remote}: {err}. This failure is ignored.");
                }
            }
        }
    }

    fn commit_phase(&self, context: &mut GitContext) -> StoreResult<()> {
        self.lock.assert_write_held();
        context.claim_commit();
        let message = context.message();
        assert!(!message.is_empty(), "empty commit message");
        self.repo.commit(message)?;

        let mut remaining = self.commits_until_gc.lock();
        *remaining -= 1;
        if *remaining < 0 {
            *remaining = i64::from(self.config.gc_commit_limit);
            debug!(
                "performing repository compaction after {} commits",
                self.config.gc_commit_limit
            );
            self.repo.gc()?;
        }
        Ok(())
    }

    fn do_pull(&self, delete_branches: bool) -> StoreResult<bool> {
        let remote = self.remote_name();
        let url = self.repo.config_value(&self.config.remote_url_key())?;
        let Some(url) = url.filter(|url| !url.trim().is_empty()) else {
            info!("no remote repository defined, not doing a pull");
            return Ok(false);
        };
        debug!("fetching from remote {remote} at {url}");

        // Local uncommitted mutations never survive a pull.
        self.repo.reset_hard()?;

        if let Err(err) = self.repo.fetch(&remote, &self.transport_options()) {
            let message = err.to_string();
            let mut last = self.last_fetch_warning.lock();
            if last.as_deref() != Some(message.as_str()) {
                warn!("fetch failed: {message}. The failure is ignored.");
                *last = Some(message);
            }
            return Ok(false);
        }
        *self.last_fetch_warning.lock() = None;

        let branches = self.repo.branches()?;
        let default_branch = self.config.default_branch.as_str();
        let mut changed = false;

        for name in branches.all_names() {
            let local = branches.local.get(&name);
            let remote_tip = branches.remote.get(&name);
            match (local, remote_tip) {
                (Some(_), None) => {
                    // Only delete when the remote reported any branches at
                    // all, deletions were requested, and this is not the
                    // protected default branch.
                    if branches.remote.is_empty()
                        || !delete_branches
                        || name == default_branch
                    {
                        continue;
                    }
                    self.delete_local_branch(&name)?;
                    self.cache.remove(&name);
                    changed = true;
                }
                (None, Some(_)) => {
                    self.cache.add_known(&name);
                    self.repo.create_tracking_branch(&name, &remote)?;
                    self.repo.checkout(&name)?;
                    changed = true;
                }
                (Some(local), Some(remote_tip)) if local != remote_tip => {
                    self.repo.clean()?;
                    self.repo.checkout(&name)?;
                    let outcome = self.repo.merge(remote_tip, MergeStrategy::Theirs)?;
                    // A differing commit id alone is not a change; no-op
                    // commits must not invalidate caches downstream.
                    if !outcome.is_up_to_date()
                        && !self.repo.diff(local, remote_tip)?.is_empty()
                    {
                        changed = true;
                    }
                }
                _ => {}
            }
        }

        if changed {
            info!("stored content changed after pull");
        } else {
            debug!("no change after pull");
        }
        Ok(changed)
    }

    /// Publishes a branch deletion to the remote so peers do not serve
    /// the branch back on the next pull. Failures are logged and
    /// swallowed like any push failure.
    pub(crate) fn propagate_branch_deletion(&self, name: &str) {
        let url = match self.repo.config_value(&self.config.remote_url_key()) {
            Ok(url) => url,
            Err(err) => {
                warn!("cannot read remote configuration: {err}");
                return;
            }
        };
        if url.filter(|url| !url.trim().is_empty()).is_none() {
            return;
        }
        let remote = self.remote_name();
        if let Err(err) =
            self.repo
                .push_branch_deletion(&remote, name, &self.transport_options())
        {
            warn!("failed to push deletion of {name}: {err}. This failure is ignored.");
        }
    }

    fn delete_local_branch(&self, name: &str) -> StoreResult<()> {
        match self.repo.delete_branch(name) {
            Err(RepoError::CannotDeleteCurrentBranch { .. }) => {
                self.repo.checkout(&self.config.default_branch)?;
                self.repo.delete_branch(name)?;
                Ok(())
            }
            other => Ok(other?),
        }
    }

    fn transport_options(&self) -> TransportOptions {
        TransportOptions::new(
            self.config.remote_timeout,
            resolve_credentials(&self.config, self.tokens.as_deref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confgit_repo::{MemoryRemote, MemoryRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::listener::StoreListener;

    struct Harness {
        repo: Arc<MemoryRepository>,
        remote: Arc<MemoryRemote>,
        lock: Arc<StoreLock>,
        cache: Arc<VersionCache>,
        changes: Arc<ChangeCount>,
        engine: SyncEngine,
    }

    #[derive(Default)]
    struct ChangeCount(AtomicUsize);

    impl StoreListener for ChangeCount {
        fn store_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ChangeCount {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn harness(with_remote: bool) -> Harness {
        let repo = Arc::new(MemoryRepository::init("master"));
        let remote = Arc::new(MemoryRemote::new());
        if with_remote {
            remote.seed_branch("master", &[], "init remote");
            repo.attach_remote("origin", "memory://remote", Arc::clone(&remote));
        }
        let lock = Arc::new(StoreLock::new(Duration::from_secs(10), true));
        let cache = Arc::new(VersionCache::new("master"));
        let listeners = Arc::new(ListenerRegistry::new());
        let changes = Arc::new(ChangeCount::default());
        listeners.add(changes.clone());
        let engine = SyncEngine::new(
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::clone(&lock),
            Arc::clone(&cache),
            listeners,
            StoreConfig::new().with_gc_commit_limit(3),
            None,
        );
        Harness {
            repo,
            remote,
            lock,
            cache,
            changes,
            engine,
        }
    }

    #[test]
    fn pull_without_remote_url_is_a_skip() {
        let h = harness(false);
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull();
        let changed = h.engine.pull_phase(&mut context);
        assert!(!changed);
        assert_eq!(h.changes.count(), 0);
    }

    #[test]
    fn pull_creates_tracking_branches_and_reports_change() {
        let h = harness(true);
        h.remote
            .seed_branch("1.0", &[("profiles/a.profile/profile.attributes", b"")], "seed");
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull();
        assert!(h.engine.pull_phase(&mut context));
        assert!(h.repo.branch_tip("1.0").is_some());
        assert!(h.cache.contains("1.0"));
    }

    #[test]
    fn pull_merges_remote_changes_with_theirs() {
        let h = harness(true);
        let _write = h.lock.acquire_write();

        // Local commit on master diverges from the remote's master.
        h.repo.write_file("shared.txt", b"local").unwrap();
        h.repo.commit("local edit").unwrap();
        h.remote
            .seed_branch("master", &[("shared.txt", b"remote")], "remote edit");

        let mut context = GitContext::new().require_pull();
        assert!(h.engine.pull_phase(&mut context));
        assert_eq!(h.repo.read_file("shared.txt").unwrap().unwrap(), b"remote");
    }

    #[test]
    fn noop_remote_commit_is_not_a_change() {
        let h = harness(true);
        {
            let _write = h.lock.acquire_write();
            let mut context = GitContext::new().require_pull();
            h.engine.pull_phase(&mut context);
        }

        // Same tree, new commit id.
        h.remote.seed_empty_commit("master", "empty republish");
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull();
        assert!(!h.engine.pull_phase(&mut context));
    }

    #[test]
    fn routine_pull_never_deletes_local_branches() {
        let h = harness(true);
        h.remote.seed_branch("1.0", &[], "seed");
        {
            let _write = h.lock.acquire_write();
            let mut context = GitContext::new().require_pull();
            h.engine.pull_phase(&mut context);
        }
        assert!(h.repo.branch_tip("1.0").is_some());

        h.remote.delete_branch("1.0");
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull();
        assert!(!h.engine.pull_phase(&mut context));
        assert!(h.repo.branch_tip("1.0").is_some());
    }

    #[test]
    fn deletion_enabled_pull_removes_stale_branches_but_not_default() {
        let h = harness(true);
        h.remote.seed_branch("1.0", &[], "seed");
        {
            let _write = h.lock.acquire_write();
            let mut context = GitContext::new().require_pull();
            h.engine.pull_phase(&mut context);
        }
        h.remote.delete_branch("1.0");

        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull_with_deletions();
        assert!(h.engine.pull_phase(&mut context));
        assert!(h.repo.branch_tip("1.0").is_none());
        assert!(!h.cache.contains("1.0"));
        // The protected default branch survives even though every other
        // branch was reconciled.
        assert!(h.repo.branch_tip("master").is_some());
    }

    #[test]
    fn deletion_switches_off_the_checked_out_branch_first() {
        let h = harness(true);
        h.remote.seed_branch("1.0", &[], "seed");
        {
            let _write = h.lock.acquire_write();
            let mut context = GitContext::new().require_pull();
            h.engine.pull_phase(&mut context);
        }
        h.repo.checkout("1.0").unwrap();
        h.remote.delete_branch("1.0");

        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull_with_deletions();
        assert!(h.engine.pull_phase(&mut context));
        assert!(h.repo.branch_tip("1.0").is_none());
        assert_eq!(h.repo.current_branch().unwrap(), "master");
    }

    #[test]
    fn fetch_failure_is_swallowed_and_usable_afterwards() {
        let h = harness(true);
        h.remote.set_fetch_error(Some("connection refused"));
        {
            let _write = h.lock.acquire_write();
            let mut context = GitContext::new().require_pull();
            assert!(!h.engine.pull_phase(&mut context));
            // Same failure again: deduplicated, still no change.
            let mut context = GitContext::new().require_pull();
            assert!(!h.engine.pull_phase(&mut context));
        }

        h.remote.set_fetch_error(None);
        h.remote.seed_branch("1.0", &[], "seed");
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_pull();
        assert!(h.engine.pull_phase(&mut context));
    }

    #[test]
    fn execute_commits_and_notifies_once() {
        let h = harness(true);
        let _write = h.lock.acquire_write();
        h.cache.insert(crate::types::Version::new(
            "1.0",
            Default::default(),
        ));

        let mut context = GitContext::new().require_commit().require_push();
        h.engine
            .execute(&mut context, |repo, context| {
                repo.write_file("profiles/a.profile/profile.attributes", b"")?;
                context.commit_message("Create profile: a");
                Ok(())
            })
            .unwrap();

        assert_eq!(h.changes.count(), 1);
        // The commit invalidated the resolved cache.
        assert!(h.cache.cached("1.0").is_none());
        assert_eq!(h.remote.push_count(), 1);
        let tip = h.repo.branch_tip("master").unwrap();
        assert_eq!(h.repo.message_of(&tip).unwrap(), "Create profile: a");
    }

    #[test]
    fn push_failure_is_swallowed() {
        let h = harness(true);
        h.remote.set_push_error(Some("remote hung up"));
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_commit().require_push();
        h.engine
            .execute(&mut context, |repo, context| {
                repo.write_file("x", b"1")?;
                context.commit_message("edit x");
                Ok(())
            })
            .unwrap();
        assert_eq!(h.remote.push_count(), 0);
    }

    #[test]
    #[should_panic(expected = "empty commit message")]
    fn commit_without_message_is_fatal() {
        let h = harness(false);
        let _write = h.lock.acquire_write();
        let mut context = GitContext::new().require_commit();
        let _ = h.engine.execute(&mut context, |_repo, _context| Ok(()));
    }

    #[test]
    fn compaction_runs_on_the_configured_cadence() {
        let h = harness(false);
        let _write = h.lock.acquire_write();
        // Limit is 3: the fourth commit triggers the first gc.
        for i in 0..4 {
            let mut context = GitContext::new().require_commit();
            h.engine
                .execute(&mut context, |repo, context| {
                    repo.write_file("f", format!("{i}").as_bytes())?;
                    context.commit_message(format!("edit {i}"));
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(h.repo.gc_count(), 1);
    }

    #[test]
    #[should_panic(expected = "no write lock obtained")]
    fn execute_requires_the_implied_lock_level() {
        let h = harness(false);
        let mut context = GitContext::new().require_commit();
        let _ = h.engine.execute(&mut context, |_repo, _context| Ok(()));
    }

    #[test]
    fn read_only_execute_runs_under_read_lock() {
        let h = harness(false);
        let _read = h.lock.acquire_read();
        let mut context = GitContext::new();
        let branch = h
            .engine
            .execute(&mut context, |repo, _context| {
                Ok(repo.current_branch()?)
            })
            .unwrap();
        assert_eq!(branch, "master");
    }
}
