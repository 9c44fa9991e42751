//! The public store API.
//!
//! [`ProfileStore`] composes the guard, the synchronization engine, the
//! version cache and the resolver into version/profile CRUD. Every
//! mutating call runs in its own write-locked scope wrapped in a
//! [`GitContext`]; reads run read-locked against the known-version set,
//! except resolved-version access, which takes the write lock because a
//! cache miss checks branches out to load.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use confgit_repo::{RepoError, Repository};
use tracing::{debug, info, warn};

use crate::auth::TokenSource;
use crate::cache::VersionCache;
use crate::config::StoreConfig;
use crate::context::GitContext;
use crate::error::{StoreError, StoreResult};
use crate::listener::{ListenerRegistry, StoreListener};
use crate::lock::StoreLock;
use crate::resolver::load_version;
use crate::sync::SyncEngine;
use crate::types::{
    profile_directory, Profile, ProfileSpec, Version, VersionSpec, ATTRIBUTE_PARENTS,
    PROFILE_METADATA_FILE, VERSION_ATTRIBUTES_FILE,
};
use crate::properties::format_properties;

/// The git-backed configuration store.
pub struct ProfileStore {
    repo: Arc<dyn Repository>,
    config: StoreConfig,
    lock: Arc<StoreLock>,
    cache: Arc<VersionCache>,
    listeners: Arc<ListenerRegistry>,
    engine: Arc<SyncEngine>,
    receive_packs: AtomicU64,
}

impl ProfileStore {
    /// Opens the store over a repository.
    ///
    /// Scans the branch list into the known-version set and, when a fixed
    /// external URL is configured, applies it immediately (rewriting the
    /// remote configuration and pulling with deletions enabled).
    pub fn open(repo: Arc<dyn Repository>, config: StoreConfig) -> StoreResult<Arc<Self>> {
        Self::open_with_token_source(repo, config, None)
    }

    /// Opens the store with a token source for remote credentials.
    pub fn open_with_token_source(
        repo: Arc<dyn Repository>,
        config: StoreConfig,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> StoreResult<Arc<Self>> {
        let lock = Arc::new(StoreLock::new(
            config.lock_timeout,
            config.strict_lock_asserts,
        ));
        let cache = Arc::new(VersionCache::new(config.default_branch.clone()));
        let listeners = Arc::new(ListenerRegistry::new());
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&repo),
            Arc::clone(&lock),
            Arc::clone(&cache),
            Arc::clone(&listeners),
            config.clone(),
            tokens,
        ));
        let store = Arc::new(Self {
            repo,
            config,
            lock,
            cache,
            listeners,
            engine,
            receive_packs: AtomicU64::new(0),
        });

        {
            let _write = store.lock.acquire_write();
            let branches = store.repo.branches()?;
            store.cache.replace_known(branches.local.keys().cloned());
        }
        if let Some(url) = store.config.configured_url.clone() {
            store.run_remote_url_changed(&url)?;
        }
        info!("profile store opened");
        Ok(store)
    }

    /// Registers a store listener.
    pub fn add_listener(&self, listener: Arc<dyn StoreListener>) {
        self.listeners.add(listener);
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> &Arc<StoreLock> {
        &self.lock
    }

    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------

    /// Known version ids, in version order.
    pub fn versions(&self) -> Vec<String> {
        let _read = self.lock.acquire_read();
        self.cache.known_ids()
    }

    /// Whether a version id is known.
    pub fn has_version(&self, version_id: &str) -> bool {
        let _read = self.lock.acquire_read();
        self.cache.contains(version_id)
    }

    /// The resolved version, loading and caching it on miss. Returns
    /// `None` when no such branch exists.
    pub fn version(&self, version_id: &str) -> StoreResult<Option<Arc<Version>>> {
        let _write = self.lock.acquire_write();
        if let Some(version) = self.cache.cached(version_id) {
            return Ok(Some(version));
        }
        let default_branch = self.config.default_branch.clone();
        let mut context = GitContext::new().require_pull();
        let loaded = self.engine.execute(&mut context, |repo, _context| {
            load_version(repo, &default_branch, version_id)
        });
        match loaded {
            Ok(version) => {
                self.cache.add_known(version_id);
                Ok(Some(self.cache.insert(version)))
            }
            Err(StoreError::Repo(RepoError::BranchNotFound { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The resolved version; an absent version is an error.
    pub fn require_version(&self, version_id: &str) -> StoreResult<Arc<Version>> {
        self.version(version_id)?
            .ok_or_else(|| StoreError::version_not_found(version_id))
    }

    /// Creates a version by branching from a parent version.
    pub fn create_version(
        &self,
        parent_id: &str,
        version_id: &str,
        attributes: &BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let _write = self.lock.acquire_write();
        let mut context = GitContext::new()
            .require_pull()
            .require_commit()
            .require_push();
        self.engine.execute(&mut context, |repo, context| {
            self.checkout_version(repo, parent_id)?;
            self.create_or_checkout_version(repo, version_id)?;
            if !attributes.is_empty() {
                repo.write_file(VERSION_ATTRIBUTES_FILE, &format_properties(attributes))?;
            }
            context.commit_message(format!("Create version: {parent_id} => {version_id}"));
            Ok(())
        })
    }

    /// Creates a version with an embedded profile graph. Parents embedded
    /// in the specs are materialized before their children, all within
    /// this one operation.
    pub fn create_version_with_profiles(&self, spec: &VersionSpec) -> StoreResult<String> {
        let _write = self.lock.acquire_write();
        let mut context = GitContext::new().require_commit().require_push();
        self.engine.execute(&mut context, |repo, context| {
            context.commit_message(format!("Create version: {}", spec.id));
            self.create_or_checkout_version(repo, &spec.id)?;
            if !spec.attributes.is_empty() {
                repo.write_file(VERSION_ATTRIBUTES_FILE, &format_properties(&spec.attributes))?;
            }
            let mut visited = BTreeSet::new();
            for profile in &spec.profiles {
                self.create_or_update_profile(repo, context, profile, true, &mut visited)?;
            }
            Ok(spec.id.clone())
        })
    }

    /// Deletes a version: drops it from the caches and deletes its
    /// branch. Deleting an unknown version is a no-op.
    pub fn delete_version(&self, version_id: &str) -> StoreResult<()> {
        let _write = self.lock.acquire_write();
        let mut context = GitContext::new();
        self.engine.execute(&mut context, |repo, _context| {
            self.cache.remove(version_id);
            match repo.delete_branch(version_id) {
                Err(RepoError::CannotDeleteCurrentBranch { .. }) => {
                    repo.checkout(&self.config.default_branch)?;
                    repo.delete_branch(version_id)?;
                }
                other => other?,
            }
            self.engine.propagate_branch_deletion(version_id);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Whether a profile exists in a version.
    pub fn has_profile(&self, version_id: &str, profile_id: &str) -> StoreResult<bool> {
        Ok(self.profile(version_id, profile_id)?.is_some())
    }

    /// The resolved profile, or `None` when version or profile is absent.
    pub fn profile(&self, version_id: &str, profile_id: &str) -> StoreResult<Option<Profile>> {
        Ok(self
            .version(version_id)?
            .and_then(|version| version.profile(profile_id).cloned()))
    }

    /// The resolved profile; absence is an error.
    pub fn require_profile(&self, version_id: &str, profile_id: &str) -> StoreResult<Profile> {
        self.profile(version_id, profile_id)?
            .ok_or_else(|| StoreError::profile_not_found(version_id, profile_id))
    }

    /// Sorted profile ids of a version; an absent version lists as empty.
    pub fn profile_ids(&self, version_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .version(version_id)?
            .map(|version| version.profile_ids())
            .unwrap_or_default())
    }

    /// Creates a profile (and any embedded parents) in its version.
    pub fn create_profile(&self, spec: &ProfileSpec) -> StoreResult<String> {
        self.write_profile(spec, true)
    }

    /// Updates an existing profile (and any embedded parents). Updating a
    /// profile that does not exist is an error.
    pub fn update_profile(&self, spec: &ProfileSpec) -> StoreResult<String> {
        self.write_profile(spec, false)
    }

    fn write_profile(&self, spec: &ProfileSpec, allow_create: bool) -> StoreResult<String> {
        let _write = self.lock.acquire_write();
        let mut context = GitContext::new().require_commit().require_push();
        self.engine.execute(&mut context, |repo, context| {
            self.checkout_version(repo, &spec.version)?;
            let mut visited = BTreeSet::new();
            self.create_or_update_profile(repo, context, spec, allow_create, &mut visited)
        })
    }

    /// Deletes a profile directory from its version. Deleting an absent
    /// profile commits nothing new but is not an error.
    pub fn delete_profile(&self, version_id: &str, profile_id: &str) -> StoreResult<()> {
        let _write = self.lock.acquire_write();
        let mut context = GitContext::new().require_commit().require_push();
        self.engine.execute(&mut context, |repo, context| {
            self.checkout_version(repo, version_id)?;
            repo.remove_path(&profile_directory(profile_id))?;
            context.commit_message(format!("Removed profile {profile_id}"));
            Ok(())
        })
    }

    fn create_or_update_profile(
        &self,
        repo: &dyn Repository,
        context: &mut GitContext,
        spec: &ProfileSpec,
        allow_create: bool,
        visited: &mut BTreeSet<String>,
    ) -> StoreResult<String> {
        self.lock.assert_write_held();
        if visited.contains(&spec.id) {
            return Ok(spec.id.clone());
        }

        // Parents first, so the hierarchy materializes bottom-up.
        for parent in &spec.parents {
            self.create_or_update_profile(repo, context, parent, allow_create, visited)?;
        }

        let directory = profile_directory(&spec.id);
        let metadata_path = format!("{directory}/{PROFILE_METADATA_FILE}");
        let exists = repo.path_exists(&metadata_path)?;
        if !exists {
            if !allow_create {
                return Err(StoreError::profile_not_found(&spec.version, &spec.id));
            }
            context.commit_message(format!("Create profile: {}", spec.id));
        }

        // Remove files present in the directory but absent from the spec.
        let current = list_files(repo, &directory)?;
        let stale: Vec<String> = current
            .into_iter()
            .filter(|path| {
                path != PROFILE_METADATA_FILE && !spec.file_configurations.contains_key(path)
            })
            .collect();
        if !stale.is_empty() {
            context.commit_message(format!(
                "Remove configurations {stale:?} for profile: {}",
                spec.id
            ));
            for path in &stale {
                repo.remove_path(&format!("{directory}/{path}"))?;
            }
        }

        if !spec.file_configurations.is_empty() {
            for (path, contents) in &spec.file_configurations {
                repo.write_file(&format!("{directory}/{path}"), contents)?;
            }
            context.commit_message(format!("Update configurations for profile: {}", spec.id));
        }

        let mut attributes = spec.attributes.clone();
        let parent_ids = spec.parent_ids();
        if !parent_ids.is_empty() {
            attributes.insert(ATTRIBUTE_PARENTS.to_string(), parent_ids.join(" "));
        }
        repo.write_file(&metadata_path, &format_properties(&attributes))?;

        if context.message().is_empty() {
            context.commit_message(format!(
                "Profile with no content: {}/{}",
                spec.version, spec.id
            ));
        }

        visited.insert(spec.id.clone());
        Ok(spec.id.clone())
    }

    fn checkout_version(&self, repo: &dyn Repository, branch: &str) -> StoreResult<()> {
        match repo.checkout(branch) {
            Ok(()) => {
                self.cache.add_known(branch);
                Ok(())
            }
            Err(RepoError::BranchNotFound { .. }) => {
                Err(StoreError::version_not_found(branch))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn create_or_checkout_version(&self, repo: &dyn Repository, branch: &str) -> StoreResult<()> {
        match repo.checkout(branch) {
            Ok(()) => {}
            Err(RepoError::BranchNotFound { .. }) => {
                repo.create_branch(branch, None)?;
                repo.checkout(branch)?;
            }
            Err(err) => return Err(err.into()),
        }
        self.cache.add_known(branch);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Synchronization entry points
    // ------------------------------------------------------------------

    /// One pull under the already-held write lock. Used by the scheduler
    /// and the counter trigger.
    pub(crate) fn pull_locked(&self) {
        let mut context = GitContext::new().require_pull();
        if self.engine.pull_phase(&mut context) {
            self.engine.fire_change_notification();
        }
    }

    /// One push under the already-held lock.
    pub(crate) fn push_locked(&self) {
        let mut context = GitContext::new().require_push();
        self.engine.push_phase(&mut context);
    }

    /// Reacts to a received pack: the remote delivered new objects, so
    /// the resolved cache is stale.
    pub fn notify_receive_pack(&self) {
        self.receive_packs.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    /// Number of receive-pack events observed.
    pub fn receive_pack_count(&self) -> u64 {
        self.receive_packs.load(Ordering::SeqCst)
    }

    /// Reacts to a discovered remote-URL change on a background thread.
    /// A fixed configured URL overrides the discovered one.
    pub fn notify_remote_url_changed(self: &Arc<Self>, url: &str) {
        let url = self
            .config
            .configured_url
            .clone()
            .unwrap_or_else(|| url.to_string());
        let store = Arc::clone(self);
        thread::spawn(move || {
            if let Err(err) = store.run_remote_url_changed(&url) {
                warn!("remote URL change handling failed: {err}. This failure is ignored.");
            }
        });
    }

    /// Applies a remote URL change: rewrites the remote configuration,
    /// pulls with deletions enabled, and on change notifies and pushes.
    pub(crate) fn run_remote_url_changed(&self, url: &str) -> StoreResult<()> {
        let _write = self.lock.acquire_write();
        let current = self.repo.config_value(&self.config.remote_url_key())?;
        if current.as_deref() == Some(url) {
            debug!("remote URL unchanged: {url}");
            return Ok(());
        }
        info!(
            "remote URL changed from {} to {url}",
            current.as_deref().unwrap_or("<unset>")
        );
        self.repo
            .set_config_value(&self.config.remote_url_key(), url)?;
        self.repo.set_config_value(
            &self.config.remote_fetch_key(),
            &self.config.remote_fetch_spec(),
        )?;

        let mut context = GitContext::new().require_pull_with_deletions();
        if self.engine.pull_phase(&mut context) {
            self.engine.fire_change_notification();
            let mut push_context = GitContext::new().require_push();
            self.engine.push_phase(&mut push_context);
        }
        self.listeners.notify_remote_url_changed(url);
        Ok(())
    }
}

fn list_files(repo: &dyn Repository, directory: &str) -> StoreResult<Vec<String>> {
    fn walk(
        repo: &dyn Repository,
        root: &str,
        relative: &str,
        out: &mut Vec<String>,
    ) -> StoreResult<()> {
        let dir = if relative.is_empty() {
            root.to_string()
        } else {
            format!("{root}/{relative}")
        };
        for entry in repo.list_dir(&dir)? {
            let child = if relative.is_empty() {
                entry.name.clone()
            } else {
                format!("{relative}/{}", entry.name)
            };
            if entry.is_dir {
                walk(repo, root, &child, out)?;
            } else {
                out.push(child);
            }
        }
        Ok(())
    }
    let mut files = Vec::new();
    walk(repo, directory, "", &mut files)?;
    Ok(files)
}
