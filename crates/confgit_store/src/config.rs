//! Store configuration.

use std::time::Duration;

/// Configuration for the store, its synchronization engine and scheduler.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the git remote used for fetch and push.
    pub remote_name: String,
    /// The protected default branch; never treated as a version.
    pub default_branch: String,
    /// Fixed external repository URL. When set it overrides any URL
    /// discovered at runtime.
    pub configured_url: Option<String>,
    /// Fixed delay between scheduled synchronization cycles.
    pub push_interval: Duration,
    /// Delay before the first scheduled cycle.
    pub initial_sync_delay: Duration,
    /// Whether each scheduled cycle pulls before pushing. Mutually
    /// exclusive with the counter-triggered pull.
    pub pull_on_push: bool,
    /// Timeout for remote transport operations.
    pub remote_timeout: Duration,
    /// Explicit remote username. Credentials fall back to a token source
    /// unless both username and password are set.
    pub remote_user: Option<String>,
    /// Explicit remote password.
    pub remote_password: Option<String>,
    /// Bounded wait for lock acquisition before failing fatally.
    pub lock_timeout: Duration,
    /// Whether failed lock assertions panic (true) or only log (false).
    pub strict_lock_asserts: bool,
    /// Number of commits between repository compactions.
    pub gc_commit_limit: u32,
    /// Upper bound of the randomized delay applied to counter
    /// notifications before pulling.
    pub counter_delay: Duration,
    /// How long shutdown waits for an in-flight scheduled cycle.
    pub shutdown_grace: Duration,
}

impl StoreConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            remote_name: "origin".to_string(),
            default_branch: "master".to_string(),
            configured_url: None,
            push_interval: Duration::from_secs(60),
            initial_sync_delay: Duration::from_secs(1),
            pull_on_push: false,
            remote_timeout: Duration::from_secs(10),
            remote_user: None,
            remote_password: None,
            lock_timeout: Duration::from_secs(10),
            strict_lock_asserts: true,
            gc_commit_limit: 40,
            counter_delay: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Sets the remote name.
    pub fn with_remote_name(mut self, name: impl Into<String>) -> Self {
        self.remote_name = name.into();
        self
    }

    /// Sets the protected default branch.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Sets a fixed external repository URL.
    pub fn with_configured_url(mut self, url: impl Into<String>) -> Self {
        self.configured_url = Some(url.into());
        self
    }

    /// Sets the scheduled cycle interval.
    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }

    /// Sets the delay before the first scheduled cycle.
    pub fn with_initial_sync_delay(mut self, delay: Duration) -> Self {
        self.initial_sync_delay = delay;
        self
    }

    /// Enables or disables pulling before each scheduled push.
    pub fn with_pull_on_push(mut self, enabled: bool) -> Self {
        self.pull_on_push = enabled;
        self
    }

    /// Sets the remote transport timeout.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Sets explicit remote credentials.
    pub fn with_remote_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.remote_user = Some(user.into());
        self.remote_password = Some(password.into());
        self
    }

    /// Sets the bounded lock acquisition wait.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets whether failed lock assertions panic.
    pub fn with_strict_lock_asserts(mut self, strict: bool) -> Self {
        self.strict_lock_asserts = strict;
        self
    }

    /// Sets the number of commits between compactions.
    pub fn with_gc_commit_limit(mut self, limit: u32) -> Self {
        self.gc_commit_limit = limit;
        self
    }

    /// Sets the upper bound of the counter notification delay.
    pub fn with_counter_delay(mut self, delay: Duration) -> Self {
        self.counter_delay = delay;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The repository configuration key holding the remote URL.
    pub(crate) fn remote_url_key(&self) -> String {
        format!("remote.{}.url", self.remote_name)
    }

    /// The repository configuration key holding the remote fetch spec.
    pub(crate) fn remote_fetch_key(&self) -> String {
        format!("remote.{}.fetch", self.remote_name)
    }

    /// The fetch spec mirroring all remote heads.
    pub(crate) fn remote_fetch_spec(&self) -> String {
        format!("+refs/heads/*:refs/remotes/{}/*", self.remote_name)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
