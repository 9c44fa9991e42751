//! Error types for the store core.

use thiserror::Error;

use confgit_repo::RepoError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store operations.
///
/// Programming errors (lock misuse, double-claimed synchronization phases,
/// an empty commit message) are not represented here; they panic.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Repository boundary error.
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    /// A required version does not exist.
    #[error("version does not exist: {version_id}")]
    VersionNotFound {
        /// The missing version id.
        version_id: String,
    },

    /// A required profile does not exist.
    #[error("cannot obtain profile: {version_id}/{profile_id}")]
    ProfileNotFound {
        /// The version that was searched.
        version_id: String,
        /// The missing profile id.
        profile_id: String,
    },

    /// A profile parent graph contains a cycle.
    #[error("cyclic profile inheritance at {profile_id}: {chain}")]
    CyclicInheritance {
        /// The profile at which the cycle was detected.
        profile_id: String,
        /// The resolution chain that closed the cycle.
        chain: String,
    },

    /// Stored state violates an expectation of the store layout.
    #[error("inconsistent store state: {message}")]
    Internal {
        /// Description of the inconsistency.
        message: String,
    },
}

impl StoreError {
    /// Creates a version-not-found error.
    pub fn version_not_found(version_id: impl Into<String>) -> Self {
        Self::VersionNotFound {
            version_id: version_id.into(),
        }
    }

    /// Creates a profile-not-found error.
    pub fn profile_not_found(
        version_id: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Self {
        Self::ProfileNotFound {
            version_id: version_id.into(),
            profile_id: profile_id.into(),
        }
    }

    /// Creates an internal-inconsistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
