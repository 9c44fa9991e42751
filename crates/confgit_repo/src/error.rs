//! Error types for repository operations.

use thiserror::Error;

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors that can occur at the repository boundary.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The named branch does not exist.
    #[error("branch not found: {name}")]
    BranchNotFound {
        /// Name of the missing branch.
        name: String,
    },

    /// A branch with this name already exists.
    #[error("branch already exists: {name}")]
    BranchExists {
        /// Name of the conflicting branch.
        name: String,
    },

    /// The currently checked-out branch cannot be deleted.
    #[error("cannot delete the checked-out branch: {name}")]
    CannotDeleteCurrentBranch {
        /// Name of the checked-out branch.
        name: String,
    },

    /// A commit id could not be resolved.
    #[error("unknown commit: {id}")]
    UnknownCommit {
        /// The unresolved commit id.
        id: String,
    },

    /// A remote transport operation (fetch/push) failed.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// No remote is configured for the requested transport operation.
    #[error("no remote configured: {name}")]
    NoRemote {
        /// The remote name that was requested.
        name: String,
    },

    /// Operation not permitted in the current repository state.
    #[error("invalid repository operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl RepoError {
    /// Creates a branch-not-found error.
    pub fn branch_not_found(name: impl Into<String>) -> Self {
        Self::BranchNotFound { name: name.into() }
    }

    /// Creates a branch-exists error.
    pub fn branch_exists(name: impl Into<String>) -> Self {
        Self::BranchExists { name: name.into() }
    }

    /// Creates an unknown-commit error.
    pub fn unknown_commit(id: impl Into<String>) -> Self {
        Self::UnknownCommit { id: id.into() }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
