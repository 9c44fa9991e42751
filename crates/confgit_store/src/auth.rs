//! Remote credential resolution.
//!
//! Explicit username/password configuration wins; otherwise credentials
//! come from a token-issuing subsystem (container identity); otherwise
//! access is anonymous.

use confgit_repo::Credentials;

use crate::config::StoreConfig;

/// Issues short-lived credentials from a container-identity subsystem.
pub trait TokenSource: Send + Sync {
    /// The login to present to the remote.
    fn username(&self) -> String;

    /// Issues a token usable as a password.
    fn issue_token(&self) -> String;
}

/// A token source with fixed values.
pub struct StaticTokenSource {
    username: String,
    token: String,
}

impl StaticTokenSource {
    /// Creates a fixed token source.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl TokenSource for StaticTokenSource {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn issue_token(&self) -> String {
        self.token.clone()
    }
}

/// Resolves the credentials for remote transport operations.
pub fn resolve_credentials(
    config: &StoreConfig,
    tokens: Option<&dyn TokenSource>,
) -> Credentials {
    match (&config.remote_user, &config.remote_password) {
        (Some(user), Some(password)) => Credentials::new(user, password),
        _ => match tokens {
            Some(source) => Credentials::new(source.username(), source.issue_token()),
            None => Credentials::anonymous(),
        },
    }
}
