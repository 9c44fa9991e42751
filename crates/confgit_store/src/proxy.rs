//! Proxy selection for git transport.
//!
//! Requests whose path falls under the store's git route are routed
//! through the configured proxy (subject to a pipe-delimited no-proxy
//! pattern list); everything else falls through to the delegate selector.
//! Selection state lives in an explicit [`ProxyRegistry`] with paired
//! install/restore, not in a process-wide global.

use std::sync::Arc;

use parking_lot::RwLock;

/// Path prefix identifying git requests against the configuration store.
pub const GIT_ROUTE_PREFIX: &str = "/git/config/";

/// Result of proxy selection for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyChoice {
    /// Connect directly.
    Direct,
    /// Connect through an HTTP proxy.
    Http {
        /// Proxy host.
        host: String,
        /// Proxy port.
        port: u16,
    },
}

/// Chooses how to reach a host for a given request path.
pub trait ProxySelector: Send + Sync {
    /// Selects the proxy for a request.
    fn select(&self, host: &str, path: &str) -> ProxyChoice;
}

/// The platform default: always direct.
#[derive(Debug, Default)]
pub struct DirectSelector;

impl ProxySelector for DirectSelector {
    fn select(&self, _host: &str, _path: &str) -> ProxyChoice {
        ProxyChoice::Direct
    }
}

/// Proxy settings for git traffic.
#[derive(Debug, Clone, Default)]
pub struct ProxySettings {
    /// Proxy host; `None` means no proxying.
    pub proxy_host: Option<String>,
    /// Proxy port.
    pub proxy_port: u16,
    /// Pipe-delimited wildcard patterns of hosts reached directly.
    pub non_proxy_hosts: Option<String>,
}

/// Routes git-store requests through the configured proxy and delegates
/// everything else.
pub struct GitProxySelector {
    delegate: Arc<dyn ProxySelector>,
    settings: ProxySettings,
}

impl GitProxySelector {
    /// Creates a selector over the given delegate and settings.
    pub fn new(delegate: Arc<dyn ProxySelector>, settings: ProxySettings) -> Self {
        Self { delegate, settings }
    }

    fn select_for_git(&self, host: &str) -> ProxyChoice {
        if let Some(patterns) = &self.settings.non_proxy_hosts {
            for pattern in patterns.split('|') {
                let pattern = pattern.trim();
                if !pattern.is_empty() && wildcard_match(pattern, host) {
                    return ProxyChoice::Direct;
                }
            }
        }
        match &self.settings.proxy_host {
            Some(proxy) => ProxyChoice::Http {
                host: proxy.clone(),
                port: self.settings.proxy_port,
            },
            None => ProxyChoice::Direct,
        }
    }
}

impl ProxySelector for GitProxySelector {
    fn select(&self, host: &str, path: &str) -> ProxyChoice {
        if path.starts_with(GIT_ROUTE_PREFIX) {
            self.select_for_git(host)
        } else {
            self.delegate.select(host, path)
        }
    }
}

/// Matches a host against a pattern where `*` spans any sequence.
fn wildcard_match(pattern: &str, host: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == host,
        Some((prefix, rest)) => {
            if !host.starts_with(prefix) {
                return false;
            }
            let remainder = &host[prefix.len()..];
            if rest.is_empty() {
                return true;
            }
            remainder
                .char_indices()
                .map(|(index, _)| index)
                .chain(std::iter::once(remainder.len()))
                .any(|index| wildcard_match(rest, &remainder[index..]))
        }
    }
}

/// Holds the process's active selector with explicit install/restore.
pub struct ProxyRegistry {
    current: RwLock<Arc<dyn ProxySelector>>,
}

impl ProxyRegistry {
    /// Creates a registry with the direct selector installed.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(DirectSelector)),
        }
    }

    /// Installs a selector, returning the previously installed one so the
    /// caller can restore it on teardown.
    pub fn install(&self, selector: Arc<dyn ProxySelector>) -> Arc<dyn ProxySelector> {
        std::mem::replace(&mut *self.current.write(), selector)
    }

    /// Restores a previously installed selector.
    pub fn restore(&self, selector: Arc<dyn ProxySelector>) {
        *self.current.write() = selector;
    }

    /// Selects with the active selector.
    pub fn select(&self, host: &str, path: &str) -> ProxyChoice {
        self.current.read().select(host, path)
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(settings: ProxySettings) -> GitProxySelector {
        GitProxySelector::new(Arc::new(DirectSelector), settings)
    }

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("localhost", "localhost"));
        assert!(!wildcard_match("localhost", "remotehost"));
        assert!(wildcard_match("*.internal", "repo.internal"));
        assert!(!wildcard_match("*.internal", "repo.external"));
        assert!(wildcard_match("10.*", "10.0.0.1"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("repo.*.lan", "repo.eu.lan"));
        assert!(!wildcard_match("repo.*.lan", "repo.eu.wan"));
    }

    #[test]
    fn git_requests_use_proxy() {
        let selector = selector(ProxySettings {
            proxy_host: Some("proxy.lan".into()),
            proxy_port: 3128,
            non_proxy_hosts: None,
        });
        assert_eq!(
            selector.select("repo.example.com", "/git/config/cluster.git"),
            ProxyChoice::Http {
                host: "proxy.lan".into(),
                port: 3128
            }
        );
    }

    #[test]
    fn non_proxy_patterns_bypass() {
        let selector = selector(ProxySettings {
            proxy_host: Some("proxy.lan".into()),
            proxy_port: 3128,
            non_proxy_hosts: Some("localhost|*.internal".into()),
        });
        assert_eq!(
            selector.select("localhost", "/git/config/cluster.git"),
            ProxyChoice::Direct
        );
        assert_eq!(
            selector.select("repo.internal", "/git/config/cluster.git"),
            ProxyChoice::Direct
        );
        assert!(matches!(
            selector.select("repo.example.com", "/git/config/cluster.git"),
            ProxyChoice::Http { .. }
        ));
    }

    #[test]
    fn other_paths_fall_through_to_delegate() {
        let selector = selector(ProxySettings {
            proxy_host: Some("proxy.lan".into()),
            proxy_port: 3128,
            non_proxy_hosts: None,
        });
        assert_eq!(
            selector.select("repo.example.com", "/api/other"),
            ProxyChoice::Direct
        );
    }

    #[test]
    fn registry_install_and_restore() {
        let registry = ProxyRegistry::new();
        assert_eq!(registry.select("host", "/git/config/x"), ProxyChoice::Direct);

        let previous = registry.install(Arc::new(selector(ProxySettings {
            proxy_host: Some("proxy.lan".into()),
            proxy_port: 8080,
            non_proxy_hosts: None,
        })));
        assert!(matches!(
            registry.select("host", "/git/config/x"),
            ProxyChoice::Http { .. }
        ));

        registry.restore(previous);
        assert_eq!(registry.select("host", "/git/config/x"), ProxyChoice::Direct);
    }
}
