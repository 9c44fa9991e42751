//! # confgit store
//!
//! Synchronization and consistency core of a distributed configuration
//! store backed by a version-control repository.
//!
//! This crate provides:
//! - A process-wide read/write guard with bounded acquisition and
//!   held-lock assertions
//! - The pull/push/merge synchronization engine driven by per-operation
//!   [`GitContext`] phase claims
//! - A background scheduler (timed push, optional timed pull, counter
//!   wakeups, remote-URL-change handling)
//! - The per-version load-and-resolve cache with wholesale invalidation
//! - The profile hierarchy resolver
//! - The public version/profile store API
//!
//! ## Architecture
//!
//! Each named configuration **version** is a branch of the backing
//! repository; each **profile** is a directory tree of configuration
//! files on that branch, with multiple inheritance declared through a
//! parents attribute and resolved into an override-merged view at read
//! time.
//!
//! ## Key invariants
//!
//! - At most one writer mutates the working tree at any instant; readers
//!   overlap each other but never a writer
//! - No lock acquisition waits forever: a bounded timeout fails fatally
//! - The remote wins every merge conflict; divergent local history on a
//!   shared branch is discarded
//! - A pull that changes no tree content triggers no cache invalidation
//!   and no change notification, even when commit ids differ

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod cache;
mod config;
mod context;
mod counter;
mod error;
mod listener;
mod lock;
mod properties;
mod proxy;
mod registry;
mod resolver;
mod scheduler;
mod sync;
mod types;

pub use auth::{resolve_credentials, StaticTokenSource, TokenSource};
pub use cache::VersionCache;
pub use config::StoreConfig;
pub use context::GitContext;
pub use counter::{CounterListener, MemoryCounter, SharedCounter};
pub use error::{StoreError, StoreResult};
pub use listener::{ListenerRegistry, StoreListener};
pub use lock::{ReadHandle, StoreLock, WriteHandle};
pub use properties::{
    configuration_name, format_properties, parse_properties, PROPERTIES_SUFFIX,
};
pub use proxy::{
    DirectSelector, GitProxySelector, ProxyChoice, ProxyRegistry, ProxySelector, ProxySettings,
    GIT_ROUTE_PREFIX,
};
pub use registry::ProfileStore;
pub use scheduler::SyncScheduler;
pub use sync::SyncEngine;
pub use types::{
    compare_version_ids, profile_directory, Profile, ProfileSpec, Version, VersionSpec,
    ATTRIBUTE_PARENTS, PROFILES_ROOT, PROFILE_FOLDER_SUFFIX, PROFILE_METADATA_FILE,
    VERSION_ATTRIBUTES_FILE,
};
