//! # confgit repository capability
//!
//! The version-control boundary of the confgit store.
//!
//! This crate provides:
//! - The [`Repository`] trait: everything the synchronization core needs
//!   from a backing repository (branches, checkout, commit, merge,
//!   fetch/push, diff, compaction, working-tree file access)
//! - An in-memory implementation ([`MemoryRepository`]) backed by a
//!   shareable [`MemoryRemote`], so several repositories can converge
//!   through one remote without touching the filesystem
//!
//! The store never interprets repository internals; it sees branches,
//! commit ids and a working tree of path/byte pairs.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod traits;
mod types;

pub use error::{RepoError, RepoResult};
pub use memory::{MemoryRemote, MemoryRepository};
pub use traits::Repository;
pub use types::{
    Branches, CommitId, Credentials, DiffEntry, DiffKind, DirEntry, MergeOutcome, MergeStrategy,
    TransportOptions,
};
