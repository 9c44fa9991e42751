//! The store-wide read/write guard.
//!
//! One working tree and one cache are shared by every caller, so all
//! access funnels through a single [`StoreLock`]. Acquisition tries a
//! non-blocking lock first, then waits a bounded time, then fails fatally:
//! a lock that cannot be obtained within the bound indicates a stuck
//! holder, and waiting forever would only hide it.
//!
//! Handles are typed: a [`ReadHandle`] has no upgrade operation. A thread
//! that holds only a read lock and needs to write must release and
//! re-acquire; attempting to acquire the write lock while holding a read
//! lock runs into the bounded wait and panics. Write acquisition is
//! reentrant on the owning thread, and a held write lock satisfies any
//! read requirement.

use std::collections::HashMap;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

#[derive(Debug, Default)]
struct WriteState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// The process-wide read/write mutex gating all store access.
#[derive(Debug)]
pub struct StoreLock {
    inner: RwLock<()>,
    timeout: Duration,
    strict: bool,
    writer: Mutex<WriteState>,
    readers: Mutex<HashMap<ThreadId, usize>>,
}

impl StoreLock {
    /// Creates a lock with the given bounded acquisition wait and
    /// assertion mode.
    pub fn new(timeout: Duration, strict: bool) -> Self {
        Self {
            inner: RwLock::new(()),
            timeout,
            strict,
            writer: Mutex::new(WriteState::default()),
            readers: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the write lock, waiting at most the configured bound.
    ///
    /// Reentrant on the owning thread.
    ///
    /// # Panics
    ///
    /// Panics when the lock cannot be obtained in time.
    pub fn acquire_write(&self) -> WriteHandle<'_> {
        let me = thread::current().id();
        {
            let mut state = self.writer.lock();
            if state.owner == Some(me) {
                state.depth += 1;
                return WriteHandle {
                    lock: self,
                    guard: None,
                };
            }
        }
        let guard = self
            .inner
            .try_write()
            .or_else(|| self.inner.try_write_for(self.timeout));
        let Some(guard) = guard else {
            panic!("cannot obtain store write lock within {:?}", self.timeout);
        };
        let mut state = self.writer.lock();
        state.owner = Some(me);
        state.depth = 1;
        WriteHandle {
            lock: self,
            guard: Some(guard),
        }
    }

    /// Acquires a read lock, waiting at most the configured bound.
    ///
    /// A thread holding the write lock gets a read handle for free; read
    /// acquisition is recursive.
    ///
    /// # Panics
    ///
    /// Panics when the lock cannot be obtained in time.
    pub fn acquire_read(&self) -> ReadHandle<'_> {
        let me = thread::current().id();
        if self.writer.lock().owner == Some(me) {
            return ReadHandle {
                lock: self,
                guard: None,
            };
        }
        let guard = self
            .inner
            .try_read_recursive()
            .or_else(|| self.inner.try_read_recursive_for(self.timeout));
        let Some(guard) = guard else {
            panic!("cannot obtain store read lock within {:?}", self.timeout);
        };
        *self.readers.lock().entry(me).or_insert(0) += 1;
        ReadHandle {
            lock: self,
            guard: Some(guard),
        }
    }

    /// Whether the current thread owns the write lock.
    pub fn is_write_held_by_current(&self) -> bool {
        self.writer.lock().owner == Some(thread::current().id())
    }

    /// Whether the current thread holds at least a read lock (a held
    /// write lock counts).
    pub fn is_read_held_by_current(&self) -> bool {
        let me = thread::current().id();
        self.readers.lock().get(&me).copied().unwrap_or(0) > 0
            || self.writer.lock().owner == Some(me)
    }

    /// Asserts that the current thread owns the write lock.
    ///
    /// # Panics
    ///
    /// Panics in strict mode when the assertion fails.
    pub fn assert_write_held(&self) {
        if !self.is_write_held_by_current() {
            if self.strict {
                panic!("no write lock obtained");
            }
            warn!("no write lock obtained");
        }
    }

    /// Asserts that the current thread holds at least a read lock.
    ///
    /// # Panics
    ///
    /// Panics in strict mode when the assertion fails.
    pub fn assert_read_held(&self) {
        if !self.is_read_held_by_current() {
            if self.strict {
                panic!("no read lock obtained");
            }
            warn!("no read lock obtained");
        }
    }
}

/// A held write lock. Dropping releases it.
#[must_use = "the write lock is released when the handle drops"]
#[derive(Debug)]
pub struct WriteHandle<'a> {
    lock: &'a StoreLock,
    guard: Option<RwLockWriteGuard<'a, ()>>,
}

impl Drop for WriteHandle<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.writer.lock();
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
        }
        // The inner guard, when present, releases after the bookkeeping.
    }
}

/// A held read lock. Dropping releases it. There is no upgrade operation.
#[must_use = "the read lock is released when the handle drops"]
#[derive(Debug)]
pub struct ReadHandle<'a> {
    lock: &'a StoreLock,
    guard: Option<RwLockReadGuard<'a, ()>>,
}

impl Drop for ReadHandle<'_> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            let me = thread::current().id();
            let mut readers = self.lock.readers.lock();
            if let Some(count) = readers.get_mut(&me) {
                *count -= 1;
                if *count == 0 {
                    readers.remove(&me);
                }
            }
        }
    }
}
