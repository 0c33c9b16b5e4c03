//! The single coarse lock around the coordinator and its engines.

use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// A read-write lock that reports long waits.
///
/// Reads are recursive so a thread already holding a read guard can take
/// another while a writer waits. There is no timeout: a slow wait is only
/// logged. Code that holds the write guard passes `&mut` access down rather
/// than locking again.
pub struct EngineLock<T> {
    inner: RwLock<T>,
    warn_after: Duration,
}

impl<T> EngineLock<T> {
    /// Wraps `value`, warning when a write waits longer than `warn_after`.
    pub fn new(value: T, warn_after: Duration) -> Self {
        Self {
            inner: RwLock::new(value),
            warn_after,
        }
    }

    /// Takes a shared guard.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read_recursive()
    }

    /// Takes the exclusive guard, logging if the wait was long.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        if let Some(guard) = self.inner.try_write() {
            return guard;
        }
        let start = Instant::now();
        let guard = self.inner.write();
        let waited = start.elapsed();
        if waited > self.warn_after {
            warn!(waited_ms = waited.as_millis() as u64, "waited for the engine lock");
        }
        guard
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
