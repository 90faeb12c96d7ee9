//! Concurrency guard: one reader-writer lock per map instance, optionally
//! paired with a single process-wide lock.
//!
//! Lookups take the instance lock shared and recursively, so one thread may
//! hold several `ValueRef`s into the same map at once. Mutations take it
//! exclusively. With the `global-lock` feature every mutation on every map
//! also takes `PROCESS_LOCK` after its instance lock, so mutations of
//! unrelated maps serialize against each other. Reads never touch the
//! process lock, and a `ValueRef` holds only the shared instance lock.

use crate::reentrancy::{self, Access, HeldMark};
use core::ops::{Deref, DerefMut};
use parking_lot::{
    MappedRwLockReadGuard, ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

// Reentrant so a destroy callback may mutate another map.
static PROCESS_LOCK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

fn process_guard() -> Option<ReentrantMutexGuard<'static, ()>> {
    if cfg!(feature = "global-lock") {
        Some(PROCESS_LOCK.lock())
    } else {
        None
    }
}

pub(crate) struct TableLock<T> {
    inner: RwLock<T>,
}

impl<T> TableLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Shared access. Granted even while another reader on this thread is
    /// still alive.
    pub(crate) fn read(&self) -> ReadGuard<'_, T> {
        let mark = reentrancy::enter(self.id(), Access::Read);
        ReadGuard {
            inner: self.inner.read_recursive(),
            _mark: mark,
        }
    }

    /// Exclusive access, plus the process lock when enabled.
    pub(crate) fn write(&self) -> WriteGuard<'_, T> {
        let mark = reentrancy::enter(self.id(), Access::Write);
        let inner = self.inner.write();
        WriteGuard {
            inner,
            _process: process_guard(),
            _mark: mark,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.try_write().is_none()
    }

    /// Exclusive access through `&mut self`; no lock is taken.
    pub(crate) fn with_mut<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        f(self.inner.get_mut())
    }
}

pub(crate) struct ReadGuard<'a, T> {
    inner: RwLockReadGuard<'a, T>,
    _mark: HeldMark,
}

impl<'a, T> ReadGuard<'a, T> {
    /// Narrow the guard to a part of the locked data, or release it if `f`
    /// finds nothing.
    pub(crate) fn try_map<U, F>(guard: Self, f: F) -> Option<ValueRef<'a, U>>
    where
        U: ?Sized,
        F: FnOnce(&T) -> Option<&U>,
    {
        let ReadGuard { inner, _mark } = guard;
        RwLockReadGuard::try_map(inner, f)
            .ok()
            .map(|inner| ValueRef { inner, _mark })
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

/// Holds the instance write lock, and the process lock when enabled.
/// Fields drop in declaration order, releasing the instance lock first.
pub(crate) struct WriteGuard<'a, T> {
    inner: RwLockWriteGuard<'a, T>,
    _process: Option<ReentrantMutexGuard<'static, ()>>,
    _mark: HeldMark,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// Read-only alias to a value stored in a map.
///
/// The map stays read-locked while a `ValueRef` is alive: further lookups
/// on the same map, from any thread, go ahead, but the value cannot be
/// replaced, removed or destroyed underneath it. Drop it before mutating
/// the same map from the same thread; debug builds panic if you don't.
pub struct ValueRef<'a, V: ?Sized> {
    inner: MappedRwLockReadGuard<'a, V>,
    _mark: HeldMark,
}

impl<V: ?Sized> Deref for ValueRef<'_, V> {
    type Target = V;
    fn deref(&self) -> &V {
        &self.inner
    }
}

impl<V: ?Sized + core::fmt::Debug> core::fmt::Debug for ValueRef<'_, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        (**self).fmt(f)
    }
}
