/// Test-and-set spinlock with exponential yield backoff
/// Meant for critical sections of a few instructions (one pixel compare/write)
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

const MAX_BACKOFF: u32 = 128;

/// A non-reentrant spinlock.
///
/// Locking twice from the same thread deadlocks. There is no owner tracking.
#[derive(Debug, Default)]
pub struct SpinLock {
    state: AtomicU32,
}

/// Releases the lock when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Spin until the lock is acquired.
    ///
    /// On contention the thread yields `backoff` times, doubling each round up
    /// to 128.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_> {
        let mut backoff = 1;
        while self
            .state
            .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            for _ in 0..backoff {
                thread::yield_now();
            }
            if backoff < MAX_BACKOFF {
                backoff <<= 1;
            }
        }
        SpinGuard { lock: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        self.state
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }

    #[inline]
    fn unlock(&self) {
        self.state.store(0, Ordering::Release);
    }
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
