//! Blocking MPMC queue with close semantics.
//!
//! Items live in a lock-free `SegQueue`; the mutex/condvar pair is only
//! touched when a consumer has to sleep or a producer has to wake one.
//!
//! Closing is immediate: once `close()` returns, every pending and future
//! `get()` fails with `Error::LatchClosed`, even if items remain queued.

use crate::error::{Error, Result};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct Latch<T> {
    queue: SegQueue<T>,
    closed: AtomicBool,
    /// Guards the sleep/wake handshake, not the queue
    sleep: Mutex<()>,
    wake: Condvar,
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Latch<T> {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            closed: AtomicBool::new(false),
            sleep: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.sleep.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item and wake one waiter.
    pub fn put(&self, item: T) -> Result<()> {
        if self.is_closed() {
            return Err(Error::LatchClosed);
        }
        self.queue.push(item);
        // Taking the lock orders this push against a consumer that is
        // between its emptiness check and its wait.
        let _guard = self.lock();
        self.wake.notify_one();
        Ok(())
    }

    /// Dequeue without blocking.
    pub fn try_get(&self) -> Result<Option<T>> {
        if self.is_closed() {
            return Err(Error::LatchClosed);
        }
        Ok(self.queue.pop())
    }

    /// Block until an item arrives or the latch is closed.
    pub fn get(&self) -> Result<T> {
        loop {
            if let Some(item) = self.try_get()? {
                return Ok(item);
            }
            let guard = self.lock();
            if self.is_closed() {
                return Err(Error::LatchClosed);
            }
            if !self.queue.is_empty() {
                continue;
            }
            let _guard = self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `get`, but gives up with `Error::Timeout` after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_get()? {
                return Ok(item);
            }
            let guard = self.lock();
            if self.is_closed() {
                return Err(Error::LatchClosed);
            }
            if !self.queue.is_empty() {
                continue;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (_guard, _) = self
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the latch and wake every waiter. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.lock();
        self.wake.notify_all();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of queued items.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
