//! # Shared Memory Arena
//!
//! The arena is the one region of memory reachable by the coordinator and
//! every worker thread of a pool: the output framebuffer plus the wait/notify
//! cells used by the [`bridge`](crate::bridge).
//!
//! ## Ownership
//! The arena is created by `WorkerPool::create`, shared as `Arc<SharedArena>`,
//! and freed only when the last referent (pool, handle, or in-flight task)
//! drops it. It is never reallocated or grown, so no access needs a
//! generation check.
//!
//! ## Concurrency
//! Framebuffer bytes are individually atomic; workers store into disjoint,
//! statically-assigned regions with relaxed ordering and readers copy with
//! relaxed loads, so a snapshot never observes a torn value, only complete
//! bytes from whichever writes have landed. Wait cells are mutated solely
//! through [`WaitCell::notify`].

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::bridge::WaitOutcome;
use crate::config::ArenaConfig;

/// One shared integer cell supporting wait/notify coordination.
///
/// The value is readable lock-free at any time. Waiting is offered in two
/// forms: a blocking wait for dedicated helper threads and an async wait for
/// the non-blocking coordinator. Both resolve against the same notify
/// operation, which is the only sanctioned mutation path: writing the value
/// through any other means could lose a wakeup.
pub struct WaitCell {
    value: AtomicI32,
    /// Bumped by every notify; waits compare generations so a spurious
    /// condvar wakeup is never mistaken for a notification.
    generation: Mutex<u64>,
    wakeup: Condvar,
    notify: Notify,
}

impl WaitCell {
    fn new() -> Self {
        Self {
            value: AtomicI32::new(0),
            generation: Mutex::new(0),
            wakeup: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Current cell value.
    pub fn load(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Store `value` and wake every waiter, blocking and async alike.
    pub fn notify(&self, value: i32) {
        {
            let mut generation = self.generation.lock().unwrap();
            self.value.store(value, Ordering::SeqCst);
            *generation = generation.wrapping_add(1);
        }
        self.wakeup.notify_all();
        self.notify.notify_waiters();
    }

    /// Block the calling thread until a notify arrives or `timeout` elapses.
    ///
    /// Returns [`WaitOutcome::NotEqual`] without waiting when the value
    /// already differs from `expected`. Must not be called from the
    /// coordinator; that is what [`WaitCell::wait_async`] and the bridge are
    /// for.
    pub fn wait_blocking(&self, expected: i32, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut generation = self.generation.lock().unwrap();
        if self.value.load(Ordering::SeqCst) != expected {
            return WaitOutcome::NotEqual;
        }
        let observed = *generation;
        while *generation == observed {
            match deadline {
                None => {
                    generation = self.wakeup.wait(generation).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    let (guard, _) = self.wakeup.wait_timeout(generation, deadline - now).unwrap();
                    generation = guard;
                }
            }
        }
        WaitOutcome::EqualResumed
    }

    /// Suspend the calling task until a notify arrives or `timeout` elapses.
    ///
    /// The waiter is registered before the value is checked, so a notify
    /// landing between the check and the suspension cannot be lost.
    pub async fn wait_async(&self, expected: i32, timeout: Option<Duration>) -> WaitOutcome {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.value.load(Ordering::SeqCst) != expected {
            return WaitOutcome::NotEqual;
        }
        match timeout {
            None => {
                notified.await;
                WaitOutcome::EqualResumed
            }
            Some(timeout) => match tokio::time::timeout(timeout, notified).await {
                Ok(()) => WaitOutcome::EqualResumed,
                Err(_) => WaitOutcome::TimedOut,
            },
        }
    }
}

impl std::fmt::Debug for WaitCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitCell").field("value", &self.load()).finish()
    }
}

/// The memory shared by a pool's coordinator and workers.
pub struct SharedArena {
    framebuffer: Box<[AtomicU8]>,
    cells: Box<[WaitCell]>,
}

impl SharedArena {
    /// Allocate a zero-filled arena. Capacity is fixed for the arena's
    /// lifetime.
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            framebuffer: (0..config.framebuffer_bytes).map(|_| AtomicU8::new(0)).collect(),
            cells: (0..config.wait_cells).map(|_| WaitCell::new()).collect(),
        }
    }

    /// Framebuffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.framebuffer.len()
    }

    /// Number of wait cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Borrow a wait cell, or `None` when `index` is out of range.
    pub fn cell(&self, index: usize) -> Option<&WaitCell> {
        self.cells.get(index)
    }

    /// Notify cell `index` with `value`. Returns `false` for an out-of-range
    /// index.
    pub fn notify(&self, index: usize, value: i32) -> bool {
        match self.cells.get(index) {
            Some(cell) => {
                cell.notify(value);
                true
            }
            None => false,
        }
    }

    /// Copy `len` framebuffer bytes starting at `offset`. Non-blocking and
    /// safe concurrently with in-flight writes. Ranges reaching past the
    /// framebuffer are truncated to the bytes that exist.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        let start = offset.min(self.framebuffer.len());
        let end = offset.saturating_add(len).min(self.framebuffer.len());
        self.framebuffer[start..end]
            .iter()
            .map(|byte| byte.load(Ordering::Relaxed))
            .collect()
    }

    /// Publish `bytes` at `offset`. Callers must hold exclusive logical
    /// ownership of the target range (each worker owns its region).
    pub(crate) fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        for (slot, byte) in self.framebuffer[offset..offset + bytes.len()].iter().zip(bytes) {
            slot.store(*byte, Ordering::Relaxed);
        }
    }

    /// Reset `len` bytes at `offset` to the initialization value.
    pub(crate) fn zero_bytes(&self, offset: usize, len: usize) {
        for slot in &self.framebuffer[offset..offset + len] {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for SharedArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedArena")
            .field("capacity", &self.capacity())
            .field("cells", &self.cell_count())
            .finish()
    }
}
