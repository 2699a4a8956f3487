//! # Atomic Wait Bridge
//!
//! Lets the non-blocking coordinator await a [`WaitCell`](crate::arena::WaitCell)
//! without ever blocking its thread. The preferred path is the cell's native
//! async wait; when configuration (or the `KESTREL_FORCE_DELEGATED_WAIT`
//! environment override) rules it out, the wait is delegated to a dedicated
//! helper thread that performs the blocking wait and reports back over a
//! one-shot channel.
//!
//! Helper threads are cached for reuse up to `helper_cache_size`; waits beyond
//! the cache spawn fresh helpers that are torn down after one use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::Receiver;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::arena::SharedArena;
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// How a wait on a shared cell resolved. Exactly one of the three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The cell held the expected value and a notify arrived.
    EqualResumed,
    /// The cell already held a different value; no waiting happened.
    NotEqual,
    /// The timeout elapsed before any notify.
    TimedOut,
}

/// One delegated wait, handed to a helper thread.
struct WaitRequest {
    arena: Arc<SharedArena>,
    cell: usize,
    expected: i32,
    timeout: Option<Duration>,
    reply: oneshot::Sender<WaitOutcome>,
}

/// A cached helper thread, identified by the sending half of its request
/// queue. Dropping the sender terminates the helper.
struct Helper {
    requests: flume::Sender<WaitRequest>,
}

/// Bridges async callers onto blocking cell waits.
///
/// Cheap to share behind an `Arc`; all state is the helper cache. The bridge
/// holds no arena reference of its own; each wait names the arena it targets,
/// so one bridge can serve any number of pools.
pub struct AtomicWaitBridge {
    config: BridgeConfig,
    helpers: Mutex<Vec<Helper>>,
    spawned: AtomicUsize,
}

impl AtomicWaitBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config, helpers: Mutex::new(Vec::new()), spawned: AtomicUsize::new(0) }
    }

    /// Await cell `cell` of `arena` leaving the expected value, without
    /// blocking the calling thread.
    ///
    /// Resolves `NotEqual` immediately when the value already differs, before
    /// any helper is engaged. `timeout: None` waits indefinitely.
    pub async fn wait(
        &self,
        arena: &Arc<SharedArena>,
        cell: usize,
        expected: i32,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, BridgeError> {
        let Some(target) = arena.cell(cell) else {
            return Err(BridgeError::CellOutOfBounds { index: cell, cells: arena.cell_count() });
        };

        // Cheapest resolution first: no suspension, no helper.
        if target.load() != expected {
            return Ok(WaitOutcome::NotEqual);
        }

        if !self.config.force_delegated {
            return Ok(target.wait_async(expected, timeout).await);
        }
        self.wait_delegated(arena, cell, expected, timeout).await
    }

    /// Idle helpers currently cached for reuse.
    pub fn idle_helpers(&self) -> usize {
        self.helpers.lock().unwrap().len()
    }

    async fn wait_delegated(
        &self,
        arena: &Arc<SharedArena>,
        cell: usize,
        expected: i32,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, BridgeError> {
        let helper = self.checkout_helper()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = WaitRequest {
            arena: Arc::clone(arena),
            cell,
            expected,
            timeout,
            reply: reply_tx,
        };
        if helper.requests.send(request).is_err() {
            return Err(BridgeError::HelperLost);
        }

        let started = Instant::now();
        let outcome = reply_rx.await.map_err(|_| BridgeError::HelperLost)?;
        if let Some(threshold) = self.config.long_wait_warning {
            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!(cell, ?elapsed, "delegated wait took unusually long");
            }
        }
        self.checkin_helper(helper);
        Ok(outcome)
    }

    fn checkout_helper(&self) -> Result<Helper, BridgeError> {
        if let Some(helper) = self.helpers.lock().unwrap().pop() {
            trace!("reusing cached wait helper");
            return Ok(helper);
        }
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        let (request_tx, request_rx) = flume::unbounded();
        std::thread::Builder::new()
            .name(format!("{}-{}", self.config.helper_name_prefix, id))
            .spawn(move || helper_main(request_rx))
            .map_err(BridgeError::HelperSpawn)?;
        debug!(helper = id, "spawned wait helper");
        Ok(Helper { requests: request_tx })
    }

    /// Return a helper to the cache, or drop it (terminating its thread) when
    /// the cache is full.
    fn checkin_helper(&self, helper: Helper) {
        let mut helpers = self.helpers.lock().unwrap();
        if helpers.len() < self.config.helper_cache_size {
            helpers.push(helper);
        }
    }
}

impl Default for AtomicWaitBridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl std::fmt::Debug for AtomicWaitBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicWaitBridge")
            .field("idle_helpers", &self.idle_helpers())
            .field("force_delegated", &self.config.force_delegated)
            .finish()
    }
}

/// Helper thread loop: serve blocking waits until the request queue closes.
fn helper_main(requests: Receiver<WaitRequest>) {
    while let Ok(request) = requests.recv() {
        let outcome = match request.arena.cell(request.cell) {
            Some(cell) => cell.wait_blocking(request.expected, request.timeout),
            // The bridge bounds-checks before delegating; a stale index here
            // means the caller raced an arena swap it should not have made.
            None => WaitOutcome::NotEqual,
        };
        // The caller may have given up; nothing to do about a closed reply.
        let _ = request.reply.send(outcome);
    }
}
