//! # Worker Pool
//!
//! Manages a growable set of persistent worker threads sharing one memory
//! arena. Workers are expensive to create (thread spawn plus bootstrap
//! handshake), so the pool amortizes the cost: a worker, once created, is
//! never discarded until the whole pool is destroyed, and the total count
//! never decreases.
//!
//! ## Handle discipline
//! - `acquire` moves a [`WorkerHandle`] out of the FIFO idle set (or spawns),
//!   giving the caller exclusive use of that worker.
//! - `release` moves it back; handles from another pool are rejected.
//! - Handles given to the dispatcher are parked busy and returned to the idle
//!   set automatically when the worker reports its task done.
//!
//! ## Destruction
//! `destroy` is synchronous and non-blocking: it cancels outstanding renders,
//! signals `Shutdown` to every worker (a busy worker finishes its current
//! message first), and invalidates every handle. It also runs on drop.

mod worker;

pub(crate) use worker::{RenderTask, WorkerMessage};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use flume::Sender;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use kestrel_api::RenderKernel;

use crate::arena::SharedArena;
use crate::config::PoolConfig;
use crate::error::{AcquireError, ReleaseError, SpawnError};
use crate::handle::RenderState;

/// Exclusive grant on one persistent worker.
///
/// Exactly one caller holds a given handle at a time. Dropping a handle
/// without releasing it strands the worker until the pool is destroyed;
/// prefer `release` (or dispatch, which returns workers automatically).
pub struct WorkerHandle {
    id: usize,
    pool: Uuid,
    tasks: Sender<WorkerMessage>,
}

impl WorkerHandle {
    /// Pool-local identity of the underlying worker.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle").field("id", &self.id).field("pool", &self.pool).finish()
    }
}

/// Point-in-time view of the pool, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Workers ever spawned; monotonic for the pool's lifetime.
    pub total_workers: usize,
    pub idle_workers: usize,
    pub busy_workers: usize,
    pub destroyed: bool,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<WorkerHandle>,
    busy: HashMap<usize, WorkerHandle>,
    /// Every live worker's task queue, busy or idle; used for shutdown.
    senders: HashMap<usize, Sender<WorkerMessage>>,
    /// Outstanding renders, cancelled when the pool is destroyed.
    renders: Vec<Weak<RenderState>>,
    next_worker: usize,
    total: usize,
    destroyed: bool,
}

struct PoolShared {
    id: Uuid,
    config: PoolConfig,
    kernel: Arc<dyn RenderKernel>,
    arena: Arc<SharedArena>,
    state: Mutex<PoolState>,
    done_tx: mpsc::UnboundedSender<usize>,
}

/// A growable pool of persistent worker threads sharing one arena.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Create a pool and eagerly spawn `config.initial_workers` workers.
    ///
    /// Each spawn completes a bootstrap handshake before the worker is
    /// usable. On partial failure the already-spawned workers are torn down
    /// and the single failure is reported.
    pub async fn create(
        config: PoolConfig,
        kernel: Arc<dyn RenderKernel>,
    ) -> Result<Self, SpawnError> {
        let arena = Arc::new(SharedArena::new(&config.arena));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(PoolShared {
            id: Uuid::new_v4(),
            config,
            kernel,
            arena,
            state: Mutex::new(PoolState::default()),
            done_tx,
        });
        tokio::spawn(reap_finished(Arc::downgrade(&shared), done_rx));

        let pool = Self { shared };
        let initial = pool.shared.config.initial_workers;
        for _ in 0..initial {
            match pool.shared.spawn_worker().await {
                Ok(handle) => pool.shared.state.lock().unwrap().idle.push_back(handle),
                Err(err) => {
                    pool.destroy();
                    return Err(err);
                }
            }
        }
        info!(pool = %pool.shared.id, workers = initial, "worker pool created");
        Ok(pool)
    }

    /// Take an idle worker, longest-idle first, or grow the pool by one.
    ///
    /// One uniform async contract covers both paths; callers cannot tell an
    /// already-idle worker from a freshly spawned one except in latency.
    pub async fn acquire(&self) -> Result<WorkerHandle, AcquireError> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.destroyed {
                return Err(AcquireError::Destroyed);
            }
            if let Some(handle) = state.idle.pop_front() {
                debug!(pool = %self.shared.id, worker = handle.id, "acquired idle worker");
                return Ok(handle);
            }
        }
        match self.shared.spawn_worker().await {
            Ok(handle) => Ok(handle),
            Err(SpawnError::PoolDestroyed) => Err(AcquireError::Destroyed),
            Err(err) => Err(err.into()),
        }
    }

    /// Return a busy handle to the idle set.
    pub fn release(&self, handle: WorkerHandle) -> Result<(), ReleaseError> {
        let mut state = self.shared.state.lock().unwrap();
        if state.destroyed {
            return Err(ReleaseError::Destroyed);
        }
        if handle.pool != self.shared.id || !state.senders.contains_key(&handle.id) {
            return Err(ReleaseError::NotOwned);
        }
        debug!(pool = %self.shared.id, worker = handle.id, "released worker");
        state.idle.push_back(handle);
        Ok(())
    }

    /// Terminate every worker and invalidate the pool.
    ///
    /// Non-blocking: workers drain their current message and exit; renders
    /// still pending against this pool's arena terminate `Cancelled`.
    /// Idempotent, and also invoked on drop.
    pub fn destroy(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        for weak in state.renders.drain(..) {
            if let Some(render) = weak.upgrade() {
                render.cancel();
            }
        }
        for (_, sender) in state.senders.drain() {
            let _ = sender.send(WorkerMessage::Shutdown);
        }
        state.idle.clear();
        state.busy.clear();
        info!(pool = %self.shared.id, total = state.total, "worker pool destroyed");
    }

    /// Total workers ever spawned. Never decreases while the pool lives.
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().unwrap().total
    }

    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().unwrap().idle.len()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.state.lock().unwrap();
        PoolMetrics {
            total_workers: state.total,
            idle_workers: state.idle.len(),
            busy_workers: state.busy.len(),
            destroyed: state.destroyed,
        }
    }

    /// The arena shared by this pool's workers.
    pub fn arena(&self) -> &Arc<SharedArena> {
        &self.shared.arena
    }

    /// Park a handle busy and submit a message to its worker. The handle is
    /// parked before the send so a fast worker's done notification always
    /// finds it in the busy map; the reaper returns it to the idle set.
    ///
    /// On a closed queue the worker is gone for good, so the handle is
    /// unparked and dropped rather than recycled.
    pub(crate) fn submit_busy(&self, handle: WorkerHandle, message: WorkerMessage) -> Result<(), ()> {
        let id = handle.id;
        let sender = handle.tasks.clone();
        self.shared.state.lock().unwrap().busy.insert(id, handle);
        if sender.send(message).is_err() {
            self.shared.state.lock().unwrap().busy.remove(&id);
            return Err(());
        }
        Ok(())
    }

    /// Track a render for cancellation on destroy. A render registered after
    /// destruction is cancelled on the spot, so no handle can miss the
    /// destroy notification by racing it.
    pub(crate) fn register_render(&self, render: &Arc<RenderState>) {
        {
            let mut state = self.shared.state.lock().unwrap();
            if !state.destroyed {
                state.renders.retain(|weak| weak.strong_count() > 0);
                state.renders.push(Arc::downgrade(render));
                return;
            }
        }
        render.cancel();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let metrics = self.metrics();
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("metrics", &metrics)
            .finish()
    }
}

impl PoolShared {
    /// Spawn one worker and await its bootstrap handshake.
    async fn spawn_worker(self: &Arc<Self>) -> Result<WorkerHandle, SpawnError> {
        let (id, name) = {
            let mut state = self.state.lock().unwrap();
            if state.destroyed {
                return Err(SpawnError::PoolDestroyed);
            }
            let id = state.next_worker;
            state.next_worker += 1;
            (id, format!("{}-{}", self.config.thread_name_prefix, id))
        };

        let (task_tx, task_rx) = flume::unbounded();
        let (ready_tx, ready_rx) = oneshot::channel();
        let kernel = Arc::clone(&self.kernel);
        let done = self.done_tx.clone();
        std::thread::Builder::new()
            .name(name)
            .spawn(move || worker::worker_main(id, task_rx, kernel, ready_tx, done))?;

        match timeout(self.config.handshake_timeout, ready_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(SpawnError::Handshake(
                    "worker exited before signalling readiness".to_string(),
                ));
            }
            Err(_) => {
                // Tell the late worker to exit if it ever comes up.
                let _ = task_tx.send(WorkerMessage::Shutdown);
                return Err(SpawnError::HandshakeTimeout(self.config.handshake_timeout));
            }
        }

        let mut state = self.state.lock().unwrap();
        if state.destroyed {
            let _ = task_tx.send(WorkerMessage::Shutdown);
            return Err(SpawnError::PoolDestroyed);
        }
        state.total += 1;
        state.senders.insert(id, task_tx.clone());
        debug!(pool = %self.id, worker = id, total = state.total, "worker spawned");
        Ok(WorkerHandle { id, pool: self.id, tasks: task_tx })
    }
}


/// Returns workers to the idle set as they report finished tasks.
///
/// Holds only a weak pool reference so it cannot keep a dropped pool alive;
/// it exits when the pool is gone or every worker's done-sender is dropped.
async fn reap_finished(pool: Weak<PoolShared>, mut done_rx: mpsc::UnboundedReceiver<usize>) {
    while let Some(id) = done_rx.recv().await {
        let Some(shared) = pool.upgrade() else {
            break;
        };
        let mut state = shared.state.lock().unwrap();
        if let Some(handle) = state.busy.remove(&id) {
            if !state.destroyed {
                state.idle.push_back(handle);
            }
        }
    }
}
