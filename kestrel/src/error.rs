use std::time::Duration;
use thiserror::Error;

/// Errors raised while spawning a worker thread.
///
/// Fatal to the `create`/`acquire` call that triggered the spawn, not to the
/// rest of the pool.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("failed to spawn worker thread: {0}")]
    Thread(#[from] std::io::Error),
    #[error("worker bootstrap handshake failed: {0}")]
    Handshake(String),
    #[error("worker bootstrap handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("worker pool was destroyed while spawning")]
    PoolDestroyed,
}

/// Errors raised by `WorkerPool::acquire`.
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("worker pool has been destroyed")]
    Destroyed,
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Errors raised by `WorkerPool::release`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    /// The handle was not issued by this pool.
    #[error("handle was not issued by this pool")]
    NotOwned,
    #[error("worker pool has been destroyed")]
    Destroyed,
}

/// Errors raised while dispatching a render.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("frame needs {needed} bytes but the arena holds {capacity}")]
    FrameTooLarge { needed: usize, capacity: usize },
    #[error("worker {id} is gone; its task queue is closed")]
    WorkerLost { id: usize },
    #[error(transparent)]
    Acquire(#[from] AcquireError),
}

/// Terminal failure of a render, observed through
/// `RenderingHandle::completed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A worker's kernel reported an error (or panicked) mid-task. Sibling
    /// regions were not awaited; already-published bytes stay readable.
    #[error("render task failed: {message}")]
    Task { message: String },
    /// The pool was destroyed while tiles were outstanding.
    #[error("render cancelled: pool destroyed while tasks were outstanding")]
    Cancelled,
}

/// Errors raised by the atomic wait bridge.
///
/// Infrastructure failures are reported distinctly from `TimedOut` so callers
/// never mistake them for a benign timeout.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to spawn wait helper thread: {0}")]
    HelperSpawn(std::io::Error),
    #[error("cell index {index} out of range ({cells} cells)")]
    CellOutOfBounds { index: usize, cells: usize },
    #[error("wait helper exited before replying")]
    HelperLost,
}
