//! # Kestrel
//!
//! A shared-memory parallel rendering runtime: a growable pool of persistent
//! worker threads renders disjoint row regions of a frame directly into one
//! shared framebuffer, while the caller observes progress through snapshots
//! and awaits completion without blocking.
//!
//! ## Core pieces
//! - [`SharedArena`]: the framebuffer and wait cells shared by a pool.
//! - [`WorkerPool`]: create / acquire / release / destroy persistent workers.
//! - [`dispatch`](dispatch::dispatch): partition a frame and fan it out.
//! - [`RenderingHandle`]: await completion, poll progress, snapshot pixels.
//! - [`AtomicWaitBridge`]: async waits on shared cells, with a delegated
//!   helper-thread fallback.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use kestrel::{FrameParams, PoolConfig, WorkerPool};
//! # use kestrel::{KernelError, Region, RenderKernel};
//! # struct Black;
//! # impl RenderKernel for Black {
//! #     fn render(&self, _: Region, _: &FrameParams, _: &mut [u8]) -> Result<(), KernelError> {
//! #         Ok(())
//! #     }
//! # }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let pool = WorkerPool::create(PoolConfig::default(), Arc::new(Black)).await?;
//! let frame = FrameParams { width: 640, height: 480, seed: 42 };
//! let handle = pool.render(frame, 4).await?;
//! handle.completed().await?;
//! let pixels = handle.snapshot();
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod logging;
pub mod pool;

pub use arena::{SharedArena, WaitCell};
pub use bridge::{AtomicWaitBridge, WaitOutcome};
pub use config::{
    delegated_wait_forced, ArenaConfig, BridgeConfig, PoolConfig, DEFAULT_HELPER_CACHE_SIZE,
    FORCE_DELEGATED_ENV,
};
pub use dispatch::{dispatch, partition};
pub use error::{
    AcquireError, BridgeError, DispatchError, ReleaseError, RenderError, SpawnError,
};
pub use handle::RenderingHandle;
pub use pool::{PoolMetrics, WorkerHandle, WorkerPool};

pub use kestrel_api::{FrameParams, KernelError, Region, RenderKernel, BYTES_PER_PIXEL};
