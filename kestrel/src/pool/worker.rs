//! Worker thread implementation.
//!
//! Each worker is a dedicated OS thread owning one task queue. It completes a
//! bootstrap handshake, then loops over a closed message enum until told to
//! shut down or its queue is dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use flume::Receiver;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use kestrel_api::{FrameParams, Region, RenderKernel};

use crate::arena::SharedArena;
use crate::handle::RenderState;

/// Messages accepted by a worker thread, exhaustively matched in its loop.
pub(crate) enum WorkerMessage {
    Render(RenderTask),
    Shutdown,
}

/// Immutable task descriptor: one region of one render. Created by the
/// dispatcher, consumed exactly once by one worker.
pub(crate) struct RenderTask {
    pub(crate) region: Region,
    pub(crate) frame: FrameParams,
    pub(crate) arena: Arc<SharedArena>,
    pub(crate) state: Arc<RenderState>,
}

/// Entry point of a worker thread.
///
/// Signals readiness over `ready` (the bootstrap handshake), then serves
/// tasks. After every render the worker reports its id on `done` so the pool
/// can return it to the idle set.
pub(crate) fn worker_main(
    id: usize,
    tasks: Receiver<WorkerMessage>,
    kernel: Arc<dyn RenderKernel>,
    ready: oneshot::Sender<()>,
    done: mpsc::UnboundedSender<usize>,
) {
    if ready.send(()).is_err() {
        // The pool gave up on the handshake.
        return;
    }
    debug!(worker = id, "worker online");
    loop {
        match tasks.recv() {
            Ok(WorkerMessage::Render(task)) => {
                run_task(id, kernel.as_ref(), task);
                let _ = done.send(id);
            }
            Ok(WorkerMessage::Shutdown) | Err(_) => break,
        }
    }
    debug!(worker = id, "worker shut down");
}

fn run_task(id: usize, kernel: &dyn RenderKernel, task: RenderTask) {
    if task.state.is_cancelled() {
        trace!(worker = id, region = ?task.region, "skipping cancelled task");
        return;
    }

    let row_bytes = task.frame.row_bytes();
    let offset = task.region.start as usize * row_bytes;
    let len = task.region.rows() as usize * row_bytes;
    if len == 0 {
        task.state.complete_tile();
        return;
    }

    trace!(worker = id, region = ?task.region, "rendering region");
    let mut scratch = vec![0u8; len];
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        kernel.render(task.region, &task.frame, &mut scratch)
    }));
    match result {
        Ok(Ok(())) => {
            // Cancellation observed at the publish point leaves the region at
            // its initialization value.
            if task.state.is_cancelled() {
                trace!(worker = id, region = ?task.region, "discarding cancelled region");
                return;
            }
            task.arena.write_bytes(offset, &scratch);
            task.state.complete_tile();
        }
        Ok(Err(err)) => task.state.fail(err.to_string()),
        Err(payload) => task.state.fail(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        format!("kernel panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        format!("kernel panicked: {message}")
    } else {
        "kernel panicked".to_string()
    }
}
