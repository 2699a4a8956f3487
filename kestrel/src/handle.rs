//! Render completion tracking: the remaining-tile counter, the one-shot
//! completion signal, and the caller-facing [`RenderingHandle`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::error;

use kestrel_api::FrameParams;

use crate::arena::SharedArena;
use crate::error::RenderError;

/// Terminal state of one render. Reached exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RenderOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Shared coordination state for one dispatched render.
///
/// Workers decrement `remaining` once per completed tile; whichever worker
/// observes the 1 -> 0 transition fires the completion signal. Failure and
/// cancellation race against completion through the same guarded one-shot
/// slot, so every handle terminates exactly once.
pub(crate) struct RenderState {
    remaining: AtomicUsize,
    cancelled: AtomicBool,
    outcome: Mutex<Option<RenderOutcome>>,
    signal: Notify,
}

impl RenderState {
    pub(crate) fn new(tiles: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(tiles),
            cancelled: AtomicBool::new(false),
            outcome: Mutex::new(None),
            signal: Notify::new(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Record one finished tile. The single atomic read-modify-write keeps
    /// concurrent completions from losing updates.
    pub(crate) fn complete_tile(&self) {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "remaining counter underflow");
        if previous == 1 {
            self.fire(RenderOutcome::Completed);
        }
    }

    /// Report a task failure. The render terminates immediately; sibling
    /// tiles are not awaited.
    pub(crate) fn fail(&self, message: String) {
        error!(%message, "render task failed");
        self.fire(RenderOutcome::Failed(message));
    }

    /// Cancel the render. Tasks not yet started observe the flag and leave
    /// their regions untouched.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.fire(RenderOutcome::Cancelled);
    }

    /// Set the terminal outcome, first caller wins. Returns whether this call
    /// fired the signal.
    fn fire(&self, outcome: RenderOutcome) -> bool {
        {
            let mut slot = self.outcome.lock().unwrap();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        self.signal.notify_waiters();
        true
    }

    /// Await the terminal outcome. Any number of callers may wait; each
    /// observes the same outcome.
    pub(crate) async fn wait(&self) -> RenderOutcome {
        loop {
            let notified = self.signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.outcome.lock().unwrap().clone() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// Caller-facing view of one in-flight (or finished) render.
///
/// Cloneable; all clones observe the same terminal outcome. Holding a handle
/// keeps the arena alive but does not keep the pool alive; destroying the
/// pool transitions every pending handle to [`RenderError::Cancelled`].
#[derive(Clone)]
pub struct RenderingHandle {
    state: Arc<RenderState>,
    arena: Arc<SharedArena>,
    frame: FrameParams,
}

impl RenderingHandle {
    pub(crate) fn new(state: Arc<RenderState>, arena: Arc<SharedArena>, frame: FrameParams) -> Self {
        Self { state, arena, frame }
    }

    /// Resolve once when every tile has completed, or reject once on the
    /// first task failure or on pool destruction.
    pub async fn completed(&self) -> Result<(), RenderError> {
        match self.state.wait().await {
            RenderOutcome::Completed => Ok(()),
            RenderOutcome::Failed(message) => Err(RenderError::Task { message }),
            RenderOutcome::Cancelled => Err(RenderError::Cancelled),
        }
    }

    /// Copy the frame's bytes out of the shared framebuffer.
    ///
    /// Never blocks and never errors; regions not yet published read as
    /// zero. This is an approximation of in-flight progress, not a
    /// transactional read.
    pub fn snapshot(&self) -> Vec<u8> {
        self.arena.read_bytes(0, self.frame.byte_len())
    }

    /// Tiles still outstanding.
    pub fn remaining(&self) -> usize {
        self.state.remaining()
    }

    /// The dispatched frame's parameters.
    pub fn frame(&self) -> &FrameParams {
        &self.frame
    }
}

impl std::fmt::Debug for RenderingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingHandle")
            .field("frame", &self.frame)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_fires_exactly_once() {
        let state = RenderState::new(1);
        assert!(state.fire(RenderOutcome::Completed));
        assert!(!state.fire(RenderOutcome::Failed("late".into())));
        assert_eq!(*state.outcome.lock().unwrap(), Some(RenderOutcome::Completed));
    }

    #[test]
    fn last_tile_completes_the_render() {
        let state = RenderState::new(2);
        state.complete_tile();
        assert!(state.outcome.lock().unwrap().is_none());
        state.complete_tile();
        assert_eq!(*state.outcome.lock().unwrap(), Some(RenderOutcome::Completed));
    }

    #[tokio::test]
    async fn waiters_see_outcome_set_before_and_after() {
        let state = Arc::new(RenderState::new(1));
        state.cancel();
        assert_eq!(state.wait().await, RenderOutcome::Cancelled);

        let fresh = Arc::new(RenderState::new(1));
        let waiter = {
            let fresh = Arc::clone(&fresh);
            tokio::spawn(async move { fresh.wait().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        fresh.complete_tile();
        assert_eq!(waiter.await.unwrap(), RenderOutcome::Completed);
    }
}
