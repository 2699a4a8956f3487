//! # Task Dispatcher
//!
//! Splits a frame into disjoint row regions, acquires one worker per region
//! (growing the pool as needed), and submits one immutable task per
//! (region, worker) pair. Dispatch returns a [`RenderingHandle`] immediately
//! and never waits for completion.

use std::sync::Arc;

use tracing::debug;

use kestrel_api::{FrameParams, Region};

use crate::error::DispatchError;
use crate::handle::{RenderState, RenderingHandle};
use crate::pool::{RenderTask, WorkerMessage, WorkerPool};

/// Split `extent` rows into `parts` disjoint contiguous regions.
///
/// Every region gets `extent / parts` rows except the last, which absorbs
/// the remainder. The union covers every row exactly once.
pub fn partition(extent: u32, parts: usize) -> Vec<Region> {
    debug_assert!(parts > 0, "partition requires at least one part");
    let share = extent / parts as u32;
    (0..parts)
        .map(|index| {
            let start = index as u32 * share;
            let end = if index == parts - 1 { extent } else { start + share };
            Region { start, end }
        })
        .collect()
}

/// Dispatch `frame` across `concurrency` workers of `pool`.
///
/// Regions are assigned in ascending order, matched to workers in idle-queue
/// order; there is no affinity or rebalancing after dispatch. The frame's
/// byte range is reset to zero before any task is submitted, so an early
/// snapshot reads the documented initialization value.
pub async fn dispatch(
    pool: &WorkerPool,
    frame: FrameParams,
    concurrency: usize,
) -> Result<RenderingHandle, DispatchError> {
    if concurrency == 0 {
        return Err(DispatchError::ZeroConcurrency);
    }
    let arena = Arc::clone(pool.arena());
    let needed = frame.byte_len();
    if needed > arena.capacity() {
        return Err(DispatchError::FrameTooLarge { needed, capacity: arena.capacity() });
    }

    // Acquire every worker before sending any task, releasing them all if
    // growth fails partway.
    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        match pool.acquire().await {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                for handle in handles {
                    let _ = pool.release(handle);
                }
                return Err(err.into());
            }
        }
    }

    arena.zero_bytes(0, needed);
    let state = Arc::new(RenderState::new(concurrency));
    pool.register_render(&state);

    let mut pairs = partition(frame.height, concurrency).into_iter().zip(handles);
    while let Some((region, handle)) = pairs.next() {
        let id = handle.id();
        let task = RenderTask {
            region,
            frame,
            arena: Arc::clone(&arena),
            state: Arc::clone(&state),
        };
        if pool.submit_busy(handle, WorkerMessage::Render(task)).is_err() {
            state.fail(format!("worker {id} queue closed before dispatch"));
            for (_, unused) in pairs {
                let _ = pool.release(unused);
            }
            return Err(DispatchError::WorkerLost { id });
        }
        debug!(worker = id, ?region, "task dispatched");
    }

    Ok(RenderingHandle::new(state, arena, frame))
}

impl WorkerPool {
    /// Render `frame` with the given concurrency. Convenience wrapper over
    /// [`dispatch`].
    pub async fn render(
        &self,
        frame: FrameParams,
        concurrency: usize,
    ) -> Result<RenderingHandle, DispatchError> {
        dispatch(self, frame, concurrency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(extent: u32, regions: &[Region]) {
        let mut next = 0;
        for region in regions {
            assert_eq!(region.start, next, "regions must be contiguous");
            assert!(region.end >= region.start);
            next = region.end;
        }
        assert_eq!(next, extent, "regions must cover the extent");
    }

    #[test]
    fn even_split_has_equal_regions() {
        let regions = partition(400, 4);
        assert_eq!(
            regions,
            vec![
                Region { start: 0, end: 100 },
                Region { start: 100, end: 200 },
                Region { start: 200, end: 300 },
                Region { start: 300, end: 400 },
            ]
        );
        assert_exact_cover(400, &regions);
    }

    #[test]
    fn last_region_absorbs_remainder() {
        let regions = partition(10, 3);
        assert_eq!(regions[0], Region { start: 0, end: 3 });
        assert_eq!(regions[1], Region { start: 3, end: 6 });
        assert_eq!(regions[2], Region { start: 6, end: 10 });
        assert_exact_cover(10, &regions);
    }

    #[test]
    fn more_parts_than_rows_yields_empty_regions() {
        let regions = partition(2, 4);
        assert_eq!(regions.len(), 4);
        assert!(regions[0].is_empty());
        assert_eq!(regions[3], Region { start: 0, end: 2 });
        let total: u32 = regions.iter().map(Region::rows).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn single_part_takes_everything() {
        let regions = partition(137, 1);
        assert_eq!(regions, vec![Region { start: 0, end: 137 }]);
    }
}
