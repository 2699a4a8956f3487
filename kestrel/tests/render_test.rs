//! End-to-end render tests: dispatch, progress observation, failure
//! propagation, and cancellation on pool destruction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kestrel::{
    ArenaConfig, DispatchError, FrameParams, KernelError, PoolConfig, Region, RenderError,
    RenderKernel, WorkerPool, BYTES_PER_PIXEL,
};

fn small_config() -> PoolConfig {
    PoolConfig {
        initial_workers: 0,
        arena: ArenaConfig { framebuffer_bytes: 64 * 1024, wait_cells: 4 },
        ..Default::default()
    }
}

/// Poll until `cond` holds, or panic after two seconds.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within deadline");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Writes a deterministic per-pixel pattern so tests can verify placement.
struct GradientKernel;

impl RenderKernel for GradientKernel {
    fn render(&self, region: Region, frame: &FrameParams, out: &mut [u8]) -> Result<(), KernelError> {
        let row_bytes = frame.row_bytes();
        for y in region.start..region.end {
            let row = &mut out[(y - region.start) as usize * row_bytes..][..row_bytes];
            for x in 0..frame.width {
                let pixel = &mut row[x as usize * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                pixel.copy_from_slice(&[x as u8, y as u8, frame.seed as u8, 0xff]);
            }
        }
        Ok(())
    }
}

fn expected_pixel(x: u32, y: u32, seed: u64) -> [u8; 4] {
    [x as u8, y as u8, seed as u8, 0xff]
}

fn pixel_at(snapshot: &[u8], frame: &FrameParams, x: u32, y: u32) -> [u8; 4] {
    let offset = y as usize * frame.row_bytes() + x as usize * BYTES_PER_PIXEL;
    snapshot[offset..offset + BYTES_PER_PIXEL].try_into().unwrap()
}

/// Blocks each listed region on a gate channel before touching the output;
/// ungated regions render a solid fill immediately.
struct GatedKernel {
    gates: HashMap<u32, flume::Receiver<()>>,
    fill: u8,
    fail_gated: bool,
}

impl RenderKernel for GatedKernel {
    fn render(&self, region: Region, _: &FrameParams, out: &mut [u8]) -> Result<(), KernelError> {
        if let Some(gate) = self.gates.get(&region.start) {
            let _ = gate.recv();
            if self.fail_gated {
                return Err(KernelError::Failed(format!(
                    "injected failure in region starting at row {}",
                    region.start
                )));
            }
        }
        out.fill(self.fill);
        Ok(())
    }
}

#[tokio::test]
async fn render_covers_the_whole_frame() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    let frame = FrameParams { width: 8, height: 400, seed: 3 };

    let handle = pool.render(frame, 4).await.unwrap();
    assert_eq!(pool.worker_count(), 4);

    handle.completed().await.unwrap();
    assert_eq!(handle.remaining(), 0);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.len(), frame.byte_len());
    // Spot-check one pixel per region plus the frame corners.
    for (x, y) in [(0, 0), (7, 99), (3, 100), (5, 250), (2, 399)] {
        assert_eq!(pixel_at(&snapshot, &frame, x, y), expected_pixel(x, y, frame.seed));
    }
}

#[tokio::test]
async fn snapshot_before_completion_reads_zero() {
    let (open_a, gate_a) = flume::unbounded();
    let (open_b, gate_b) = flume::unbounded();
    let kernel = GatedKernel {
        gates: HashMap::from([(0, gate_a), (50, gate_b)]),
        fill: 0x11,
        fail_gated: false,
    };
    let pool = WorkerPool::create(small_config(), Arc::new(kernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 100, seed: 0 };

    let handle = pool.render(frame, 2).await.unwrap();
    assert_eq!(handle.remaining(), 2);
    assert_eq!(handle.snapshot(), vec![0u8; frame.byte_len()]);

    open_a.send(()).unwrap();
    open_b.send(()).unwrap();
    handle.completed().await.unwrap();
    assert_eq!(handle.snapshot(), vec![0x11u8; frame.byte_len()]);
}

#[tokio::test]
async fn task_failure_rejects_but_keeps_published_regions() {
    let (open, gate) = flume::unbounded();
    let kernel = GatedKernel {
        gates: HashMap::from([(100, gate)]),
        fill: 0x2a,
        fail_gated: true,
    };
    let pool = WorkerPool::create(small_config(), Arc::new(kernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 200, seed: 0 };

    let handle = pool.render(frame, 2).await.unwrap();
    // Let the ungated region land first.
    let progress = handle.clone();
    wait_until(move || progress.remaining() == 1).await;

    open.send(()).unwrap();
    let err = handle.completed().await.unwrap_err();
    assert!(matches!(err, RenderError::Task { .. }));

    // The first region's bytes survived the failure of its sibling.
    let snapshot = handle.snapshot();
    let half = frame.byte_len() / 2;
    assert_eq!(&snapshot[..half], vec![0x2au8; half].as_slice());
    assert_eq!(&snapshot[half..], vec![0u8; half].as_slice());
}

#[tokio::test]
async fn every_awaiter_observes_the_same_outcome() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 40, seed: 1 };
    let handle = pool.render(frame, 4).await.unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.completed().await })
        })
        .collect();
    for waiter in waiters {
        assert!(waiter.await.unwrap().is_ok());
    }
    // Late awaiters resolve immediately with the stored outcome.
    assert!(handle.completed().await.is_ok());
}

#[tokio::test]
async fn destroy_cancels_pending_regions_without_publishing() {
    let (open_c, gate_c) = flume::unbounded();
    let (open_d, gate_d) = flume::unbounded();
    let kernel = GatedKernel {
        gates: HashMap::from([(200, gate_c), (300, gate_d)]),
        fill: 0x11,
        fail_gated: false,
    };
    let pool = WorkerPool::create(small_config(), Arc::new(kernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 400, seed: 0 };

    let handle = pool.render(frame, 4).await.unwrap();
    let progress = handle.clone();
    wait_until(move || progress.remaining() == 2).await;

    pool.destroy();
    assert_eq!(handle.completed().await, Err(RenderError::Cancelled));

    // Unblock the two still-running workers; their output must be discarded.
    open_c.send(()).unwrap();
    open_d.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = handle.snapshot();
    let half = frame.byte_len() / 2;
    assert_eq!(&snapshot[..half], vec![0x11u8; half].as_slice());
    assert_eq!(&snapshot[half..], vec![0u8; half].as_slice());
}

#[tokio::test]
async fn dispatch_rejects_zero_concurrency() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 4, seed: 0 };
    assert!(matches!(pool.render(frame, 0).await, Err(DispatchError::ZeroConcurrency)));
    assert_eq!(pool.worker_count(), 0);
}

#[tokio::test]
async fn dispatch_rejects_oversized_frames() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    let frame = FrameParams { width: 1024, height: 1024, seed: 0 };
    match pool.render(frame, 2).await {
        Err(DispatchError::FrameTooLarge { needed, capacity }) => {
            assert_eq!(needed, frame.byte_len());
            assert_eq!(capacity, 64 * 1024);
        }
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_regions_still_count_toward_completion() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    // Two rows across four workers: two regions are empty.
    let frame = FrameParams { width: 4, height: 2, seed: 9 };
    let handle = pool.render(frame, 4).await.unwrap();
    handle.completed().await.unwrap();

    let snapshot = handle.snapshot();
    for y in 0..2 {
        for x in 0..4 {
            assert_eq!(pixel_at(&snapshot, &frame, x, y), expected_pixel(x, y, frame.seed));
        }
    }
}

#[tokio::test]
async fn instantly_finishing_workers_are_never_stranded() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    // Two rows across four workers: two regions are empty and complete
    // before dispatch even returns, racing the busy-set bookkeeping.
    let frame = FrameParams { width: 4, height: 2, seed: 0 };
    for _ in 0..25 {
        let handle = pool.render(frame, 4).await.unwrap();
        handle.completed().await.unwrap();
        wait_until(|| pool.idle_count() == 4).await;
    }
    // Every render reused the same four workers.
    assert_eq!(pool.worker_count(), 4);
}

#[tokio::test]
async fn workers_return_to_idle_after_a_render() {
    let pool = WorkerPool::create(small_config(), Arc::new(GradientKernel)).await.unwrap();
    let frame = FrameParams { width: 4, height: 40, seed: 0 };
    let handle = pool.render(frame, 3).await.unwrap();
    handle.completed().await.unwrap();

    wait_until(|| pool.idle_count() == 3).await;
    // A second render reuses the same workers.
    let again = pool.render(frame, 3).await.unwrap();
    again.completed().await.unwrap();
    assert_eq!(pool.worker_count(), 3);
}
