//! Renders a color gradient across four workers and prints progress while the
//! frame fills in.

use std::sync::Arc;
use std::time::Duration;

use kestrel::{
    logging, FrameParams, KernelError, PoolConfig, Region, RenderKernel, WorkerPool,
    BYTES_PER_PIXEL,
};

struct Gradient;

impl RenderKernel for Gradient {
    fn render(&self, region: Region, frame: &FrameParams, out: &mut [u8]) -> Result<(), KernelError> {
        let row_bytes = frame.row_bytes();
        for y in region.start..region.end {
            let row = &mut out[(y - region.start) as usize * row_bytes..][..row_bytes];
            for x in 0..frame.width {
                let pixel = &mut row[x as usize * BYTES_PER_PIXEL..][..BYTES_PER_PIXEL];
                pixel[0] = (x * 255 / frame.width.max(1)) as u8;
                pixel[1] = (y * 255 / frame.height.max(1)) as u8;
                pixel[2] = frame.seed as u8;
                pixel[3] = 0xff;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_default();

    let config = PoolConfig { initial_workers: 0, ..Default::default() };
    let pool = WorkerPool::create(config, Arc::new(Gradient)).await?;

    let frame = FrameParams { width: 320, height: 240, seed: 7 };
    let handle = pool.render(frame, 4).await?;
    println!("dispatched across {} workers", pool.worker_count());

    while handle.remaining() > 0 {
        println!("tiles remaining: {}", handle.remaining());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.completed().await?;
    let pixels = handle.snapshot();
    println!("rendered {} bytes", pixels.len());
    Ok(())
}
