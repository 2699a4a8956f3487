use crate::errors::KernelError;
use crate::types::{FrameParams, Region};

/// The computation dispatched by the execution core.
///
/// One kernel instance is shared by every worker of a pool, so
/// implementations must be `Send + Sync` and should keep per-task state on
/// the stack. The core invokes `render` once per assigned region, on a worker
/// thread; blocking inside a kernel is allowed (workers are dedicated OS
/// threads), but it delays only that worker's region.
pub trait RenderKernel: Send + Sync {
    /// Render the rows of `region` into `out`.
    ///
    /// `out` is zeroed and exactly `region.rows() as usize * frame.row_bytes()`
    /// long, laid out row-major starting at `region.start`. Returning an error
    /// fails the owning render without touching the shared framebuffer.
    fn render(&self, region: Region, frame: &FrameParams, out: &mut [u8]) -> Result<(), KernelError>;
}
