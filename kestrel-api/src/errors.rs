use thiserror::Error;

/// Error a render kernel may report for one task.
///
/// A kernel error fails the whole render immediately: sibling regions are not
/// awaited, though bytes already published to the framebuffer stay readable.
#[derive(Error, Debug, Clone)]
pub enum KernelError {
    #[error("kernel failure: {0}")]
    Failed(String),
    #[error("invalid frame parameters: {0}")]
    InvalidFrame(String),
}
