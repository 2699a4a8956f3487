use std::time::Duration;

/// Default number of cached wait-helper threads kept alive by the bridge.
pub const DEFAULT_HELPER_CACHE_SIZE: usize = 32;

/// Environment variable forcing the bridge onto the helper-thread wait path
/// even when the native async wait is available.
pub const FORCE_DELEGATED_ENV: &str = "KESTREL_FORCE_DELEGATED_WAIT";

/// Configuration for the shared memory arena created alongside a pool.
///
/// The arena is allocated once at pool creation and never reallocated or
/// grown; every dispatched frame must fit in `framebuffer_bytes`.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Capacity of the shared framebuffer in bytes.
    pub framebuffer_bytes: usize,

    /// Number of wait/notify cells available to the bridge.
    pub wait_cells: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            // Enough for a 1920x1080 RGBA frame with headroom.
            framebuffer_bytes: 16 * 1024 * 1024,
            wait_cells: 32,
        }
    }
}

/// Configuration for a [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Workers spawned eagerly by `create`. The pool still grows on demand
    /// when `acquire` finds the idle set empty.
    pub initial_workers: usize,

    /// Worker threads are named "{prefix}-{id}".
    pub thread_name_prefix: String,

    /// How long to wait for a freshly spawned worker to complete its
    /// bootstrap handshake before reporting a spawn failure.
    pub handshake_timeout: Duration,

    /// Layout of the arena shared by the pool's workers.
    pub arena: ArenaConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_workers: num_cpus::get(),
            thread_name_prefix: "render-worker".to_string(),
            handshake_timeout: Duration::from_secs(5),
            arena: ArenaConfig::default(),
        }
    }
}

/// Configuration for the [`AtomicWaitBridge`](crate::bridge::AtomicWaitBridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Maximum number of idle helper threads kept for reuse; surplus helpers
    /// are torn down after their wait completes.
    pub helper_cache_size: usize,

    /// Skip the native async wait and always delegate to a helper thread.
    /// Defaults to the [`FORCE_DELEGATED_ENV`] environment override.
    pub force_delegated: bool,

    /// When set, a delegated wait lasting longer than this logs a warning.
    pub long_wait_warning: Option<Duration>,

    /// Helper threads are named "{prefix}-{id}".
    pub helper_name_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            helper_cache_size: DEFAULT_HELPER_CACHE_SIZE,
            force_delegated: delegated_wait_forced(),
            long_wait_warning: None,
            helper_name_prefix: "wait-helper".to_string(),
        }
    }
}

/// Whether the environment forces the delegated wait path.
pub fn delegated_wait_forced() -> bool {
    std::env::var_os(FORCE_DELEGATED_ENV).is_some()
}
