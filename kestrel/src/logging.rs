// Logging setup for the rendering runtime.
//
// Built on the `tracing` ecosystem. Worker and helper threads are plain OS
// threads, so thread names carry most of the diagnostic value; the default
// format includes them.

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: Level,
    /// Emit JSON-formatted events instead of human-readable lines.
    pub json_format: bool,
    /// Include thread names and ids.
    pub show_thread_info: bool,
    /// Target filter expressions ("target=level,target2=level2,...").
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// Safe to call multiple times; only the first call takes effect. The
/// `RUST_LOG` environment variable still applies on top of `config.level`.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
        if let Some(filters) = config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let registry = tracing_subscriber::registry().with(env_filter);
        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {}", err);
        }
    });
}

/// Initialize with defaults: INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// Initialize for tests: warnings and errors only, no thread noise.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_thread_info: false,
        target_filters: None,
    });
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
