//! Logging initialization

use portage_types::{PortageError, PortageResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for the global `tracing` subscriber
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn new(log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            ..Default::default()
        }
    }

    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Verbose runs log at debug level
    pub fn for_verbosity(verbose: bool) -> Self {
        Self::new(if verbose { "debug" } else { "info" })
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> PortageResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(config.with_target))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(config.with_target))
            .try_init()
    };
    result.map_err(|e| PortageError::Validation(format!("Cannot initialize logging: {}", e)))
}
