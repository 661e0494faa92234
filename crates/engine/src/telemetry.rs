use tracing_subscriber::EnvFilter;

use crate::config::SyncConfig;
use crate::error::EngineError;

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &SyncConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| EngineError::Config(format!("log filter {:?}: {e}", config.log_filter)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Config(format!("installing subscriber: {e}")))
}
