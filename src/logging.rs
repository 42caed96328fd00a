use crate::error::{LinkError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber filtered by `filter` (env-filter syntax,
/// e.g. `"warn,linkstore=debug"`).
pub fn init_logging(filter: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(filter)
                .map_err(|e| LinkError::InvalidArgument(format!("Invalid log filter: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| LinkError::Logic("Logging already initialized"))
}
