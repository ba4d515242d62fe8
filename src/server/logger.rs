/// Process-wide logging setup
use crate::config::LoggerConfig;
use crate::core::Result;
use once_cell::sync::OnceCell;
use tracing::debug;

static LOGGER: OnceCell<()> = OnceCell::new();

/// Installs the `tracing` subscriber described by `config`.
///
/// Only the first enabled call installs anything; later calls (a server
/// restart, a second server in the same process) are no-ops. Log lines go
/// to stderr so console output on stdout stays clean.
pub fn init(config: &LoggerConfig) -> Result<()> {
    let level = config.level()?;
    if !config.enabled {
        return Ok(());
    }
    LOGGER.get_or_init(|| {
        let installed = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .try_init();
        if installed.is_err() {
            debug!("a global tracing subscriber was already installed");
        }
    });
    Ok(())
}
