//! Tracing subscriber setup shared by the binaries

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to the configured
/// file when set, stderr otherwise.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
    }
    Ok(())
}
