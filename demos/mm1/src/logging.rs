//! Subscriber setup for the demo binary.

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration.  `RUST_LOG`, when set, overrides the level.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level:       Level,
    pub json_format: bool,
    pub ansi:        bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: Level::INFO, json_format: false, ansi: true }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Install the global subscriber.  Fails if one is already set.
    pub fn init(self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let builder = fmt().with_env_filter(filter).with_ansi(self.ansi).with_writer(std::io::stderr);
        if self.json_format {
            builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
        } else {
            builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
        }
        Ok(())
    }
}
