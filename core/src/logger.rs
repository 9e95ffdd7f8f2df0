use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{
    fmt::format::{Format, Writer},
    EnvFilter,
};

struct CustomTimer;

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, writer: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} - {}", now.format("%d %B"), now.format("%H:%M:%S%.6f"))
    }
}

/// Logging settings, embeddable in a YAML or JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`.
    pub level: String,

    /// Print the module path of each event.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string(), with_target: false }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::INFO)
    }
}

pub fn setup_logger(config: &LogConfig) {
    let filter = EnvFilter::from_default_env().add_directive(config.level_filter().into());

    let format =
        Format::default().with_timer(CustomTimer).with_level(true).with_target(config.with_target);

    let subscriber =
        tracing_subscriber::fmt().with_env_filter(filter).event_format(format).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Logger has already been set up, continuing...");
    }
}

pub fn setup_info_logger() {
    setup_logger(&LogConfig::default());
}
