use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "kinema_anim=trace,kinema_engine=debug").
///
/// `write_style` controls ANSI coloring behavior. `timestamp_millis` switches
/// the record prefix to millisecond timestamps, which is the useful resolution
/// when reading frame and step timings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter:       Option<String>,
    pub write_style:      env_logger::WriteStyle,
    pub timestamp_millis: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter:       None,
            write_style:      env_logger::WriteStyle::Auto,
            timestamp_millis: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Idempotent; later calls are ignored. A logger installed by someone else
/// (a test harness, an embedding application) is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.write_style(config.write_style);
        if config.timestamp_millis {
            builder.format_timestamp_millis();
        }

        if builder.try_init().is_err() {
            log::debug!("logger already installed; keeping it");
            return;
        }
        log::debug!("logging initialized");
    });
}
