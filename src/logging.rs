use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Installs a stderr subscriber. A second call is a no-op.
pub fn init(config: &LoggingConfig) {
    let layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::init;
    use crate::config::LoggingConfig;

    #[test]
    fn init_twice_does_not_panic() {
        let config = LoggingConfig {
            level: "not a level ===".to_string(),
        };
        init(&config);
        init(&LoggingConfig::default());
    }
}
