// Path: crates/telemetry/src/init.rs
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// How log records are rendered on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Logging settings, usually embedded in the host's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info,vm_client=debug`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(&self.filter)?),
        }
    }
}

/// Initializes the global `tracing` subscriber.
///
/// Records emitted through the `log` facade (the proxy services use it) are
/// bridged into the same subscriber. Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), anyhow::Error> {
    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed(),
    };
    let subscriber = Registry::default()
        .with(config.env_filter()?)
        .with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_directive_is_an_error() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            filter: "vm_client=loud".into(),
            format: LogFormat::Text,
        };
        assert!(config.env_filter().is_err());
        assert!(LoggingConfig::default().env_filter().is_ok());
    }

    #[test]
    fn second_init_fails() {
        let config = LoggingConfig::default();
        init_tracing(&config).unwrap();
        assert!(init_tracing(&config).is_err());
        log::info!(target: "vm_client", "bridged through tracing-log");
    }
}
