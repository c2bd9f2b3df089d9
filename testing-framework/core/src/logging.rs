use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt::TestWriter, EnvFilter};

use crate::DynError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, overridden by `RUST_LOG` when it is set.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_filter() -> String {
    "info".to_owned()
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install log subscriber: {0}")]
    Install(#[source] DynError),
}

/// Installs the global subscriber described by `settings`.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = env_filter(env::var(EnvFilter::DEFAULT_ENV).ok(), settings)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match settings.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(LoggingError::Install)
}

/// A valid `from_env` wins over the configured directives.
fn env_filter(
    from_env: Option<String>,
    settings: &LoggingSettings,
) -> Result<EnvFilter, LoggingError> {
    if let Some(filter) = from_env.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.filter).map_err(|source| LoggingError::Filter {
        filter: settings.filter.clone(),
        source,
    })
}

/// Routes logs through the test harness' captured output. Safe to call from
/// every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .compact()
        .with_writer(TestWriter::default())
        .try_init();
}
