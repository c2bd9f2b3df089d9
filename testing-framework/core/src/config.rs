use std::{
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;

use crate::{adjust_timeout, logging::LoggingSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read harness config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse harness config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Timeouts and intervals used by the harness waits.
///
/// Every field can be omitted from a config file and falls back to its
/// default.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// How long to wait for a service to show up in the registry.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_resolve_timeout", rename = "resolve_timeout_ms")]
    pub resolve_timeout: Duration,
    /// How long to wait for the coordination client to connect.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(
        default = "default_coordination_timeout",
        rename = "coordination_timeout_ms"
    )]
    pub coordination_timeout: Duration,
    /// Pause between resolving the fabric service and using it, giving the
    /// registry time to catch up with the cluster.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_settle_delay", rename = "settle_delay_ms")]
    pub settle_delay: Duration,
    /// Deadline for a created container to finish provisioning.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_provision_timeout", rename = "provision_timeout_ms")]
    pub provision_timeout: Duration,
    /// Sleep between two provisioning checks, also the registry recheck bound.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_poll_interval", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: default_resolve_timeout(),
            coordination_timeout: default_coordination_timeout(),
            settle_delay: default_settle_delay(),
            provision_timeout: default_provision_timeout(),
            poll_interval: default_poll_interval(),
            logging: LoggingSettings::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Stretches the deadlines for slow test environments.
    ///
    /// Intervals are left alone; only the time budgets grow.
    #[must_use]
    pub fn adjusted(self) -> Self {
        Self {
            resolve_timeout: adjust_timeout(self.resolve_timeout),
            coordination_timeout: adjust_timeout(self.coordination_timeout),
            provision_timeout: adjust_timeout(self.provision_timeout),
            ..self
        }
    }
}

const fn default_resolve_timeout() -> Duration {
    Duration::from_millis(10_000)
}

const fn default_coordination_timeout() -> Duration {
    Duration::from_millis(10_000)
}

const fn default_settle_delay() -> Duration {
    Duration::from_millis(10_000)
}

const fn default_provision_timeout() -> Duration {
    Duration::from_millis(120_000)
}

const fn default_poll_interval() -> Duration {
    Duration::from_millis(2_000)
}
