use std::fmt;

use thiserror::Error;
use tracing::warn;

use super::Registry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
}

impl ModuleState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Resolved => "resolved",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A module installed in the runtime under test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub symbolic_name: String,
    pub version: String,
    pub state: ModuleState,
}

impl ModuleInfo {
    #[must_use]
    pub fn new(symbolic_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            state: ModuleState::Active,
        }
    }

    #[must_use]
    pub const fn with_state(mut self, state: ModuleState) -> Self {
        self.state = state;
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("module {symbolic_name} does not exist")]
pub struct ModuleNotFound {
    pub symbolic_name: String,
}

/// Looks up an installed module by symbolic name.
///
/// On a miss every installed module is logged before the error is returned.
pub fn find_module(
    registry: &dyn Registry,
    symbolic_name: &str,
) -> Result<ModuleInfo, ModuleNotFound> {
    let modules = registry.modules();
    if let Some(module) = modules
        .iter()
        .find(|module| module.symbolic_name == symbolic_name)
    {
        return Ok(module.clone());
    }

    for module in &modules {
        warn!(
            module = %module.symbolic_name,
            version = %module.version,
            state = %module.state,
            "installed module"
        );
    }

    Err(ModuleNotFound {
        symbolic_name: symbolic_name.to_owned(),
    })
}
