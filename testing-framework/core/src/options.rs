//! Edits applied to a runtime's property files before it is started.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

/// Property file the runtime reads its system properties from.
pub const SYSTEM_PROPERTIES: &str = "etc/system.properties";

#[derive(Debug, Error)]
#[error("failed to edit {path}: {source}")]
pub struct EditError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditMode {
    /// Overwrite the current value.
    Replace,
    /// Append to the current value as a `,`-separated item.
    Extend,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationEdit {
    file: PathBuf,
    key: String,
    value: String,
    mode: EditMode,
}

impl ConfigurationEdit {
    #[must_use]
    pub fn replace(
        file: impl Into<PathBuf>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(file, key, value, EditMode::Replace)
    }

    #[must_use]
    pub fn extend(
        file: impl Into<PathBuf>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(file, key, value, EditMode::Extend)
    }

    fn new(
        file: impl Into<PathBuf>,
        key: impl Into<String>,
        value: impl Into<String>,
        mode: EditMode,
    ) -> Self {
        Self {
            file: file.into(),
            key: key.into(),
            value: value.into(),
            mode,
        }
    }

    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub const fn mode(&self) -> EditMode {
        self.mode
    }

    /// Applies the edit to the file relative to the runtime `root`, creating
    /// the file when it does not exist yet.
    pub fn apply(&self, root: &Path) -> Result<(), EditError> {
        let path = root.join(&self.file);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(EditError { path, source }),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| EditError {
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, self.edit(&contents)).map_err(|source| EditError {
            path: path.clone(),
            source,
        })?;

        debug!(file = %path.display(), key = %self.key, "applied configuration edit");
        Ok(())
    }

    fn edit(&self, contents: &str) -> String {
        let mut lines = Vec::new();
        let mut found = false;
        for line in contents.lines() {
            match property(line) {
                Some((key, current)) if !found && key == self.key => {
                    found = true;
                    lines.push(format!("{} = {}", self.key, self.merge(current)));
                }
                _ => lines.push(line.to_owned()),
            }
        }
        if !found {
            lines.push(format!("{} = {}", self.key, self.value));
        }

        let mut edited = lines.join("\n");
        edited.push('\n');
        edited
    }

    fn merge(&self, current: &str) -> String {
        match self.mode {
            EditMode::Replace => self.value.clone(),
            EditMode::Extend if current.is_empty() => self.value.clone(),
            EditMode::Extend if self.value.is_empty() => current.to_owned(),
            EditMode::Extend => format!("{current},{}", self.value),
        }
    }
}

/// Forwards a variable of the test process environment to the runtime's
/// system properties. Unset variables are forwarded as empty values.
#[must_use]
pub fn copy_system_property(name: &str) -> ConfigurationEdit {
    ConfigurationEdit::extend(
        SYSTEM_PROPERTIES,
        name,
        env::var(name).unwrap_or_default(),
    )
}

fn property(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }
    let split = line.find(|c: char| c == '=' || c == ':')?;
    Some((line[..split].trim(), line[split + 1..].trim()))
}
