use std::env;
use std::path::PathBuf;

use crate::error::{MediaError, Result};

/// Environment variable naming a provider plugin library.
pub const PLUGIN_ENV: &str = "MEDIAPLUG_PLUGIN";

/// Environment variable naming the provider's resource directory.
pub const RESOURCES_ENV: &str = "MEDIAPLUG_RESOURCES";

/// How to obtain a provider.
///
/// Consumed by [`registry::load_configured`](crate::registry::load_configured).
/// With no `plugin_path`, only statically registered plugins are considered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Shared library to load. `None` means static discovery only.
    pub plugin_path: Option<PathBuf>,
    /// Directory handed to the provider's `init` (data files, codecs).
    /// Empty means "no resources".
    pub resource_path: PathBuf,
}

impl LoaderConfig {
    /// Build a config from [`PLUGIN_ENV`] and [`RESOURCES_ENV`].
    ///
    /// Unset variables leave the defaults in place. A variable set to an empty
    /// string, or to a non-UTF-8 value, is rejected.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = read_path(PLUGIN_ENV)? {
            config.plugin_path = Some(path);
        }
        if let Some(path) = read_path(RESOURCES_ENV)? {
            config.resource_path = path;
        }
        Ok(config)
    }

    pub fn with_plugin(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_path = Some(path.into());
        self
    }

    pub fn with_resources(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_path = path.into();
        self
    }
}

fn read_path(name: &'static str) -> Result<Option<PathBuf>> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(MediaError::InvalidConfig {
            name,
            reason: "empty path".to_string(),
        }),
        Ok(value) => Ok(Some(PathBuf::from(value))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(MediaError::InvalidConfig {
            name,
            reason: "not valid UTF-8".to_string(),
        }),
    }
}
