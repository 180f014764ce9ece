//! Error types for the media layer.

use std::path::PathBuf;

use crate::registry::PluginResult;

/// Errors that can occur in the media layer.
///
/// Most runtime faults are not errors at this level: provider failures during a
/// session arrive as [`SessionEvent::Error`](crate::rtp::SessionEvent::Error),
/// and operations attempted in the wrong lifecycle phase return null/empty
/// sentinels. What remains is construction-time and configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// No provider is loaded and static discovery found none.
    #[error("no media provider available")]
    NoProvider,

    /// Loading a provider plugin failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// An environment variable held a value that cannot be used.
    #[error("invalid value for {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },
}

/// Why a provider plugin could not be activated.
///
/// Each variant collapses to one of the coarse [`PluginResult`] codes via
/// [`PluginError::result`].
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The shared library could not be opened.
    #[error("failed to open plugin {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The library does not export the plugin declaration symbol.
    #[error("plugin {} exports no provider declaration: {source}", path.display())]
    MissingDeclaration {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The declaration targets a different provider interface version.
    #[error("plugin interface version mismatch: expected {expected}, found {found}")]
    InterfaceMismatch { expected: &'static str, found: String },

    /// The plugin was built by a different compiler than the host.
    #[error("plugin compiler mismatch: expected {expected}, found {found}")]
    CompilerMismatch { expected: &'static str, found: String },

    /// The plugin instance declined to create a provider.
    #[error("plugin did not create a provider")]
    NoProvider,

    /// `Provider::init` reported failure.
    #[error("provider initialization failed (resources: {})", resource_path.display())]
    InitFailed { resource_path: PathBuf },
}

impl PluginError {
    /// The coarse load result reported to callers.
    pub fn result(&self) -> PluginResult {
        match self {
            Self::Open { .. } => PluginResult::ErrorLoad,
            Self::MissingDeclaration { .. }
            | Self::InterfaceMismatch { .. }
            | Self::CompilerMismatch { .. } => PluginResult::ErrorVersion,
            Self::NoProvider | Self::InitFailed { .. } => PluginResult::ErrorInit,
        }
    }
}

/// Convenience alias for `Result<T, MediaError>`.
pub type Result<T> = std::result::Result<T, MediaError>;
