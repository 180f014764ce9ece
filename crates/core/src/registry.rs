//! Process-wide provider registry and plugin loader.
//!
//! At most one provider is active per process. It is obtained either:
//!
//! - explicitly, with [`load_plugin`] (a shared library exporting a
//!   [`PluginDeclaration`]), or
//! - lazily, the first time something needs a provider, by scanning the
//!   plugins registered with [`register_static_plugin`].
//!
//! ## Lifecycle
//!
//! ```text
//! absent --load_plugin / discovery--> loaded (static | dynamic)
//! loaded --unload_plugin / teardown--> absent
//! ```
//!
//! The first activation registers an exit hook that runs [`teardown`] once
//! when the process exits normally, so callers that never unload still release
//! the backend. [`teardown`] is idempotent and may be called directly.
//!
//! Sessions and feature queries hold an `Arc<ProviderHandle>`. Unloading only
//! removes the registry's reference; a dynamic library stays mapped until the
//! last object created from it is gone.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use libloading::Library;
use parking_lot::Mutex;

use crate::config::LoaderConfig;
use crate::error::PluginError;
use crate::provider::{
    PLUGIN_DECLARATION_SYMBOL, PROVIDER_INTERFACE_VERSION, Plugin, PluginDeclaration, Provider,
    RUSTC_VERSION,
};

/// Outcome of [`load_plugin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginResult {
    Success,
    /// The library could not be opened.
    ErrorLoad,
    /// The library is not a plugin for this interface version.
    ErrorVersion,
    /// The plugin could not create or initialize its provider.
    ErrorInit,
}

/// Where the active provider came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOrigin {
    /// A statically registered plugin, or a provider handed in directly.
    Static,
    /// A shared library loaded from this path.
    Dynamic(PathBuf),
}

/// An initialized provider together with whatever keeps its code alive.
///
/// Field order matters: the provider is dropped before the plugin instance,
/// and both before the library that contains their code.
pub struct ProviderHandle {
    provider: Box<dyn Provider>,
    _plugin: Option<Box<dyn Plugin>>,
    origin: ProviderOrigin,
    _library: Option<Library>,
}

impl ProviderHandle {
    /// Wrap an already initialized provider without going through the
    /// registry. Useful for embedding a backend directly.
    pub fn in_process(provider: Box<dyn Provider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            _plugin: None,
            origin: ProviderOrigin::Static,
            _library: None,
        })
    }

    pub fn origin(&self) -> &ProviderOrigin {
        &self.origin
    }
}

impl Deref for ProviderHandle {
    type Target = dyn Provider;

    fn deref(&self) -> &Self::Target {
        self.provider.as_ref()
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

struct Registry {
    active: Option<Arc<ProviderHandle>>,
    static_plugins: Vec<Arc<dyn Plugin>>,
    /// Set on the first successful activation and never cleared.
    supported: bool,
}

static REGISTRY: Mutex<Registry> = parking_lot::const_mutex(Registry {
    active: None,
    static_plugins: Vec::new(),
    supported: false,
});

static EXIT_HOOK: Once = Once::new();

/// Add a compiled-in plugin to the discovery list.
///
/// Plugins are tried in registration order the next time a provider is needed
/// and none is active.
pub fn register_static_plugin(plugin: impl Plugin + 'static) {
    let mut registry = REGISTRY.lock();
    registry.static_plugins.push(Arc::new(plugin));
    tracing::debug!(
        registered = registry.static_plugins.len(),
        "static plugin registered"
    );
}

/// Whether a provider is (or can be made) available.
///
/// Attempts static discovery if nothing is active. Once this has returned
/// `true` it keeps returning `true` for the rest of the process.
pub fn is_supported() -> bool {
    if REGISTRY.lock().supported {
        return true;
    }
    active_provider().is_some()
}

/// The active provider, running static discovery if none is loaded yet.
pub fn active_provider() -> Option<Arc<ProviderHandle>> {
    let mut registry = REGISTRY.lock();
    if let Some(handle) = &registry.active {
        return Some(handle.clone());
    }

    let candidates = registry.static_plugins.clone();
    let mut provider = candidates.iter().find_map(|plugin| plugin.create_provider())?;

    if !provider.init(Path::new("")) {
        tracing::warn!("static provider failed to initialize");
        return None;
    }
    tracing::info!(
        credit = %provider.credit_name(),
        candidates = candidates.len(),
        "static provider activated"
    );

    let handle = Arc::new(ProviderHandle {
        provider,
        _plugin: None,
        origin: ProviderOrigin::Static,
        _library: None,
    });
    activate(&mut registry, handle.clone());
    Some(handle)
}

/// Load a provider from a shared library.
///
/// If a provider is already active this returns `Success` without opening
/// `path`. `resource_path` is passed to the provider's `init`.
pub fn load_plugin(path: impl AsRef<Path>, resource_path: impl AsRef<Path>) -> PluginResult {
    let path = path.as_ref();
    let mut registry = REGISTRY.lock();
    if registry.active.is_some() {
        tracing::debug!(path = %path.display(), "provider already active, load skipped");
        return PluginResult::Success;
    }

    match open_plugin(path, resource_path.as_ref()) {
        Ok(handle) => {
            tracing::info!(
                path = %path.display(),
                credit = %handle.credit_name(),
                "plugin provider activated"
            );
            activate(&mut registry, Arc::new(handle));
            PluginResult::Success
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "plugin load failed");
            e.result()
        }
    }
}

/// Load according to `config`: the configured plugin path if any, otherwise
/// static discovery (`ErrorLoad` when that finds nothing).
pub fn load_configured(config: &LoaderConfig) -> PluginResult {
    match &config.plugin_path {
        Some(path) => load_plugin(path, &config.resource_path),
        None if active_provider().is_some() => PluginResult::Success,
        None => PluginResult::ErrorLoad,
    }
}

/// Release the active provider (and its library, once unused). No-op when
/// nothing is loaded.
pub fn unload_plugin() {
    teardown();
}

/// Drop the registry's provider. Idempotent; registered as the exit hook.
pub fn teardown() {
    let released = REGISTRY.lock().active.take();
    if let Some(handle) = released {
        tracing::info!(origin = ?handle.origin(), "provider released");
        // Dropped outside the lock: provider destructors may block.
        drop(handle);
    }
}

/// Credit line of the active provider.
pub fn credit_name() -> Option<String> {
    active_provider().map(|p| p.credit_name())
}

/// Credit text (license, authors) of the active provider.
pub fn credit_text() -> Option<String> {
    active_provider().map(|p| p.credit_text())
}

/// Origin of the active provider, without triggering discovery.
pub fn active_origin() -> Option<ProviderOrigin> {
    REGISTRY.lock().active.as_ref().map(|h| h.origin().clone())
}

fn activate(registry: &mut Registry, handle: Arc<ProviderHandle>) {
    registry.active = Some(handle);
    registry.supported = true;
    EXIT_HOOK.call_once(|| {
        // SAFETY: `teardown_at_exit` is a plain `extern "C" fn` with no
        // arguments, as `atexit` requires.
        if unsafe { libc::atexit(teardown_at_exit) } != 0 {
            tracing::warn!("could not register provider exit hook");
        }
    });
}

extern "C" fn teardown_at_exit() {
    teardown();
}

fn open_plugin(path: &Path, resource_path: &Path) -> Result<ProviderHandle, PluginError> {
    // SAFETY: loading a library runs its initializers. Plugins are trusted
    // code chosen by the caller.
    let library = unsafe { Library::new(path) }.map_err(|source| PluginError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let (interface_version, rustc_version, instance) = {
        // SAFETY: the symbol is declared by `declare_plugin!` as a
        // `static PluginDeclaration`; its address is only read while
        // `library` is alive.
        let symbol = unsafe { library.get::<*const PluginDeclaration>(PLUGIN_DECLARATION_SYMBOL) }
            .map_err(|source| PluginError::MissingDeclaration {
                path: path.to_path_buf(),
                source,
            })?;
        let declaration = unsafe { &**symbol };
        (
            declaration.interface_version.to_string(),
            declaration.rustc_version.to_string(),
            declaration.instance,
        )
    };

    if interface_version != PROVIDER_INTERFACE_VERSION {
        return Err(PluginError::InterfaceMismatch {
            expected: PROVIDER_INTERFACE_VERSION,
            found: interface_version,
        });
    }
    if rustc_version != RUSTC_VERSION {
        return Err(PluginError::CompilerMismatch {
            expected: RUSTC_VERSION,
            found: rustc_version,
        });
    }

    let plugin = instance();
    let Some(mut provider) = plugin.create_provider() else {
        return Err(PluginError::NoProvider);
    };

    if !provider.init(resource_path) {
        drop(provider);
        drop(plugin);
        return Err(PluginError::InitFailed {
            resource_path: resource_path.to_path_buf(),
        });
    }

    Ok(ProviderHandle {
        provider,
        _plugin: Some(plugin),
        origin: ProviderOrigin::Dynamic(path.to_path_buf()),
        _library: Some(library),
    })
}

#[cfg(test)]
pub(crate) fn reset_for_tests() {
    let mut registry = REGISTRY.lock();
    registry.active = None;
    registry.static_plugins.clear();
    registry.supported = false;
}
