//! Plugin entry point.
//!
//! A provider is packaged as a [`Plugin`]. Statically linked plugins are
//! handed to [`register_static_plugin`](crate::registry::register_static_plugin);
//! dynamically loaded ones export a [`PluginDeclaration`] under the
//! [`PLUGIN_DECLARATION_SYMBOL`] name, usually via [`declare_plugin!`](crate::declare_plugin).
//!
//! ```ignore
//! struct MyPlugin;
//!
//! impl mediaplug::provider::Plugin for MyPlugin {
//!     fn create_provider(&self) -> Option<Box<dyn mediaplug::provider::Provider>> {
//!         Some(Box::new(MyProvider::default()))
//!     }
//! }
//!
//! mediaplug::declare_plugin!(MyPlugin);
//! ```

use super::Provider;

/// Version of the provider contract. A plugin declaring anything else is
/// refused with [`PluginResult::ErrorVersion`](crate::registry::PluginResult::ErrorVersion).
pub const PROVIDER_INTERFACE_VERSION: &str = "mediaplug.provider/1.0";

/// Compiler that built this copy of the crate.
pub const RUSTC_VERSION: &str = env!("MEDIAPLUG_RUSTC_VERSION");

/// Exported symbol name (NUL-terminated) looked up in plugin libraries.
pub const PLUGIN_DECLARATION_SYMBOL: &[u8] = b"MEDIAPLUG_PLUGIN_DECLARATION\0";

/// Factory for providers.
pub trait Plugin: Send + Sync {
    /// Build a fresh, uninitialized provider, or `None` if this plugin cannot
    /// run here (missing system libraries, unsupported platform).
    fn create_provider(&self) -> Option<Box<dyn Provider>>;
}

/// What a dynamic plugin exports.
pub struct PluginDeclaration {
    pub interface_version: &'static str,
    pub rustc_version: &'static str,
    /// Builds the plugin instance.
    pub instance: fn() -> Box<dyn Plugin>,
}

/// Export a [`PluginDeclaration`] for a plugin value from a `cdylib`.
///
/// The argument is an expression building the plugin; it is evaluated each
/// time the loader instantiates the plugin.
#[macro_export]
macro_rules! declare_plugin {
    ($plugin:expr) => {
        #[unsafe(no_mangle)]
        pub static MEDIAPLUG_PLUGIN_DECLARATION: $crate::provider::PluginDeclaration =
            $crate::provider::PluginDeclaration {
                interface_version: $crate::provider::PROVIDER_INTERFACE_VERSION,
                rustc_version: $crate::provider::RUSTC_VERSION,
                instance: || -> ::std::boxed::Box<dyn $crate::provider::Plugin> {
                    ::std::boxed::Box::new($plugin)
                },
            };
    };
}
