//! Plugin traits and the wrapper that bridges them.

use crate::context::ServerContext;
use crate::error::PluginError;
use crate::events::EventSystem;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Simplified plugin trait that doesn't require unsafe code.
///
/// # Lifecycle
///
/// 1. **Creation**: Plugin instance is created via `new()`
/// 2. **Handler Registration**: `register_handlers()` is called on every plugin first
/// 3. **Initialization**: `on_init()` is called once all handlers are registered
/// 4. **Operation**: Plugin receives and processes events
/// 5. **Shutdown**: `on_shutdown()` is called for cleanup
///
/// Handlers registered in step 2 may fire as soon as step 3 begins for any
/// plugin, so state they depend on must tolerate not being initialized yet.
#[async_trait]
pub trait SimplePlugin: Send + Sync + 'static {
    /// Unique, stable name used for routing, logging and config file names.
    fn name(&self) -> &str;

    /// Semantic version string of this plugin.
    fn version(&self) -> &str;

    /// Registers event handlers. Do not emit events or touch the world here.
    async fn register_handlers(
        &mut self,
        events: Arc<EventSystem>,
        context: Arc<dyn ServerContext>,
    ) -> Result<(), PluginError>;

    /// Loads configuration, registers permissions and inspects the world.
    async fn on_init(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Cancels timers and releases anything the plugin holds.
    async fn on_shutdown(&mut self, _context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Low-level plugin trait used by the plugin manager and FFI exports.
///
/// Most plugin developers should implement [`SimplePlugin`] and let
/// [`PluginWrapper`] provide this.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Handler registration phase.
    async fn pre_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError>;

    /// Main initialization phase.
    async fn init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError>;

    /// Cleanup phase. Errors are logged by the caller but don't prevent unloading.
    async fn shutdown(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError>;
}

/// Bridges [`SimplePlugin`] to [`Plugin`], turning panics into
/// [`PluginError::Runtime`] so a faulty plugin cannot take the host down.
pub struct PluginWrapper<P: SimplePlugin> {
    inner: P,
}

impl<P: SimplePlugin> PluginWrapper<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn panic_to_error(panic_info: Box<dyn std::any::Any + Send>) -> PluginError {
        let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
            format!("Plugin panicked: {}", s)
        } else if let Some(s) = panic_info.downcast_ref::<String>() {
            format!("Plugin panicked: {}", s)
        } else {
            "Plugin panicked with unknown error".to_string()
        };

        PluginError::Runtime(message)
    }
}

#[async_trait]
impl<P: SimplePlugin> Plugin for PluginWrapper<P> {
    fn name(&self) -> &str {
        match catch_unwind(AssertUnwindSafe(|| self.inner.name())) {
            Ok(name) => name,
            Err(_) => "unknown-plugin-name",
        }
    }

    fn version(&self) -> &str {
        match catch_unwind(AssertUnwindSafe(|| self.inner.version())) {
            Ok(version) => version,
            Err(_) => "unknown-version",
        }
    }

    async fn pre_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        let events = context.events();
        AssertUnwindSafe(self.inner.register_handlers(events, context))
            .catch_unwind()
            .await
            .map_err(Self::panic_to_error)?
    }

    async fn init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.on_init(context))
            .catch_unwind()
            .await
            .map_err(Self::panic_to_error)?
    }

    async fn shutdown(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        AssertUnwindSafe(self.inner.on_shutdown(context))
            .catch_unwind()
            .await
            .map_err(Self::panic_to_error)?
    }
}

/// Exports `create_plugin` / `destroy_plugin` for a [`SimplePlugin`] type.
///
/// The type must provide `fn new() -> Self`.
///
/// ```rust,ignore
/// create_simple_plugin!(MyPlugin);
/// ```
#[macro_export]
macro_rules! create_simple_plugin {
    ($plugin_type:ty) => {
        /// Plugin creation function with panic protection - required export.
        ///
        /// # Safety
        ///
        /// The returned pointer must be released with `destroy_plugin`.
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn create_plugin() -> *mut dyn $crate::Plugin {
            match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let plugin = Box::new($crate::PluginWrapper::new(<$plugin_type>::new()));
                Box::into_raw(plugin) as *mut dyn $crate::Plugin
            })) {
                Ok(plugin_ptr) => plugin_ptr,
                Err(panic_info) => {
                    eprintln!("Plugin creation panicked: {:?}", panic_info);
                    ::std::ptr::null_mut::<$crate::PluginWrapper<$plugin_type>>()
                        as *mut dyn $crate::Plugin
                }
            }
        }

        /// Plugin destruction function with panic protection - required export.
        ///
        /// # Safety
        ///
        /// `plugin` must come from `create_plugin` and not be used afterwards.
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn destroy_plugin(plugin: *mut dyn $crate::Plugin) {
            if plugin.is_null() {
                return;
            }

            let _ = ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let _ = Box::from_raw(plugin);
            }));
        }
    };
}
