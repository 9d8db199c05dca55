//! Plugin lifecycle management with two-phase initialization.

use crate::context::ServerContext;
use crate::error::PluginError;
use crate::events::PluginLoadedEvent;
use crate::plugin::Plugin;
use crate::current_timestamp;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Owns plugin instances and drives them through their lifecycle.
///
/// Plugins are statically registered and then initialized together:
/// every plugin registers its handlers before any plugin runs `init`, so no
/// plugin can emit an event that another plugin has not subscribed to yet.
pub struct PluginManager {
    context: Arc<dyn ServerContext>,
    /// Registered but not yet initialized
    staged: Mutex<Vec<Box<dyn Plugin>>>,
    /// Initialized and receiving events, in load order
    active: RwLock<Vec<Box<dyn Plugin>>>,
}

impl PluginManager {
    pub fn new(context: Arc<dyn ServerContext>) -> Self {
        Self {
            context,
            staged: Mutex::new(Vec::new()),
            active: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, plugin: Box<dyn Plugin>) {
        info!("Staged plugin {} v{}", plugin.name(), plugin.version());
        self.staged.lock().await.push(plugin);
    }

    /// Initializes every staged plugin and returns the names that loaded.
    ///
    /// A plugin that fails either phase is dropped and logged; the others
    /// continue loading.
    pub async fn initialize_all(&self) -> Result<Vec<String>, PluginError> {
        let staged: Vec<Box<dyn Plugin>> = self.staged.lock().await.drain(..).collect();
        info!("🔌 Initializing {} plugins", staged.len());

        info!("Phase 1: Registering event handlers for all plugins");
        let mut registered = Vec::with_capacity(staged.len());
        for mut plugin in staged {
            match plugin.pre_init(Arc::clone(&self.context)).await {
                Ok(()) => registered.push(plugin),
                Err(e) => error!("Plugin {} pre-initialization failed: {}", plugin.name(), e),
            }
        }

        info!("Phase 2: Initializing all plugins");
        let mut loaded = Vec::with_capacity(registered.len());
        for mut plugin in registered {
            match plugin.init(Arc::clone(&self.context)).await {
                Ok(()) => {
                    info!("Plugin {} initialized successfully", plugin.name());
                    let event = PluginLoadedEvent {
                        plugin_name: plugin.name().to_string(),
                        version: plugin.version().to_string(),
                        timestamp: current_timestamp(),
                    };
                    if let Err(e) = self.context.events().emit_core("plugin_loaded", &event).await {
                        warn!("Failed to emit plugin loaded event: {}", e);
                    }
                    loaded.push(plugin);
                }
                Err(e) => {
                    error!("Plugin {} initialization failed: {}", plugin.name(), e);
                    if let Err(e) = plugin.shutdown(Arc::clone(&self.context)).await {
                        warn!("Cleanup after failed init of {} failed: {}", plugin.name(), e);
                    }
                }
            }
        }

        let names: Vec<String> = loaded.iter().map(|p| p.name().to_string()).collect();
        self.active.write().await.extend(loaded);
        info!("🔌 {} plugins active", names.len());
        Ok(names)
    }

    /// Shuts down active plugins in reverse load order.
    pub async fn shutdown_all(&self) -> Result<(), PluginError> {
        let mut active = self.active.write().await;
        info!("Shutting down {} plugins", active.len());

        while let Some(mut plugin) = active.pop() {
            if let Err(e) = plugin.shutdown(Arc::clone(&self.context)).await {
                error!("Error shutting down plugin {}: {}", plugin.name(), e);
            }
        }

        info!("All plugins shut down");
        Ok(())
    }

    pub async fn loaded_plugins(&self) -> Vec<String> {
        self.active
            .read()
            .await
            .iter()
            .map(|plugin| plugin.name().to_string())
            .collect()
    }
}
