//! # Game Host
//!
//! The host-side API that game server plugins are written against.
//!
//! A plugin never talks to the world directly. It subscribes to core events
//! through the [`EventSystem`] and reaches players, permissions, timers and
//! its own config file through the [`ServerContext`] it is handed at load
//! time. Host implementations provide those capabilities; plugins stay free
//! of global state.
//!
//! ## Plugin Development
//!
//! ```rust,ignore
//! use game_host::*;
//!
//! struct MyPlugin;
//!
//! impl MyPlugin {
//!     fn new() -> Self { Self }
//! }
//!
//! #[async_trait::async_trait]
//! impl SimplePlugin for MyPlugin {
//!     fn name(&self) -> &str { "my_plugin" }
//!     fn version(&self) -> &str { "1.0.0" }
//!
//!     async fn register_handlers(
//!         &mut self,
//!         events: Arc<EventSystem>,
//!         _context: Arc<dyn ServerContext>,
//!     ) -> Result<(), PluginError> {
//!         events.on_core("player_connected", |event: PlayerConnectedEvent| {
//!             println!("{} connected", event.player_id);
//!             Ok(())
//!         }).await?;
//!         Ok(())
//!     }
//! }
//!
//! create_simple_plugin!(MyPlugin);
//! ```

pub mod config_store;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod permissions;
pub mod plugin;
pub mod timers;
pub mod types;

pub use config_store::{ConfigStore, JsonConfigStore};
pub use context::{forward_to_tracing, LogLevel, PermissionService, PlayerService, ServerContext};
pub use error::{ConfigStoreError, EventError, PluginError, ServerError};
pub use events::{
    DisconnectReason, Event, EventHandler, EventSystem, EventSystemStats, PlayerConnectedEvent,
    PlayerDisconnectedEvent, PluginLoadedEvent, ServerInitializedEvent, TypedEventHandler,
};
pub use logging::{setup_logging, LoggingSettings};
pub use manager::PluginManager;
pub use permissions::PermissionRegistry;
pub use plugin::{Plugin, PluginWrapper, SimplePlugin};
pub use timers::{
    Repetitions, TickTimerService, TimerCallback, TimerHandle, TimerId, TimerService,
    TokioTimerService,
};
pub use types::{DamageInfo, DamageType, PlayerHandle, PlayerId, Vec3, WaterInfo};

pub use async_trait::async_trait;
pub use std::sync::Arc;

/// Returns the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Creates a new event system ready to be shared with plugins.
pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}
