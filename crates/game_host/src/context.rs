//! Server context and the host capabilities it hands to plugins.
//!
//! Plugins never reach for global state. Everything they may touch in the
//! world (players, permissions, timers, config files) is reached through the
//! [`ServerContext`] passed to their lifecycle methods.

use crate::config_store::ConfigStore;
use crate::error::ServerError;
use crate::events::EventSystem;
use crate::timers::TimerService;
use crate::types::{DamageInfo, PlayerHandle, PlayerId, WaterInfo};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Server context trait that provides plugins with access to server services.
///
/// # Examples
///
/// ```rust,no_run
/// use game_host::{LogLevel, PlayerId, ServerContext};
/// use std::sync::Arc;
///
/// fn greet(context: Arc<dyn ServerContext>, player_id: PlayerId) {
///     if let Some(player) = context.players().find_by_id(player_id) {
///         context.log(LogLevel::Info, &format!("Hello {}", player.display_name));
///     }
/// }
/// ```
pub trait ServerContext: Send + Sync {
    /// Returns the event system shared with the core server.
    fn events(&self) -> Arc<EventSystem>;

    /// Logs a message through the server's logging system.
    fn log(&self, level: LogLevel, message: &str);

    /// Timer scheduling that runs on the server's serialized callback queue.
    fn timers(&self) -> Arc<dyn TimerService>;

    /// Player lookup, water queries and damage application.
    fn players(&self) -> Arc<dyn PlayerService>;

    /// Permission registration and checks.
    fn permissions(&self) -> Arc<dyn PermissionService>;

    /// Per-plugin config object persistence.
    fn config_store(&self) -> Arc<dyn ConfigStore>;
}

/// Player-facing world operations provided by the host.
///
/// These are synchronous because they are called from timer callbacks,
/// which run on the host's tick thread.
pub trait PlayerService: Send + Sync {
    /// Resolves a player by identifier, connected or sleeping.
    fn find_by_id(&self, player_id: PlayerId) -> Option<PlayerHandle>;

    /// Measures the water at the player's current position.
    fn water_info(&self, player: &PlayerHandle) -> WaterInfo;

    /// Applies damage to the player.
    fn hurt(&self, player: &PlayerHandle, damage: DamageInfo);

    /// Kills the player outright.
    fn kill(&self, player: &PlayerHandle);
}

/// Permission storage owned by the host.
pub trait PermissionService: Send + Sync {
    /// Registers a permission name on behalf of `owner` (usually a plugin name).
    fn register_permission(&self, permission: &str, owner: &str) -> Result<(), ServerError>;

    fn user_has_permission(&self, player_id: PlayerId, permission: &str) -> bool;
}

/// Log levels for [`ServerContext::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Routes a context log message to the matching `tracing` macro.
///
/// Host implementations of [`ServerContext::log`] can delegate here.
pub fn forward_to_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => error!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Trace => trace!("{}", message),
    }
}
