//! # No Water Sleep
//!
//! Drowns players who go to sleep underwater.
//!
//! When a player disconnects (and becomes a sleeper) while submerged, or is
//! already asleep underwater when the server comes up, the configured
//! [`DrowningPolicy`] is applied: either a grace delay followed by repeating
//! drowning damage, or an immediate kill. Reconnecting or surfacing ends the
//! sequence. Players granted `nowatersleep.ignore` are left alone.

use async_trait::async_trait;
use game_host::{
    create_simple_plugin, EventSystem, LogLevel, PlayerConnectedEvent,
    PlayerDisconnectedEvent, PluginError, ServerContext, ServerInitializedEvent, SimplePlugin,
};
use parking_lot::RwLock;
use std::sync::Arc;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod permissions;
pub mod policy;
pub mod water;
pub mod watch;

pub use config::{load_configuration, Configuration, PluginVersion, PolicyMode};
pub use coordinator::{DrowningCoordinator, DrowningPhase};
pub use error::{ConfigError, ConfigResult};
pub use policy::{DrowningPolicy, DrowningSchedule};
pub use watch::{SleeperOutcome, SleeperWatch, SweepSummary};

/// Name used for routing, the config file and as permission owner.
pub const PLUGIN_NAME: &str = "no_water_sleep";

type WatchSlot = Arc<RwLock<Option<Arc<SleeperWatch>>>>;

pub struct NoWaterSleepPlugin {
    name: String,
    /// Filled by `on_init`; handlers registered earlier see `None` and do nothing
    watch: WatchSlot,
}

impl NoWaterSleepPlugin {
    pub fn new() -> Self {
        Self {
            name: PLUGIN_NAME.to_string(),
            watch: Arc::new(RwLock::new(None)),
        }
    }

    /// The live watch, once the plugin has initialized.
    pub fn watch(&self) -> Option<Arc<SleeperWatch>> {
        self.watch.read().clone()
    }
}

impl Default for NoWaterSleepPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn current_watch(slot: &WatchSlot) -> Option<Arc<SleeperWatch>> {
    slot.read().clone()
}

#[async_trait]
impl SimplePlugin for NoWaterSleepPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        config::PLUGIN_VERSION
    }

    async fn register_handlers(
        &mut self,
        events: Arc<EventSystem>,
        context: Arc<dyn ServerContext>,
    ) -> Result<(), PluginError> {
        let slot = Arc::clone(&self.watch);
        let log_context = Arc::clone(&context);
        events
            .on_core("server_initialized", move |event: ServerInitializedEvent| {
                if let Some(watch) = current_watch(&slot) {
                    let summary = watch.on_server_initialized(&event);
                    if summary.scheduled > 0 {
                        log_context.log(
                            LogLevel::Info,
                            &format!(
                                "Scheduled {} underwater sleepers to begin drowning soon.",
                                summary.scheduled
                            ),
                        );
                    }
                    if summary.killed > 0 {
                        log_context.log(
                            LogLevel::Info,
                            &format!("Killed {} sleepers found underwater.", summary.killed),
                        );
                    }
                }
                Ok(())
            })
            .await?;

        let slot = Arc::clone(&self.watch);
        events
            .on_core("player_disconnected", move |event: PlayerDisconnectedEvent| {
                if let Some(watch) = current_watch(&slot) {
                    watch.on_player_disconnected(&event);
                }
                Ok(())
            })
            .await?;

        let slot = Arc::clone(&self.watch);
        events
            .on_core("player_connected", move |event: PlayerConnectedEvent| {
                if let Some(watch) = current_watch(&slot) {
                    watch.on_player_connected(&event);
                }
                Ok(())
            })
            .await?;

        context.log(LogLevel::Debug, "🌊 NoWaterSleep: handlers registered");
        Ok(())
    }

    async fn on_init(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        permissions::register_permissions(context.permissions().as_ref(), &self.name)?;

        let store = context.config_store();
        let configuration = load_configuration(store.as_ref(), &self.name).await?;
        let policy = configuration.policy()?;

        let watch = SleeperWatch::new(
            context.players(),
            context.permissions(),
            context.timers(),
            policy,
        );
        if let Some(previous) = self.watch.write().replace(watch) {
            previous.shutdown();
        }

        context.log(
            LogLevel::Info,
            &format!(
                "🌊 NoWaterSleep {} active ({:?})",
                config::PLUGIN_VERSION,
                configuration.policy
            ),
        );
        Ok(())
    }

    async fn on_shutdown(&mut self, context: Arc<dyn ServerContext>) -> Result<(), PluginError> {
        let watch = self.watch.write().take();
        if let Some(watch) = watch {
            watch.shutdown();
        }
        context.log(LogLevel::Info, "🌊 NoWaterSleep: all drowning timers cancelled");
        Ok(())
    }
}

create_simple_plugin!(NoWaterSleepPlugin);
