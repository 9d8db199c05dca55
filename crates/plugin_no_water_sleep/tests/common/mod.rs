#![allow(dead_code)]

use dashmap::DashMap;
use game_host::{
    create_event_system, current_timestamp, forward_to_tracing, setup_logging, ConfigStore,
    DamageInfo, DisconnectReason, EventSystem, JsonConfigStore, LogLevel, LoggingSettings,
    PermissionRegistry, PermissionService, Plugin, PlayerConnectedEvent, PlayerDisconnectedEvent,
    PlayerHandle, PlayerId, PlayerService, PluginWrapper, ServerContext, ServerInitializedEvent,
    TickTimerService, TimerService, Vec3, WaterInfo,
};
use parking_lot::Mutex;
use plugin_no_water_sleep::NoWaterSleepPlugin;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Body {
    depth: f32,
    asleep: bool,
}

/// What the plugin did to a player, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Harm {
    Hurt(PlayerId, DamageInfo),
    Killed(PlayerId),
}

#[derive(Default)]
pub struct TestWorld {
    bodies: DashMap<PlayerId, Body>,
    journal: Mutex<Vec<Harm>>,
}

impl TestWorld {
    pub fn spawn_sleeper(&self, player_id: PlayerId, depth: f32) {
        self.bodies.insert(
            player_id,
            Body {
                depth,
                asleep: true,
            },
        );
    }

    pub fn set_depth(&self, player_id: PlayerId, depth: f32) {
        if let Some(mut body) = self.bodies.get_mut(&player_id) {
            body.depth = depth;
        }
    }

    pub fn wake(&self, player_id: PlayerId) {
        if let Some(mut body) = self.bodies.get_mut(&player_id) {
            body.asleep = false;
        }
    }

    pub fn despawn(&self, player_id: PlayerId) {
        self.bodies.remove(&player_id);
    }

    pub fn sleepers(&self) -> Vec<PlayerId> {
        let mut sleepers: Vec<PlayerId> = self
            .bodies
            .iter()
            .filter(|body| body.asleep)
            .map(|body| *body.key())
            .collect();
        sleepers.sort();
        sleepers
    }

    pub fn hits(&self, player_id: PlayerId) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|harm| matches!(harm, Harm::Hurt(id, _) if *id == player_id))
            .count()
    }

    pub fn kills(&self) -> Vec<PlayerId> {
        self.journal
            .lock()
            .iter()
            .filter_map(|harm| match harm {
                Harm::Killed(id) => Some(*id),
                Harm::Hurt(..) => None,
            })
            .collect()
    }

    pub fn journal(&self) -> Vec<Harm> {
        self.journal.lock().clone()
    }
}

impl PlayerService for TestWorld {
    fn find_by_id(&self, player_id: PlayerId) -> Option<PlayerHandle> {
        self.bodies.get(&player_id).map(|_| {
            PlayerHandle::new(player_id, format!("player-{}", player_id), Vec3::default())
        })
    }

    fn water_info(&self, player: &PlayerHandle) -> WaterInfo {
        self.bodies
            .get(&player.id)
            .map(|body| WaterInfo::at_depth(body.depth))
            .unwrap_or_else(WaterInfo::invalid)
    }

    fn hurt(&self, player: &PlayerHandle, damage: DamageInfo) {
        self.journal.lock().push(Harm::Hurt(player.id, damage));
    }

    fn kill(&self, player: &PlayerHandle) {
        self.journal.lock().push(Harm::Killed(player.id));
    }
}

/// In-process host with a virtual clock.
pub struct TestHost {
    pub events: Arc<EventSystem>,
    pub world: Arc<TestWorld>,
    pub timers: Arc<TickTimerService>,
    /// What plugins see as the host scheduler; `timers` unless overridden
    clock: Arc<dyn TimerService>,
    pub permissions: Arc<PermissionRegistry>,
    pub store: Arc<JsonConfigStore>,
    _config_dir: tempfile::TempDir,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        let timers = Arc::new(TickTimerService::new());
        Self::build(timers.clone(), timers)
    }

    /// A host whose plugins schedule through `clock` instead of the virtual
    /// clock.
    pub fn with_timers(clock: Arc<dyn TimerService>) -> Arc<Self> {
        Self::build(Arc::new(TickTimerService::new()), clock)
    }

    fn build(timers: Arc<TickTimerService>, clock: Arc<dyn TimerService>) -> Arc<Self> {
        // Only the first test in the binary gets to install the subscriber
        let _ = setup_logging(&LoggingSettings {
            level: "debug".to_string(),
            json_format: false,
        });

        let config_dir = tempfile::tempdir().expect("temp config dir");
        Arc::new(Self {
            events: create_event_system(),
            world: Arc::new(TestWorld::default()),
            timers,
            clock,
            permissions: Arc::new(PermissionRegistry::new()),
            store: Arc::new(JsonConfigStore::new(config_dir.path())),
            _config_dir: config_dir,
        })
    }

    pub fn context(self: &Arc<Self>) -> Arc<dyn ServerContext> {
        self.clone()
    }

    /// Runs both lifecycle phases for a fresh plugin.
    pub async fn load_plugin(self: &Arc<Self>) -> PluginWrapper<NoWaterSleepPlugin> {
        let mut plugin = PluginWrapper::new(NoWaterSleepPlugin::new());
        plugin
            .pre_init(self.context())
            .await
            .expect("handler registration");
        plugin.init(self.context()).await.expect("plugin init");
        plugin
    }

    pub async fn server_ready(&self) {
        let event = ServerInitializedEvent {
            is_startup: true,
            sleeping_players: self.world.sleepers(),
            timestamp: current_timestamp(),
        };
        self.events
            .emit_core("server_initialized", &event)
            .await
            .expect("emit server_initialized");
    }

    /// Disconnects the player, leaving a sleeper at `depth`, and lets the
    /// deferred check run.
    pub async fn disconnect(&self, player_id: PlayerId, depth: f32) {
        self.world.spawn_sleeper(player_id, depth);
        let event = PlayerDisconnectedEvent {
            player_id,
            connection_id: format!("conn-{}", player_id),
            reason: DisconnectReason::ClientDisconnect,
            timestamp: current_timestamp(),
        };
        self.events
            .emit_core("player_disconnected", &event)
            .await
            .expect("emit player_disconnected");
        self.timers.run_due();
    }

    pub async fn connect(&self, player_id: PlayerId) {
        self.world.wake(player_id);
        let event = PlayerConnectedEvent {
            player_id,
            connection_id: format!("conn-{}", player_id),
            remote_addr: "127.0.0.1:28015".to_string(),
            timestamp: current_timestamp(),
        };
        self.events
            .emit_core("player_connected", &event)
            .await
            .expect("emit player_connected");
    }

    pub fn advance_secs(&self, seconds: u64) -> usize {
        self.timers.advance(Duration::from_secs(seconds))
    }
}

impl ServerContext for TestHost {
    fn events(&self) -> Arc<EventSystem> {
        Arc::clone(&self.events)
    }

    fn log(&self, level: LogLevel, message: &str) {
        forward_to_tracing(level, message);
    }

    fn timers(&self) -> Arc<dyn TimerService> {
        Arc::clone(&self.clock)
    }

    fn players(&self) -> Arc<dyn PlayerService> {
        self.world.clone()
    }

    fn permissions(&self) -> Arc<dyn PermissionService> {
        self.permissions.clone()
    }

    fn config_store(&self) -> Arc<dyn ConfigStore> {
        self.store.clone()
    }
}
