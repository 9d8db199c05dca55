//! Core event routing between the host and its plugins.
//!
//! Events are serialized once with `serde_json` and handed to every handler
//! registered under the same key. Core events live under the `core:`
//! namespace and describe server lifecycle and player connection changes.

use crate::error::EventError;
use crate::types::PlayerId;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Core trait for all events in the system.
///
/// Any type that implements `Serialize + DeserializeOwned + Send + Sync + Debug`
/// gets this through the blanket implementation below.
pub trait Event: Send + Sync + Any + std::fmt::Debug {
    fn type_name() -> &'static str
    where
        Self: Sized;

    fn serialize(&self) -> Result<Vec<u8>, EventError>;

    fn deserialize(data: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;
}

impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Any + std::fmt::Debug + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn serialize(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(EventError::Serialization)
    }

    fn deserialize(data: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(data).map_err(EventError::Deserialization)
    }
}

/// Handler trait for processing events asynchronously.
///
/// Most users will not implement this directly but register closures through
/// [`EventSystem::on_core`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, data: &[u8]) -> Result<(), EventError>;

    fn handler_name(&self) -> &str;
}

/// Type-safe wrapper that deserializes the payload before calling the closure.
pub struct TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T, F> TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> EventHandler for TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    async fn handle(&self, data: &[u8]) -> Result<(), EventError> {
        let event = T::deserialize(data)?;
        (self.handler)(event)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// The event system that routes core events to plugin handlers.
///
/// # Thread Safety
///
/// Shared as `Arc<EventSystem>`. Registration and emission are guarded by
/// async read-write locks, and a failing handler never prevents the remaining
/// handlers from running.
///
/// # Examples
///
/// ```rust,no_run
/// use game_host::{EventSystem, PlayerConnectedEvent};
///
/// # async fn demo() -> Result<(), game_host::EventError> {
/// let events = EventSystem::new();
/// events.on_core("player_connected", |event: PlayerConnectedEvent| {
///     println!("Player {} connected", event.player_id);
///     Ok(())
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub struct EventSystem {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    stats: RwLock<EventSystemStats>,
}

impl EventSystem {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventSystemStats::default()),
        }
    }

    /// Registers a handler for a core server event such as `player_connected`.
    pub async fn on_core<T, F>(&self, event_name: &str, handler: F) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let event_key = format!("core:{}", event_name);
        self.register_typed_handler(event_key, event_name, handler)
            .await
    }

    async fn register_typed_handler<T, F>(
        &self,
        event_key: String,
        event_name: &str,
        handler: F,
    ) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let handler_name = format!("{}::{}", event_key, T::type_name());
        let typed_handler = TypedEventHandler::new(handler_name, handler);
        let handler_arc: Arc<dyn EventHandler> = Arc::new(typed_handler);

        let mut handlers = self.handlers.write().await;
        handlers
            .entry(event_key.clone())
            .or_insert_with(Vec::new)
            .push(handler_arc);

        let mut stats = self.stats.write().await;
        stats.total_handlers += 1;

        debug!("📝 Registered handler for {} ({})", event_key, event_name);
        Ok(())
    }

    /// Emits a core event to every registered handler.
    ///
    /// Only serialization failures are returned; handler failures are logged.
    pub async fn emit_core<T>(&self, event_name: &str, event: &T) -> Result<(), EventError>
    where
        T: Event,
    {
        let event_key = format!("core:{}", event_name);
        self.emit_event(&event_key, event).await
    }

    async fn emit_event<T>(&self, event_key: &str, event: &T) -> Result<(), EventError>
    where
        T: Event,
    {
        let data = event.serialize()?;
        let handlers = self.handlers.read().await;

        if let Some(event_handlers) = handlers.get(event_key) {
            debug!(
                "📤 Emitting {} to {} handlers",
                event_key,
                event_handlers.len()
            );

            for handler in event_handlers {
                if let Err(e) = handler.handle(&data).await {
                    error!("❌ Handler {} failed: {}", handler.handler_name(), e);
                }
            }

            let mut stats = self.stats.write().await;
            stats.events_emitted += 1;
        } else {
            warn!("⚠️ No handlers for event: {}", event_key);
        }

        Ok(())
    }

    pub async fn get_stats(&self) -> EventSystemStats {
        let stats = self.stats.read().await;
        stats.clone()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for monitoring the event system.
#[derive(Debug, Default, Clone)]
pub struct EventSystemStats {
    pub total_handlers: usize,
    pub events_emitted: u64,
}

// ============================================================================
// Core Server Events
// ============================================================================

/// Emitted once the server has finished loading and plugins may act on the
/// world. Carries the sleepers that were already present at that moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInitializedEvent {
    /// True on a cold start, false when the server re-initializes (e.g. plugin reload)
    pub is_startup: bool,
    /// Snapshot of every player in the sleeping state
    pub sleeping_players: Vec<PlayerId>,
    pub timestamp: u64,
}

/// Emitted when a player connects (or reconnects) to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConnectedEvent {
    pub player_id: PlayerId,
    /// Connection-specific identifier for this session
    pub connection_id: String,
    pub remote_addr: String,
    pub timestamp: u64,
}

/// Emitted when a player disconnects. The player usually stays in the world
/// as a sleeper afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnectedEvent {
    pub player_id: PlayerId,
    pub connection_id: String,
    pub reason: DisconnectReason,
    pub timestamp: u64,
}

/// Enumeration of possible disconnection reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Player initiated disconnection (normal logout)
    ClientDisconnect,
    /// Connection timed out due to inactivity or network issues
    Timeout,
    /// Server is shutting down gracefully
    ServerShutdown,
    /// An error occurred that forced disconnection
    Error(String),
}

/// Emitted by the plugin manager after a plugin finished initializing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginLoadedEvent {
    pub plugin_name: String,
    pub version: String,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct TestEvent {
        message: String,
    }

    #[tokio::test]
    async fn core_handlers_receive_emitted_events() {
        let events = EventSystem::new();
        let received = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&received);
        events
            .on_core("player_connected", move |event: PlayerConnectedEvent| {
                assert_eq!(event.player_id, PlayerId(7));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events
            .emit_core(
                "player_connected",
                &PlayerConnectedEvent {
                    player_id: PlayerId(7),
                    connection_id: "conn_1".to_string(),
                    remote_addr: "127.0.0.1:28015".to_string(),
                    timestamp: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 1);
        let stats = events.get_stats().await;
        assert_eq!(stats.total_handlers, 1);
        assert_eq!(stats.events_emitted, 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let events = EventSystem::new();
        let received = Arc::new(AtomicUsize::new(0));

        events
            .on_core("server_started", |_: TestEvent| {
                Err(EventError::HandlerExecution("boom".to_string()))
            })
            .await
            .unwrap();

        let counter = Arc::clone(&received);
        events
            .on_core("server_started", move |event: TestEvent| {
                assert_eq!(event.message, "online");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        events
            .emit_core(
                "server_started",
                &TestEvent {
                    message: "online".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn emitting_without_handlers_is_not_an_error() {
        let events = EventSystem::new();
        events
            .emit_core(
                "nobody_listens",
                &TestEvent {
                    message: "hello".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(events.get_stats().await.events_emitted, 0);
    }

    #[tokio::test]
    async fn mismatched_payload_is_reported_to_the_log_only() {
        let events = EventSystem::new();
        events
            .on_core("player_disconnected", |_: PlayerDisconnectedEvent| Ok(()))
            .await
            .unwrap();

        let result = events
            .emit_core(
                "player_disconnected",
                &TestEvent {
                    message: "not a disconnect".to_string(),
                },
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn typed_handler_decodes_its_own_payload() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler: Box<dyn EventHandler> = Box::new(TypedEventHandler::new(
            "core:test".to_string(),
            move |event: TestEvent| {
                assert_eq!(event.message, "ping");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ));

        let payload = Event::serialize(&TestEvent {
            message: "ping".to_string(),
        })
        .unwrap();
        handler.handle(&payload).await.unwrap();
        assert!(handler.handle(b"not json").await.is_err());

        assert_eq!(handler.handler_name(), "core:test");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
