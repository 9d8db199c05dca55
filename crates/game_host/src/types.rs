//! Core value types shared between the host and its plugins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric identifier for a player, connected or sleeping.
///
/// The host guarantees one identifier per player for the lifetime of the
/// server, so plugins can safely use it as a map key for per-player state.
///
/// # Examples
///
/// ```rust
/// use game_host::PlayerId;
///
/// let player_id = PlayerId::new(76561198000000001);
/// assert_eq!(player_id.to_string(), "76561198000000001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A resolved player as seen by the host at the moment of lookup.
///
/// Handles are snapshots: a plugin that holds on to one across a timer
/// boundary should resolve the player again by [`PlayerId`] before acting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHandle {
    pub id: PlayerId,
    pub display_name: String,
    pub position: Vec3,
}

impl PlayerHandle {
    pub fn new(id: PlayerId, display_name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            position,
        }
    }
}

/// Result of a water depth query at a player's position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterInfo {
    /// False when the host could not take a measurement at this position
    pub is_valid: bool,
    /// Depth of water above the measured point, in world units
    pub current_depth: f32,
}

impl WaterInfo {
    pub const fn dry() -> Self {
        Self {
            is_valid: true,
            current_depth: 0.0,
        }
    }

    pub const fn at_depth(current_depth: f32) -> Self {
        Self {
            is_valid: true,
            current_depth,
        }
    }

    pub const fn invalid() -> Self {
        Self {
            is_valid: false,
            current_depth: 0.0,
        }
    }
}

/// Kind of damage applied to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Generic,
    Drowned,
    Fall,
    Suicide,
}

/// A single damage application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageInfo {
    pub amount: f32,
    pub kind: DamageType,
    /// When false, armour and other protective mitigation is bypassed
    pub use_protection: bool,
}

impl DamageInfo {
    pub const fn new(amount: f32, kind: DamageType, use_protection: bool) -> Self {
        Self {
            amount,
            kind,
            use_protection,
        }
    }
}
