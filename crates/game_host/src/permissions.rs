//! In-memory permission registry.

use crate::context::PermissionService;
use crate::error::ServerError;
use crate::types::PlayerId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// Permission storage keyed by player.
///
/// Permission names must be registered before they can be granted. The
/// registry remembers which owner registered each name so two plugins cannot
/// silently claim the same permission.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    /// Permission name → owner that registered it
    registered: DashMap<String, String>,
    grants: DashMap<PlayerId, HashSet<String>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, permission: &str) -> bool {
        self.registered.contains_key(permission)
    }

    pub fn grant_user(&self, player_id: PlayerId, permission: &str) -> Result<(), ServerError> {
        if !self.is_registered(permission) {
            return Err(ServerError::UnknownPermission(permission.to_string()));
        }

        self.grants
            .entry(player_id)
            .or_default()
            .insert(permission.to_string());
        debug!("🔑 Granted {} to {}", permission, player_id);
        Ok(())
    }

    /// Returns true if the player actually held the permission.
    pub fn revoke_user(&self, player_id: PlayerId, permission: &str) -> bool {
        self.grants
            .get_mut(&player_id)
            .map(|mut granted| granted.remove(permission))
            .unwrap_or(false)
    }
}

impl PermissionService for PermissionRegistry {
    fn register_permission(&self, permission: &str, owner: &str) -> Result<(), ServerError> {
        match self.registered.entry(permission.to_string()) {
            Entry::Occupied(existing) if existing.get() != owner => {
                Err(ServerError::PermissionConflict {
                    name: permission.to_string(),
                    owner: existing.get().clone(),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(owner.to_string());
                debug!("🔑 Registered permission {} for {}", permission, owner);
                Ok(())
            }
        }
    }

    fn user_has_permission(&self, player_id: PlayerId, permission: &str) -> bool {
        self.grants
            .get(&player_id)
            .map(|granted| granted.contains(permission))
            .unwrap_or(false)
    }
}
