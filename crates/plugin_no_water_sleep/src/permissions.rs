//! Permissions registered by this plugin.

use game_host::{PermissionService, PlayerId, ServerError};

/// Players holding this permission are never drowned or killed.
pub const IGNORE: &str = "nowatersleep.ignore";

const PERMISSIONS: &[&str] = &[IGNORE];

pub fn register_permissions(
    service: &dyn PermissionService,
    owner: &str,
) -> Result<(), ServerError> {
    for permission in PERMISSIONS {
        service.register_permission(permission, owner)?;
    }
    Ok(())
}

pub fn is_exempt(service: &dyn PermissionService, player_id: PlayerId) -> bool {
    service.user_has_permission(player_id, IGNORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_host::PermissionRegistry;

    #[test]
    fn ignore_permission_exempts_player() {
        let registry = PermissionRegistry::new();
        register_permissions(&registry, "no_water_sleep").unwrap();

        let player = PlayerId(5);
        assert!(!is_exempt(&registry, player));

        registry.grant_user(player, IGNORE).unwrap();
        assert!(is_exempt(&registry, player));
    }
}
