use game_host::WaterInfo;

/// Depth, in world units, above which a player counts as submerged.
pub const UNDERWATER_DEPTH: f32 = 1.0;

/// A player is underwater when the host took a valid measurement and the
/// water above them is deeper than [`UNDERWATER_DEPTH`].
pub fn is_underwater(info: &WaterInfo) -> bool {
    info.is_valid && info.current_depth > UNDERWATER_DEPTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_must_exceed_threshold() {
        assert!(!is_underwater(&WaterInfo::at_depth(1.0)));
        assert!(is_underwater(&WaterInfo::at_depth(1.01)));
        assert!(!is_underwater(&WaterInfo::dry()));
    }

    #[test]
    fn invalid_measurements_never_count() {
        let info = WaterInfo {
            is_valid: false,
            current_depth: 50.0,
        };
        assert!(!is_underwater(&info));
    }
}
