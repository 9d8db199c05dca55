//! What happens to a player found asleep underwater.

use std::time::Duration;

/// Timing and damage for the delayed drowning sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrowningSchedule {
    /// Grace period between falling asleep underwater and the first damage
    pub delay: Duration,
    pub damage_per_tick: f32,
    pub interval: Duration,
}

/// Chosen once per deployment. The immediate variant has no pending or
/// active phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrowningPolicy {
    /// Kill the sleeper on the spot.
    KillImmediately,
    /// Wait `delay`, then drown with repeating damage while still submerged.
    DelayThenDamage(DrowningSchedule),
}

impl DrowningPolicy {
    pub fn schedule(&self) -> Option<DrowningSchedule> {
        match self {
            DrowningPolicy::KillImmediately => None,
            DrowningPolicy::DelayThenDamage(schedule) => Some(*schedule),
        }
    }
}
