//! Reacts to server and player lifecycle events by deciding which sleepers
//! the drowning policy applies to.

use crate::coordinator::DrowningCoordinator;
use crate::permissions::is_exempt;
use crate::policy::DrowningPolicy;
use crate::water::is_underwater;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use game_host::{
    PermissionService, PlayerConnectedEvent, PlayerDisconnectedEvent, PlayerHandle, PlayerId,
    PlayerService, ServerInitializedEvent, TimerHandle, TimerService,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// What happened to a single sleeper when the policy was considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleeperOutcome {
    /// The host no longer knows the player
    Missing,
    Exempt,
    /// Not submerged, or the water measurement was invalid
    Dry,
    Scheduled,
    /// A drowning sequence was already running
    AlreadyTracked,
    Killed,
}

/// Tally of a server-ready sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub examined: usize,
    pub missing: usize,
    pub exempt: usize,
    pub dry: usize,
    pub scheduled: usize,
    pub already_tracked: usize,
    pub killed: usize,
}

impl SweepSummary {
    fn record(&mut self, outcome: SleeperOutcome) {
        self.examined += 1;
        match outcome {
            SleeperOutcome::Missing => self.missing += 1,
            SleeperOutcome::Exempt => self.exempt += 1,
            SleeperOutcome::Dry => self.dry += 1,
            SleeperOutcome::Scheduled => self.scheduled += 1,
            SleeperOutcome::AlreadyTracked => self.already_tracked += 1,
            SleeperOutcome::Killed => self.killed += 1,
        }
    }
}

/// A disconnect check waiting for the next tick. The sequence tells a
/// firing callback whether the slot still holds its own check.
struct DeferredCheck {
    sequence: u64,
    timer: TimerHandle,
}

pub struct SleeperWatch {
    players: Arc<dyn PlayerService>,
    permissions: Arc<dyn PermissionService>,
    timers: Arc<dyn TimerService>,
    policy: DrowningPolicy,
    /// Present only under [`DrowningPolicy::DelayThenDamage`]
    coordinator: Option<Arc<DrowningCoordinator>>,
    /// Disconnect checks waiting for the next tick
    deferred: DashMap<PlayerId, DeferredCheck>,
    next_check: AtomicU64,
}

impl SleeperWatch {
    pub fn new(
        players: Arc<dyn PlayerService>,
        permissions: Arc<dyn PermissionService>,
        timers: Arc<dyn TimerService>,
        policy: DrowningPolicy,
    ) -> Arc<Self> {
        let coordinator = policy.schedule().map(|schedule| {
            DrowningCoordinator::new(Arc::clone(&timers), Arc::clone(&players), schedule)
        });

        Arc::new(Self {
            players,
            permissions,
            timers,
            policy,
            coordinator,
            deferred: DashMap::new(),
            next_check: AtomicU64::new(1),
        })
    }

    pub fn policy(&self) -> DrowningPolicy {
        self.policy
    }

    pub fn coordinator(&self) -> Option<&Arc<DrowningCoordinator>> {
        self.coordinator.as_ref()
    }

    /// Disconnect checks scheduled but not yet run.
    pub fn deferred_checks(&self) -> usize {
        self.deferred.len()
    }

    /// Applies the policy to every sleeper present when the server came up.
    pub fn on_server_initialized(&self, event: &ServerInitializedEvent) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for &player_id in &event.sleeping_players {
            summary.record(self.consider(player_id));
        }

        debug!(
            "Startup sweep (startup: {}): {:?}",
            event.is_startup, summary
        );
        summary
    }

    /// Defers the check to the next tick, once the host has turned the player
    /// into a sleeper.
    pub fn on_player_disconnected(self: &Arc<Self>, event: &PlayerDisconnectedEvent) {
        let player_id = event.player_id;
        // The shard stays locked until the new check is stored, so a callback
        // that fires early waits here before looking for its slot.
        match self.deferred.entry(player_id) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(self.schedule_check(player_id));
                previous.timer.destroy();
            }
            Entry::Vacant(slot) => {
                slot.insert(self.schedule_check(player_id));
            }
        }
    }

    fn schedule_check(self: &Arc<Self>, player_id: PlayerId) -> DeferredCheck {
        let sequence = self.next_check.fetch_add(1, Ordering::Relaxed);
        let watch = Arc::downgrade(self);
        let timer = self.timers.next_tick(Box::new(move || {
            let Some(watch) = watch.upgrade() else {
                return;
            };
            let claimed = watch
                .deferred
                .remove_if(&player_id, |_, check| check.sequence == sequence)
                .is_some();
            if claimed {
                let outcome = watch.consider(player_id);
                debug!("Disconnect check for {}: {:?}", player_id, outcome);
            }
        }));
        DeferredCheck { sequence, timer }
    }

    pub fn on_player_connected(&self, event: &PlayerConnectedEvent) {
        if let Some((_, check)) = self.deferred.remove(&event.player_id) {
            check.timer.destroy();
        }
        if let Some(coordinator) = &self.coordinator {
            coordinator.stop_drowning(event.player_id);
        }
    }

    pub fn shutdown(&self) {
        self.deferred.retain(|_, check| {
            check.timer.destroy();
            false
        });
        if let Some(coordinator) = &self.coordinator {
            coordinator.shutdown();
        }
    }

    /// Resolves `player_id` and applies the policy if it is an unexempt
    /// sleeper underwater.
    pub fn consider(&self, player_id: PlayerId) -> SleeperOutcome {
        let Some(player) = self.players.find_by_id(player_id) else {
            return SleeperOutcome::Missing;
        };
        if is_exempt(self.permissions.as_ref(), player_id) {
            return SleeperOutcome::Exempt;
        }
        if !is_underwater(&self.players.water_info(&player)) {
            return SleeperOutcome::Dry;
        }
        self.apply(&player)
    }

    fn apply(&self, player: &PlayerHandle) -> SleeperOutcome {
        match (&self.policy, &self.coordinator) {
            (DrowningPolicy::DelayThenDamage(_), Some(coordinator)) => {
                if coordinator.schedule_pending_drown(player.id) {
                    SleeperOutcome::Scheduled
                } else {
                    SleeperOutcome::AlreadyTracked
                }
            }
            _ => {
                info!("💀 Killing {} for sleeping underwater", player.display_name);
                self.players.kill(player);
                SleeperOutcome::Killed
            }
        }
    }
}
