//! Per-player drowning timer lifecycle.
//!
//! Every tracked player is in exactly one of two phases. While `Pending` the
//! entry owns the one-shot delay timer; while `Active` it owns the repeating
//! damage timer. Moving from one to the other destroys the old handle before
//! the entry is replaced, so a player never has two live timers.
//!
//! Timer callbacks hold only a [`Weak`](std::sync::Weak) reference and the sequence number of
//! the entry that armed them. A callback whose entry has since been replaced
//! or removed returns without touching anything, which covers invocations
//! already in flight when a handle was destroyed.

use crate::policy::DrowningSchedule;
use crate::water::is_underwater;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use game_host::{
    DamageInfo, DamageType, PlayerHandle, PlayerId, PlayerService, Repetitions, TimerHandle,
    TimerService,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrowningPhase {
    /// Waiting out the grace delay
    Pending,
    /// Taking damage every interval
    Active,
}

#[derive(Debug)]
struct DrowningEntry {
    phase: DrowningPhase,
    sequence: u64,
    timer: TimerHandle,
}

pub struct DrowningCoordinator {
    timers: Arc<dyn TimerService>,
    players: Arc<dyn PlayerService>,
    schedule: DrowningSchedule,
    entries: DashMap<PlayerId, DrowningEntry>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
}

impl DrowningCoordinator {
    pub fn new(
        timers: Arc<dyn TimerService>,
        players: Arc<dyn PlayerService>,
        schedule: DrowningSchedule,
    ) -> Arc<Self> {
        Arc::new(Self {
            timers,
            players,
            schedule,
            entries: DashMap::new(),
            next_sequence: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    pub fn schedule(&self) -> DrowningSchedule {
        self.schedule
    }

    /// Starts the grace delay for `player_id`.
    ///
    /// Returns false without scheduling anything if the player already has a
    /// pending or active entry, or if the coordinator has been shut down.
    pub fn schedule_pending_drown(self: &Arc<Self>, player_id: PlayerId) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.entries.entry(player_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let sequence = self.next_sequence();
                let coordinator = Arc::downgrade(self);
                let timer = self.timers.once(
                    self.schedule.delay,
                    Box::new(move || {
                        if let Some(coordinator) = coordinator.upgrade() {
                            coordinator.on_pending_elapsed(player_id, sequence);
                        }
                    }),
                );

                slot.insert(DrowningEntry {
                    phase: DrowningPhase::Pending,
                    sequence,
                    timer,
                });
                info!(
                    "⏳ {} starts drowning in {:?} unless they surface",
                    player_id, self.schedule.delay
                );
                true
            }
        }
    }

    /// Moves a pending `player_id` into the damage phase, destroying the
    /// pending delay.
    ///
    /// Returns false if the player has no pending entry; damage always
    /// follows a pending delay.
    pub fn begin_active_damage(self: &Arc<Self>, player_id: PlayerId) -> bool {
        let sequence = match self.entries.get(&player_id) {
            Some(entry) if entry.phase == DrowningPhase::Pending => entry.sequence,
            _ => return false,
        };
        self.promote_pending(player_id, sequence)
    }

    /// Swaps the pending entry armed with `sequence` for a damage entry in a
    /// single entry lock. Any other state means the entry was stopped or
    /// replaced in the meantime.
    fn promote_pending(self: &Arc<Self>, player_id: PlayerId, sequence: u64) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.entries.entry(player_id) {
            Entry::Occupied(mut slot)
                if slot.get().sequence == sequence
                    && slot.get().phase == DrowningPhase::Pending =>
            {
                slot.get().timer.destroy();
                let entry = self.arm_damage(player_id);
                slot.insert(entry);
            }
            _ => return false,
        }

        info!("🌊 {} is drowning in their sleep", player_id);
        true
    }

    /// Cancels whatever is running for `player_id`. Safe to call for players
    /// that were never tracked.
    pub fn stop_drowning(&self, player_id: PlayerId) -> bool {
        match self.entries.remove(&player_id) {
            Some((_, entry)) => {
                entry.timer.destroy();
                debug!("🛑 Stopped drowning sequence for {}", player_id);
                true
            }
            None => false,
        }
    }

    /// Destroys every live timer and refuses further scheduling.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut cancelled = 0usize;
        self.entries.retain(|_, entry| {
            entry.timer.destroy();
            cancelled += 1;
            false
        });
        debug!("Cancelled {} drowning sequences", cancelled);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn phase(&self, player_id: PlayerId) -> Option<DrowningPhase> {
        self.entries.get(&player_id).map(|entry| entry.phase)
    }

    pub fn tracked(&self) -> usize {
        self.entries.len()
    }

    pub fn pending_count(&self) -> usize {
        self.count_in(DrowningPhase::Pending)
    }

    pub fn active_count(&self) -> usize {
        self.count_in(DrowningPhase::Active)
    }

    fn count_in(&self, phase: DrowningPhase) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.phase == phase)
            .count()
    }

    fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn arm_damage(self: &Arc<Self>, player_id: PlayerId) -> DrowningEntry {
        let sequence = self.next_sequence();
        let coordinator = Arc::downgrade(self);
        let timer = self.timers.repeat(
            self.schedule.interval,
            Repetitions::Forever,
            Box::new(move || {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.on_damage_tick(player_id, sequence);
                }
            }),
        );

        DrowningEntry {
            phase: DrowningPhase::Active,
            sequence,
            timer,
        }
    }

    fn is_current(&self, player_id: PlayerId, sequence: u64, phase: DrowningPhase) -> bool {
        self.entries
            .get(&player_id)
            .map(|entry| entry.sequence == sequence && entry.phase == phase)
            .unwrap_or(false)
    }

    /// Resolves the player again and returns it only if still submerged.
    fn still_underwater(&self, player_id: PlayerId) -> Option<PlayerHandle> {
        let player = self.players.find_by_id(player_id)?;
        is_underwater(&self.players.water_info(&player)).then_some(player)
    }

    fn clear_if_current(&self, player_id: PlayerId, sequence: u64) {
        if let Some((_, entry)) = self
            .entries
            .remove_if(&player_id, |_, entry| entry.sequence == sequence)
        {
            entry.timer.destroy();
            trace!("{} is no longer drowning", player_id);
        }
    }

    fn on_pending_elapsed(self: &Arc<Self>, player_id: PlayerId, sequence: u64) {
        if !self.is_current(player_id, sequence, DrowningPhase::Pending) {
            return;
        }

        match self.still_underwater(player_id) {
            Some(_) => {
                self.promote_pending(player_id, sequence);
            }
            None => self.clear_if_current(player_id, sequence),
        }
    }

    fn on_damage_tick(&self, player_id: PlayerId, sequence: u64) {
        if !self.is_current(player_id, sequence, DrowningPhase::Active) {
            return;
        }

        match self.still_underwater(player_id) {
            Some(player) => {
                trace!("💧 Drowning damage for {}", player_id);
                self.players.hurt(
                    &player,
                    DamageInfo::new(self.schedule.damage_per_tick, DamageType::Drowned, false),
                );
            }
            None => self.clear_if_current(player_id, sequence),
        }
    }
}

impl Drop for DrowningCoordinator {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.destroy();
        }
    }
}
