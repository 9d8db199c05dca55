//! Timer scheduling for plugins.
//!
//! Two schedulers are provided:
//!
//! - [`TickTimerService`]: a virtual clock advanced by the server's game loop.
//!   Callbacks run on the thread that calls [`TickTimerService::advance`], so
//!   everything a plugin does from a timer is serialized with the rest of the
//!   tick. This is the default for hosts with a fixed tick.
//! - [`TokioTimerService`]: wall-clock timers backed by `tokio::time`, for
//!   hosts that are fully async.
//!
//! Both hand out [`TimerHandle`]s. Destroying a handle flags the timer as
//! cancelled; schedulers check the flag before every fire. A callback that is
//! already running is not interrupted.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Boxed timer callback. Repeating timers call the same closure every time.
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

/// Identifier of a scheduled timer, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Cancellable reference to a scheduled callback.
///
/// Cloning a handle shares the cancellation flag, so any clone can destroy the
/// timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: TimerId,
    destroyed: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new(id: TimerId) -> Self {
        Self {
            id,
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancels the timer. The callback will not be invoked again.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// How many times a repeating timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetitions {
    Forever,
    Times(NonZeroU32),
}

/// Scheduling capability handed to plugins through the server context.
///
/// Implementations never invoke a callback from inside `once`, `repeat` or
/// `next_tick`, so callers may hold their own locks while scheduling.
pub trait TimerService: Send + Sync {
    /// Runs `callback` once after `delay`.
    fn once(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Runs `callback` every `interval`, first after one full interval.
    fn repeat(
        &self,
        interval: Duration,
        repetitions: Repetitions,
        callback: TimerCallback,
    ) -> TimerHandle;

    /// Runs `callback` at the next opportunity, after the current event has
    /// finished processing.
    fn next_tick(&self, callback: TimerCallback) -> TimerHandle {
        self.once(Duration::ZERO, callback)
    }
}

/// Shortest interval a repeating timer may have.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Tick-driven scheduler
// ============================================================================

struct ScheduledTimer {
    handle: TimerHandle,
    interval: Option<Duration>,
    /// Fires left for a repeating timer; `None` means forever
    remaining: Option<u32>,
    callback: TimerCallback,
}

#[derive(Default)]
struct TickState {
    now: Duration,
    queue: BTreeMap<(Duration, TimerId), ScheduledTimer>,
}

/// Deterministic scheduler driven by the host's game loop.
///
/// # Examples
///
/// ```rust
/// use game_host::{TickTimerService, TimerService};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let timers = TickTimerService::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// timers.once(Duration::from_secs(5), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// timers.advance(Duration::from_secs(4));
/// assert!(!fired.load(Ordering::SeqCst));
/// timers.advance(Duration::from_secs(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct TickTimerService {
    state: Mutex<TickState>,
    next_id: AtomicU64,
}

impl TickTimerService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TickState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Time elapsed on this scheduler's clock.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of scheduled timers that have not been destroyed.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .values()
            .filter(|timer| !timer.handle.is_destroyed())
            .count()
    }

    /// Moves the clock forward, firing every timer that comes due on the way.
    ///
    /// Timers fire in due-time order; timers due at the same instant fire in
    /// the order they were scheduled. Timers scheduled by a callback fire in
    /// the same call if they come due before the new time. Returns the
    /// number of callbacks invoked.
    pub fn advance(&self, elapsed: Duration) -> usize {
        let target = self.state.lock().now + elapsed;
        let mut fired = 0;

        loop {
            let (due, mut timer) = {
                let mut state = self.state.lock();
                let key = match state.queue.keys().next() {
                    Some(key) if key.0 <= target => *key,
                    _ => break,
                };
                state.now = key.0;
                match state.queue.remove(&key) {
                    Some(timer) => (key.0, timer),
                    None => break,
                }
            };

            if timer.handle.is_destroyed() {
                continue;
            }

            trace!("⏰ Firing timer {:?} at {:?}", timer.handle.id(), due);
            (timer.callback)();
            fired += 1;

            let Some(interval) = timer.interval else {
                continue;
            };
            if timer.handle.is_destroyed() {
                continue;
            }
            timer.remaining = match timer.remaining {
                None => None,
                Some(left) if left > 1 => Some(left - 1),
                Some(_) => continue,
            };

            let id = timer.handle.id();
            self.state.lock().queue.insert((due + interval, id), timer);
        }

        self.state.lock().now = target;
        fired
    }

    /// Fires everything already due without moving the clock.
    pub fn run_due(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    fn schedule(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        remaining: Option<u32>,
        callback: TimerCallback,
    ) -> TimerHandle {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = TimerHandle::new(id);

        let mut state = self.state.lock();
        let due = state.now + delay;
        state.queue.insert(
            (due, id),
            ScheduledTimer {
                handle: handle.clone(),
                interval,
                remaining,
                callback,
            },
        );
        handle
    }
}

impl Default for TickTimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerService for TickTimerService {
    fn once(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        self.schedule(delay, None, None, callback)
    }

    fn repeat(
        &self,
        interval: Duration,
        repetitions: Repetitions,
        callback: TimerCallback,
    ) -> TimerHandle {
        let interval = interval.max(MIN_REPEAT_INTERVAL);
        let remaining = match repetitions {
            Repetitions::Forever => None,
            Repetitions::Times(count) => Some(count.get()),
        };
        self.schedule(interval, Some(interval), remaining, callback)
    }
}

// ============================================================================
// Tokio-backed scheduler
// ============================================================================

/// Wall-clock scheduler that spawns one `tokio` task per timer.
pub struct TokioTimerService {
    runtime: Handle,
    next_id: AtomicU64,
}

impl TokioTimerService {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
        }
    }

    /// Builds a service on the runtime the caller is running in.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    fn next_handle(&self) -> TimerHandle {
        TimerHandle::new(TimerId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

impl TimerService for TokioTimerService {
    fn once(&self, delay: Duration, mut callback: TimerCallback) -> TimerHandle {
        let handle = self.next_handle();
        let task_handle = handle.clone();

        self.runtime.spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            if !task_handle.is_destroyed() {
                callback();
            }
        });

        handle
    }

    fn repeat(
        &self,
        interval: Duration,
        repetitions: Repetitions,
        mut callback: TimerCallback,
    ) -> TimerHandle {
        let handle = self.next_handle();
        let task_handle = handle.clone();
        let interval = interval.max(MIN_REPEAT_INTERVAL);

        self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut remaining = match repetitions {
                Repetitions::Forever => None,
                Repetitions::Times(count) => Some(count.get()),
            };

            loop {
                ticker.tick().await;
                if task_handle.is_destroyed() {
                    break;
                }
                callback();

                remaining = match remaining {
                    None => None,
                    Some(left) if left > 1 => Some(left - 1),
                    Some(_) => break,
                };
            }
        });

        handle
    }
}
