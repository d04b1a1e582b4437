#![forbid(unsafe_code)]

//! Trailing-edge debouncer for state persistence.
//!
//! Every mutation of the session calls [`PersistDebouncer::schedule_at`],
//! which (re)starts a quiet-period timer. The host polls
//! [`PersistDebouncer::tick_at`] from its event loop; once no mutation has
//! arrived for the full quiet period the debouncer reports
//! [`DebounceAction::Flush`] exactly once.
//!
//! # Usage
//!
//! ```
//! use std::time::{Duration, Instant};
//! use allot_runtime::debounce::{DebounceAction, DebounceConfig, PersistDebouncer};
//!
//! let mut debouncer = PersistDebouncer::new(DebounceConfig::default());
//! let t0 = Instant::now();
//!
//! debouncer.schedule_at(t0);
//! debouncer.schedule_at(t0 + Duration::from_millis(100));
//! assert_eq!(debouncer.tick_at(t0 + Duration::from_millis(350)), DebounceAction::Wait);
//! assert!(matches!(
//!     debouncer.tick_at(t0 + Duration::from_millis(400)),
//!     DebounceAction::Flush { .. }
//! ));
//! assert_eq!(debouncer.tick_at(t0 + Duration::from_millis(900)), DebounceAction::Idle);
//! ```
//!
//! # Invariants
//!
//! - **Latest-wins**: a schedule during the quiet period restarts it; a burst
//!   yields one flush.
//! - **Bounded latency**: with `max_wait` set, a continuous burst still
//!   flushes once `max_wait` has elapsed since the first unflushed schedule.
//! - **Deterministic**: identical `Instant` sequences yield identical actions.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `quiet_period = 0` | Flush on the next tick |
//! | `now` earlier than the last schedule | Treated as zero elapsed |
//! | Nothing pending | `Idle` |

use std::time::{Duration, Instant};

use allot_core::config::DEFAULT_DEBOUNCE;

/// Configuration for [`PersistDebouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period required after the last schedule.
    pub quiet_period: Duration,
    /// Upper bound on how long a pending flush may be deferred.
    /// `None` means a continuous burst defers indefinitely.
    pub max_wait: Option<Duration>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_DEBOUNCE,
            max_wait: None,
        }
    }
}

impl DebounceConfig {
    /// Set the quiet period.
    #[must_use]
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Set the hard deadline.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Result of polling the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceAction {
    /// Nothing is pending.
    Idle,
    /// A flush is pending but not yet due.
    Wait,
    /// The deferred write is due now.
    Flush {
        /// Schedules coalesced into this flush.
        coalesced: u64,
        /// Whether `max_wait` forced the flush.
        forced_by_deadline: bool,
    },
}

impl DebounceAction {
    /// Whether the caller should write now.
    #[must_use]
    pub const fn is_flush(&self) -> bool {
        matches!(self, Self::Flush { .. })
    }
}

/// Counters for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Total schedule calls.
    pub scheduled: u64,
    /// Total flushes reported (including forced and explicit).
    pub flushed: u64,
    /// Flushes forced by `max_wait`.
    pub forced: u64,
    /// Whether a flush is currently pending.
    pub has_pending: bool,
}

/// Cancel-and-restart timer guarding persistence writes.
#[derive(Debug, Clone)]
pub struct PersistDebouncer {
    config: DebounceConfig,
    first_pending: Option<Instant>,
    last_schedule: Option<Instant>,
    coalesced: u64,
    stats: DebounceStats,
}

impl PersistDebouncer {
    /// Create an idle debouncer.
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            first_pending: None,
            last_schedule: None,
            coalesced: 0,
            stats: DebounceStats::default(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Restart the quiet period at the current time.
    pub fn schedule(&mut self) {
        self.schedule_at(Instant::now());
    }

    /// Restart the quiet period at `now`.
    pub fn schedule_at(&mut self, now: Instant) {
        self.first_pending.get_or_insert(now);
        self.last_schedule = Some(now);
        self.coalesced += 1;
        self.stats.scheduled += 1;
    }

    /// Poll at the current time.
    pub fn tick(&mut self) -> DebounceAction {
        self.tick_at(Instant::now())
    }

    /// Poll at `now`. Reports `Flush` once per pending burst.
    pub fn tick_at(&mut self, now: Instant) -> DebounceAction {
        let (Some(first), Some(last)) = (self.first_pending, self.last_schedule) else {
            return DebounceAction::Idle;
        };

        if let Some(max_wait) = self.config.max_wait
            && duration_since_or_zero(now, first) >= max_wait
        {
            return self.take(true);
        }

        if duration_since_or_zero(now, last) >= self.config.quiet_period {
            return self.take(false);
        }

        DebounceAction::Wait
    }

    /// Consume a pending flush regardless of timing.
    ///
    /// Returns `true` if something was pending.
    pub fn take_pending(&mut self) -> bool {
        if self.first_pending.is_none() {
            return false;
        }
        self.take(false);
        true
    }

    /// Drop a pending flush without reporting it.
    pub fn cancel(&mut self) {
        self.first_pending = None;
        self.last_schedule = None;
        self.coalesced = 0;
    }

    /// Whether a flush is pending.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.first_pending.is_some()
    }

    /// Time left before a tick at `now` would flush, `None` when idle.
    #[must_use]
    pub fn time_until_flush_at(&self, now: Instant) -> Option<Duration> {
        let first = self.first_pending?;
        let last = self.last_schedule?;
        let quiet = self
            .config
            .quiet_period
            .saturating_sub(duration_since_or_zero(now, last));
        let deadline = self
            .config
            .max_wait
            .map(|w| w.saturating_sub(duration_since_or_zero(now, first)));
        Some(deadline.map_or(quiet, |d| d.min(quiet)))
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> DebounceStats {
        DebounceStats {
            has_pending: self.has_pending(),
            ..self.stats
        }
    }

    fn take(&mut self, forced_by_deadline: bool) -> DebounceAction {
        let coalesced = self.coalesced;
        self.cancel();
        self.stats.flushed += 1;
        if forced_by_deadline {
            self.stats.forced += 1;
        }
        tracing::trace!(coalesced, forced_by_deadline, "persist debounce elapsed");
        DebounceAction::Flush {
            coalesced,
            forced_by_deadline,
        }
    }
}

impl Default for PersistDebouncer {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

#[inline]
fn duration_since_or_zero(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier).unwrap_or(Duration::ZERO)
}
