//! Phase timer for Nightfall rooms.
//!
//! Each room owns exactly one [`PhaseTimer`]. Arming it replaces whatever
//! deadline was set before, so a room can never have two phase timers
//! running. While armed, the timer also emits a [`TimerEvent::Tick`] every
//! `tick_interval` so the room can broadcast the remaining time.
//!
//! # Integration
//!
//! The timer sits inside the room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* player actions */ }
//!         event = timer.wait() => match event {
//!             TimerEvent::Tick { remaining } => { /* timer-update */ }
//!             TimerEvent::Expired { generation } => { /* advance phase */ }
//!         },
//!     }
//! }
//! ```
//!
//! [`PhaseTimer::wait`] is cancel-safe: it only touches the timer's state
//! after its sleep completes, so losing a `select!` race changes nothing.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`PhaseTimer`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Interval between [`TimerEvent::Tick`]s while armed.
    /// `Duration::ZERO` disables ticks; only expiry is reported.
    pub tick_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and stats
// ---------------------------------------------------------------------------

/// What [`PhaseTimer::wait`] resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// A periodic tick; the deadline has not been reached yet.
    Tick { remaining: Duration },
    /// The deadline was reached. The timer is disarmed.
    Expired { generation: u64 },
}

/// Counters kept by a [`PhaseTimer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub arms: u64,
    /// Arms that replaced a live deadline, plus explicit cancels of one.
    pub cancels: u64,
    pub expirations: u64,
    pub ticks: u64,
}

// ---------------------------------------------------------------------------
// PhaseTimer
// ---------------------------------------------------------------------------

/// A single-deadline timer with periodic ticks.
pub struct PhaseTimer {
    tick_interval: Option<Duration>,
    deadline: Option<Instant>,
    next_tick: Option<Instant>,
    generation: u64,
    stats: TimerStats,
}

impl PhaseTimer {
    /// Creates a disarmed timer.
    pub fn new(config: TimerConfig) -> Self {
        let tick_interval = (!config.tick_interval.is_zero()).then_some(config.tick_interval);
        Self {
            tick_interval,
            deadline: None,
            next_tick: None,
            generation: 0,
            stats: TimerStats::default(),
        }
    }

    /// Arms the timer to expire `duration` from now, cancelling any
    /// deadline that was already set. Returns the new generation.
    pub fn arm(&mut self, duration: Duration) -> u64 {
        if self.deadline.is_some() {
            self.stats.cancels += 1;
        }

        let now = Instant::now();
        self.generation += 1;
        self.deadline = Some(now + duration);
        self.next_tick = self.tick_interval.map(|interval| now + interval);
        self.stats.arms += 1;

        debug!(
            generation = self.generation,
            duration_ms = duration.as_millis() as u64,
            "phase timer armed"
        );
        self.generation
    }

    /// Disarms the timer. Returns `true` if a deadline was live.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.deadline.take().is_some();
        self.next_tick = None;
        if was_armed {
            self.stats.cancels += 1;
            debug!(generation = self.generation, "phase timer cancelled");
        }
        was_armed
    }

    /// Waits for the next tick or the expiry, whichever comes first.
    ///
    /// Pends forever while disarmed, which lets `tokio::select!` keep
    /// serving its other branches.
    pub async fn wait(&mut self) -> TimerEvent {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            unreachable!()
        };
        let wake = match self.next_tick {
            Some(tick) if tick < deadline => tick,
            _ => deadline,
        };

        time::sleep_until(wake).await;

        let now = Instant::now();
        if now >= deadline {
            self.deadline = None;
            self.next_tick = None;
            self.stats.expirations += 1;
            debug!(generation = self.generation, "phase timer expired");
            return TimerEvent::Expired {
                generation: self.generation,
            };
        }

        // A late wake-up skips the ticks it missed instead of bursting.
        if let Some(interval) = self.tick_interval {
            let next = wake + interval;
            self.next_tick = Some(if next <= now { now + interval } else { next });
        }
        self.stats.ticks += 1;

        let remaining = deadline - now;
        trace!(
            generation = self.generation,
            remaining_ms = remaining.as_millis() as u64,
            "phase timer tick"
        );
        TimerEvent::Tick { remaining }
    }

    /// Whether a deadline is set.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until expiry, or `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Incremented on every [`arm`](Self::arm).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &TimerStats {
        &self.stats
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if self.deadline.is_some() {
            trace!(generation = self.generation, "phase timer dropped while armed");
        }
    }
}
