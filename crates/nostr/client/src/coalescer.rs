//! Batching of profile metadata lookups.
//!
//! Pubkeys trickle in one at a time as UI elements appear. The coalescer
//! collects them for `batch_window` and releases them as one batch, then
//! refuses to arm another flush until `cooldown` has elapsed since the last
//! one. Time is passed in by the caller; nothing here sleeps.

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    pub batch_window: Duration,
    pub cooldown: Duration,
    /// Arm a flush at cooldown expiry for pubkeys added during cooldown.
    /// When off, such pubkeys wait for the next add after the cooldown.
    pub trailing_flush: bool,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
            cooldown: DEFAULT_COOLDOWN,
            trailing_flush: false,
        }
    }
}

/// What the caller should do after `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Call `flush_due` at this instant.
    ScheduleFlush { at: Instant },
    /// A flush is already armed, or the cooldown holds the pubkey back.
    Wait,
}

#[derive(Debug, Default)]
pub struct ProfileFetchCoalescer {
    config: CoalescerConfig,
    pending: BTreeSet<String>,
    last_flush: Option<Instant>,
    armed: bool,
}

impl ProfileFetchCoalescer {
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> CoalescerConfig {
        self.config
    }

    /// Queue a pubkey.
    pub fn add(&mut self, pubkey: impl Into<String>, now: Instant) -> FlushDecision {
        self.pending.insert(pubkey.into());
        if self.armed {
            return FlushDecision::Wait;
        }

        let cooldown_end = self.last_flush.map(|last| last + self.config.cooldown);
        match cooldown_end {
            Some(end) if now < end => {
                if self.config.trailing_flush {
                    self.armed = true;
                    FlushDecision::ScheduleFlush { at: end }
                } else {
                    FlushDecision::Wait
                }
            }
            _ => {
                self.armed = true;
                FlushDecision::ScheduleFlush {
                    at: now + self.config.batch_window,
                }
            }
        }
    }

    /// Drop a queued pubkey. Returns whether it was pending.
    pub fn remove(&mut self, pubkey: &str) -> bool {
        self.pending.remove(pubkey)
    }

    /// Release the pending batch, if any, and start the cooldown.
    pub fn flush_due(&mut self, now: Instant) -> Option<Vec<String>> {
        self.armed = false;
        if self.pending.is_empty() {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
