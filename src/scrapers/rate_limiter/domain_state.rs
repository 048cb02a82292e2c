//! Per-domain pacing state.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DomainState {
    pub current_delay: Duration,
    /// Earliest start time for the next request.
    pub next_slot: Option<Instant>,
    pub consecutive_successes: u32,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}

impl DomainState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            next_slot: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    /// Reserve the next request slot and return its start time.
    ///
    /// Slots are spaced by the delay in effect at reservation time, so
    /// callers reserving concurrently queue up behind each other.
    pub fn reserve_slot(&mut self, now: Instant) -> Instant {
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        self.next_slot = Some(start + self.current_delay);
        self.total_requests += 1;
        start
    }
}
