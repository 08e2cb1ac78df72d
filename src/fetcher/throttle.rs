//! Per-host request spacing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use super::clock::Clock;

/// Hands out request slots per host so that requests to the same host are
/// spaced by at least `min_delay`, even when issued concurrently.
///
/// One instance is shared by every fetch in the process.
pub struct HostThrottle {
    clock: Arc<dyn Clock>,
    min_delay: Duration,
    max_delay: Duration,
    /// Most recently reserved slot per host. May lie in the future.
    last_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    /// Create a throttle. `max_delay` is raised to `min_delay` if lower.
    pub fn new(clock: Arc<dyn Clock>, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            clock,
            min_delay,
            max_delay: max_delay.max(min_delay),
            last_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `host` may be sent.
    ///
    /// A request less than `min_delay` after the previous slot is pushed to
    /// the previous slot plus a random delay in `[min_delay, max_delay]`.
    pub async fn acquire(&self, host: &str) {
        let wait = self.reserve(host);
        if !wait.is_zero() {
            debug!("Throttling request to {} for {:?}", host, wait);
            self.clock.sleep(wait).await;
        }
    }

    /// Slot of the last request reserved for `host`.
    pub fn last_request(&self, host: &str) -> Option<Instant> {
        self.slots().get(host).copied()
    }

    /// Claim the next slot for `host` and return how long to wait for it.
    ///
    /// The slot is stored before the lock is released, so the next caller
    /// queues behind it.
    fn reserve(&self, host: &str) -> Duration {
        let now = self.clock.now();
        let mut slots = self.slots();

        let slot = match slots.get(host) {
            Some(last) if now < *last + self.min_delay => (*last + self.random_delay()).max(now),
            _ => now,
        };
        slots.insert(host.to_string(), slot);

        slot.saturating_duration_since(now)
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.last_slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn random_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}
