use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::Identity;

/// Request counter of one identity.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Per-identity fixed-window admission control.
///
/// Every check counts, including denied ones, so an identity that keeps
/// hammering stays denied until its window rolls over. The owner identity
/// bypasses the limiter entirely. At capacity, a new identity is refused
/// rather than forgetting a window that is still denying someone.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<Identity, RateWindow>,
    privileged: Identity,
    window: Duration,
    max_requests: u32,
    max_identities: usize,
    admission: Mutex<()>,
}

impl RateLimiter {
    pub fn new(privileged: Identity, window: Duration, max_requests: u32, max_identities: usize) -> Self {
        Self {
            windows: DashMap::new(),
            privileged,
            window,
            max_requests,
            max_identities: max_identities.max(1),
            admission: Mutex::new(()),
        }
    }

    pub fn is_privileged(&self, identity: Identity) -> bool {
        identity == self.privileged
    }

    /// Counts a request for `identity` and decides whether it may proceed.
    pub fn admit(&self, identity: Identity) -> bool {
        if self.is_privileged(identity) {
            return true;
        }

        let now = Instant::now();

        // Known identity: the entry guard holds the shard lock for the whole
        // check-and-increment.
        if let Some(mut window) = self.windows.get_mut(&identity) {
            return self.count_request(identity, window.value_mut(), now);
        }

        // New identities are admitted one at a time so the map never grows
        // past its capacity.
        let _admission = self.admission.lock();

        if !self.windows.contains_key(&identity)
            && self.windows.len() >= self.max_identities
            && !self.make_room(now)
        {
            warn!(
                "🚫 Rate limiter lleno ({} identidades agotadas), {} rechazado",
                self.max_identities, identity
            );
            return false;
        }

        let mut window = self.windows.entry(identity).or_insert(RateWindow {
            count: 0,
            window_start: now,
        });
        self.count_request(identity, window.value_mut(), now)
    }

    fn count_request(&self, identity: Identity, window: &mut RateWindow, now: Instant) -> bool {
        if now.saturating_duration_since(window.window_start) > self.window {
            window.count = 0;
            window.window_start = now;
        }

        window.count = window.count.saturating_add(1);
        let admitted = window.count <= self.max_requests;

        if !admitted {
            debug!(
                "🚫 Rate limit para {}: {} peticiones en la ventana actual",
                identity, window.count
            );
        }

        admitted
    }

    /// Requests counted in the current window of `identity`.
    pub fn count(&self, identity: Identity) -> u32 {
        self.windows.get(&identity).map_or(0, |w| w.count)
    }

    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Frees one slot. Expired windows go first, then the oldest window that
    /// still has budget left. Exhausted windows are never dropped before they
    /// roll over; returns `false` if every tracked window is exhausted.
    fn make_room(&self, now: Instant) -> bool {
        let window = self.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.window_start) <= window);

        if self.windows.len() < self.max_identities {
            return true;
        }

        let oldest = self
            .windows
            .iter()
            .filter(|entry| entry.value().count < self.max_requests)
            .min_by_key(|entry| entry.value().window_start)
            .map(|entry| *entry.key());

        match oldest {
            Some(identity) => {
                self.windows.remove(&identity);
                warn!(
                    "⚠️ Rate limiter lleno ({} identidades), ventana de {} descartada",
                    self.max_identities, identity
                );
                true
            }
            None => false,
        }
    }
}
