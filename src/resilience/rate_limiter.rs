use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Sliding-window admission control keyed by client identifier.
///
/// Each client owns an ordered queue of admission timestamps, pruned on the
/// client's next call. Once per window the whole map is swept and clients
/// with nothing left in their window are dropped.
pub struct RateLimiter {
    requests_per_window: u32,
    window: Duration,
    clients: DashMap<String, VecDeque<Instant>>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        Self {
            requests_per_window,
            window,
            clients: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Records an admission for `client_id` and reports whether it fits in
    /// the current window. Denied calls are not recorded.
    pub fn is_allowed(&self, client_id: &str) -> bool {
        if self.requests_per_window == 0 {
            return false;
        }
        let now = Instant::now();
        self.sweep_if_due(now);

        // the entry guard holds the shard lock for this key until we return
        let mut timestamps = self.clients.entry(client_id.to_string()).or_default();
        prune(&mut timestamps, now, self.window);

        if timestamps.len() < self.requests_per_window as usize {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops every client whose admissions have all aged out.
    pub fn purge_idle(&self) {
        self.purge_idle_at(Instant::now());
    }

    fn purge_idle_at(&self, now: Instant) {
        self.clients.retain(|_, timestamps| {
            prune(timestamps, now, self.window);
            !timestamps.is_empty()
        });
    }

    fn sweep_if_due(&self, now: Instant) {
        {
            let mut last_sweep = self.last_sweep.lock();
            if now.duration_since(*last_sweep) < self.window {
                return;
            }
            *last_sweep = now;
        }
        // no entry guard is held here; retain locks every shard in turn
        self.purge_idle_at(now);
    }

    /// Number of clients currently holding state.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Admissions currently counted against `client_id`, without pruning.
    pub fn in_window(&self, client_id: &str) -> usize {
        self.clients
            .get(client_id)
            .map(|timestamps| timestamps.len())
            .unwrap_or(0)
    }

    pub fn requests_per_window(&self) -> u32 {
        self.requests_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while timestamps
        .front()
        .is_some_and(|oldest| now.duration_since(*oldest) >= window)
    {
        timestamps.pop_front();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(3600))
    }
}
