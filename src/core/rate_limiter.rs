//! Token bucket admission control keyed by client address

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::constants::{
    DEFAULT_BLOCK_SECS, DEFAULT_BURST_LIMIT, DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_RATE_PER_SECOND,
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_DURATION_SECS,
};

/// Body sent when a request drains the bucket
pub const EXCEEDED_BODY: &str = "You have exceeded the rate limit and are temporarily blocked.";
/// Body sent to a client that is still inside its cooldown window
pub const BLOCKED_BODY: &str = "You are temporarily blocked due to excessive requests.";

/// Token bucket parameters
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Tokens added per second
    pub rate_per_second: f64,
    /// Bucket capacity; new clients start full
    pub burst_limit: f64,
    /// Cooldown applied once the bucket runs dry
    pub block_duration: Duration,
    /// Idle time after which a client entry is swept
    pub client_timeout: Duration,
    /// How often the sweep runs
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst_limit: DEFAULT_BURST_LIMIT,
            block_duration: Duration::from_secs(DEFAULT_BLOCK_SECS),
            client_timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    /// This request emptied the bucket and started a cooldown
    Exceeded,
    /// The client was already cooling down
    Blocked,
}

impl Decision {
    pub fn is_admitted(self) -> bool {
        matches!(self, Decision::Admit)
    }

    /// Rejection body for the client, `None` when admitted
    pub fn rejection_body(self) -> Option<&'static str> {
        match self {
            Decision::Admit => None,
            Decision::Exceeded => Some(EXCEEDED_BODY),
            Decision::Blocked => Some(BLOCKED_BODY),
        }
    }
}

#[derive(Debug, Clone)]
struct ClientState {
    tokens: f64,
    last_refill: Instant,
    blocked_until: Option<Instant>,
}

/// Per-client token buckets behind a single lock
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientState>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(mut config: RateLimitConfig) -> Self {
        let max = Duration::from_secs(MAX_DURATION_SECS);
        if config.block_duration > max {
            warn!("Block duration {:?} capped at {:?}", config.block_duration, max);
            config.block_duration = max;
        }
        Self {
            clients: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<String, ClientState>> {
        self.clients.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Decide whether a request from `key` may proceed right now
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Decide whether a request from `key` arriving at `now` may proceed
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let burst = self.config.burst_limit;
        let mut clients = self.lock_clients();

        let client = clients.entry(key.to_string()).or_insert_with(|| ClientState {
            tokens: burst,
            last_refill: now,
            blocked_until: None,
        });

        if let Some(until) = client.blocked_until {
            if until > now {
                return Decision::Blocked;
            }
            client.blocked_until = None;
        }

        let elapsed = now.saturating_duration_since(client.last_refill).as_secs_f64();
        client.tokens = (client.tokens + elapsed * self.config.rate_per_second).min(burst);
        client.last_refill = now;

        if client.tokens >= 1.0 {
            client.tokens -= 1.0;
            Decision::Admit
        } else {
            match now.checked_add(self.config.block_duration) {
                Some(until) => client.blocked_until = Some(until),
                None => warn!("Block deadline for client {} is out of range", key),
            }
            debug!("Client {} exhausted its bucket, blocked for {:?}", key, self.config.block_duration);
            Decision::Exceeded
        }
    }

    /// Drop clients idle longer than the configured timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let timeout = self.config.client_timeout;
        let mut clients = self.lock_clients();
        let before = clients.len();
        clients.retain(|_, client| {
            let idle = now.saturating_duration_since(client.last_refill) <= timeout;
            let cooling = client.blocked_until.map_or(false, |until| until > now);
            idle || cooling
        });
        before - clients.len()
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.lock_clients().len()
    }

    /// Start the periodic sweep that bounds memory use
    pub fn start_sweep_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!("Rate limiter swept {} idle clients", removed);
                }
            }
        })
    }
}

pub type SharedRateLimiter = Arc<RateLimiter>;
