//! Session configuration from environment variables

use std::time::Duration;

/// Inactivity window before the wallet is forcibly locked.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delay between transaction result probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default ceiling on how long a transaction may poll before expiring.
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(300);

/// Timing knobs for the session coordinator.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which the auto-lock guard fires.
    pub auto_lock_timeout: Duration,
    /// How often the auto-lock guard re-checks idle time.
    pub guard_check_interval: Duration,
    /// Fixed window applied to raw activity signals (at most one accepted
    /// activity per window).
    pub activity_throttle: Duration,
    /// Delay between transaction result probes.
    pub poll_interval: Duration,
    /// Ceiling on total polling time per transaction; exceeded polls expire.
    pub max_poll_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_timeout: DEFAULT_LOCK_TIMEOUT,
            guard_check_interval: Duration::from_secs(1),
            activity_throttle: Duration::from_secs(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_duration: DEFAULT_MAX_POLL_DURATION,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auto_lock_timeout: env_secs("WALLET_AUTO_LOCK_TIMEOUT_SECS")
                .unwrap_or(defaults.auto_lock_timeout),
            guard_check_interval: defaults.guard_check_interval,
            activity_throttle: env_millis("WALLET_ACTIVITY_THROTTLE_MS")
                .unwrap_or(defaults.activity_throttle),
            poll_interval: env_millis("WALLET_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            max_poll_duration: env_secs("WALLET_MAX_POLL_DURATION_SECS")
                .unwrap_or(defaults.max_poll_duration),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}
