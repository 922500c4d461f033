//! # Auto-Lock Guard
//!
//! Activity-driven inactivity timer that forces the wallet into a locked
//! state.
//!
//! A monitor task wakes once per check interval and compares idle time
//! against the configured timeout (the same shape as a UI-freeze watchdog:
//! heartbeat timestamp + periodic check, rather than a timer that is
//! destroyed and recreated on every keystroke). Raw activity signals are
//! throttled through an explicit [`FixedWindowThrottle`] so the activity
//! handler runs at most once per window regardless of signal volume.
//!
//! Disabling auto-lock through a settings change tears the monitor task
//! down; re-enabling re-arms it with a fresh deadline. The guard listens for
//! `settings-changed` on the outbound bus, so it needs no special wiring in
//! the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::bridge::{BusSubscription, SignalBus};
use crate::core::config::SessionConfig;
use crate::core::error::WalletError;
use crate::session::signals::{OutboundKind, OutboundSignal};
use crate::session::SessionCoordinator;

/// Fixed-window rate limiter.
///
/// The window opens at the first accepted event; everything else inside the
/// window is rejected, and the next accepted event opens a new window.
#[derive(Debug)]
pub struct FixedWindowThrottle {
    window: Duration,
    window_start: Option<Instant>,
}

impl FixedWindowThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
        }
    }

    /// Whether an event at `now` is accepted.
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.window_start {
            Some(start) if now.duration_since(start) < self.window => false,
            _ => {
                self.window_start = Some(now);
                true
            }
        }
    }
}

struct GuardInner {
    coordinator: Weak<SessionCoordinator>,
    bus: SignalBus<OutboundSignal>,
    enabled: AtomicBool,
    timeout: Duration,
    check_interval: Duration,
    last_activity: Mutex<Instant>,
    throttle: Mutex<FixedWindowThrottle>,
    task: Mutex<Option<JoinHandle<()>>>,
    settings_sub: Mutex<Option<BusSubscription<OutboundSignal>>>,
}

/// Inactivity auto-lock enforcement. Cheap to clone; all clones share one
/// monitor.
#[derive(Clone)]
pub struct AutoLockGuard {
    inner: Arc<GuardInner>,
}

impl AutoLockGuard {
    /// Build the guard and arm it when the session's `auto_lock` setting is
    /// on. Also subscribes to `settings-changed` so later preference flips
    /// arm/disarm the monitor automatically.
    pub fn start(
        coordinator: &Arc<SessionCoordinator>,
        bus: SignalBus<OutboundSignal>,
        config: &SessionConfig,
    ) -> Self {
        let enabled = coordinator.state().settings.auto_lock;
        let guard = Self {
            inner: Arc::new(GuardInner {
                coordinator: Arc::downgrade(coordinator),
                bus: bus.clone(),
                enabled: AtomicBool::new(enabled),
                timeout: config.auto_lock_timeout,
                check_interval: config.guard_check_interval,
                last_activity: Mutex::new(Instant::now()),
                throttle: Mutex::new(FixedWindowThrottle::new(config.activity_throttle)),
                task: Mutex::new(None),
                settings_sub: Mutex::new(None),
            }),
        };

        if enabled {
            guard.arm();
        }

        let subscription = bus.on(OutboundKind::SettingsChanged, {
            let guard = guard.clone();
            move |signal| {
                if let OutboundSignal::SettingsChanged(settings) = signal {
                    guard.set_enabled(settings.auto_lock);
                }
            }
        });
        *guard.inner.settings_sub.lock() = Some(subscription);

        tracing::info!(
            enabled,
            timeout_secs = config.auto_lock_timeout.as_secs(),
            "Auto-lock guard started"
        );
        guard
    }

    /// Record one raw activity signal.
    ///
    /// Throttled to at most one accepted activity per window. Every accepted
    /// activity refreshes the guard deadline and stamps `last_activity` on
    /// the session state.
    pub fn record_activity(&self) {
        let now = Instant::now();
        if !self.inner.throttle.lock().accept(now) {
            return;
        }

        *self.inner.last_activity.lock() = now;
        if let Some(coordinator) = self.inner.coordinator.upgrade() {
            coordinator.touch_activity();
        }
    }

    /// Time left before the guard would fire: `timeout - idle`, clamped to
    /// `[0, timeout]`.
    pub fn remaining_lock_time(&self) -> Duration {
        let idle = self.inner.last_activity.lock().elapsed();
        self.inner.timeout.saturating_sub(idle)
    }

    /// Flip the guard on or off, arming or tearing down the monitor task.
    pub fn set_enabled(&self, on: bool) {
        let was = self.inner.enabled.swap(on, Ordering::SeqCst);
        if was == on {
            return;
        }
        if on {
            // Re-enabling starts a fresh countdown.
            *self.inner.last_activity.lock() = Instant::now();
            self.arm();
            tracing::info!("Auto-lock enabled");
        } else {
            self.disarm();
            tracing::info!("Auto-lock disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Whether the monitor task is currently running.
    pub fn is_armed(&self) -> bool {
        self.inner.task.lock().is_some()
    }

    /// Tear down the monitor task and the settings subscription.
    pub fn stop(&self) {
        self.disarm();
        self.inner.settings_sub.lock().take();
        tracing::info!("Auto-lock guard stopped");
    }

    fn arm(&self) {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            monitor_loop(inner).await;
        });
        if let Some(previous) = self.inner.task.lock().replace(task) {
            previous.abort();
        }
    }

    fn disarm(&self) {
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
        }
    }
}

async fn monitor_loop(inner: Arc<GuardInner>) {
    let mut ticker = tokio::time::interval(inner.check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if !inner.enabled.load(Ordering::SeqCst) {
            break;
        }
        let Some(coordinator) = inner.coordinator.upgrade() else {
            break;
        };
        if coordinator.state().is_locked {
            continue;
        }

        let idle = inner.last_activity.lock().elapsed();
        if idle >= inner.timeout {
            tracing::info!(
                idle_secs = idle.as_secs(),
                timeout_secs = inner.timeout.as_secs(),
                "Inactivity timeout reached, locking wallet"
            );
            coordinator.errors().record(&WalletError::auto_lock_triggered());
            match coordinator.lock_wallet().await {
                Ok(_) => inner.bus.emit(OutboundSignal::AutoLocked),
                Err(err) => {
                    tracing::warn!(code = %err.code, "Auto-lock attempt failed");
                }
            }
        }
    }

    tracing::debug!("Auto-lock monitor exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Throttle Tests ==========

    #[tokio::test(start_paused = true)]
    async fn test_throttle_accepts_first_event() {
        let mut throttle = FixedWindowThrottle::new(Duration::from_secs(1));
        assert!(throttle.accept(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_rejects_within_window() {
        let mut throttle = FixedWindowThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        assert!(throttle.accept(start));
        assert!(!throttle.accept(start + Duration::from_millis(1)));
        assert!(!throttle.accept(start + Duration::from_millis(999)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_reopens_after_window() {
        let mut throttle = FixedWindowThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        assert!(throttle.accept(start));
        assert!(throttle.accept(start + Duration::from_secs(1)));
        // The new window starts at the second accepted event.
        assert!(!throttle.accept(start + Duration::from_millis(1500)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_bursts_collapse_to_one_per_window() {
        let mut throttle = FixedWindowThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        let mut accepted = 0;
        for i in 0..100 {
            if throttle.accept(start + Duration::from_millis(i * 5)) {
                accepted += 1;
            }
        }
        // 100 events over 500ms fit inside a single window.
        assert_eq!(accepted, 1);
    }
}
