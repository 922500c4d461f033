//! # Error Handler
//!
//! Central sink for every failure the coordinator and its services catch.
//!
//! The handler keeps a bounded ring buffer of recent errors, runs registered
//! recovery strategies for recoverable codes, and forwards unrecovered errors
//! to an injected sink (wired to the outbound `wallet-error` signal by the
//! session composition root). It also detects error storms: a rate-limited
//! warning fires when many errors land within a single second.
//!
//! The handler itself has no dependency on session state or signal types.
//! The sink is the only outward edge, and it is injected.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::error::{ErrorCode, Result, WalletError};

/// Maximum errors kept in the ring buffer. Oldest entries are evicted first.
pub const MAX_ERROR_LOG: usize = 100;

/// Errors per second that count as a storm.
const STORM_THRESHOLD: usize = 10;

/// Minimum gap between storm warnings.
const STORM_WARNING_INTERVAL_MS: i64 = 5_000;

/// Automated remediation for a specific error code.
///
/// `can_recover` is consulted before `recover` is invoked, so a strategy can
/// decline individual errors even when registered for their code.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Whether this strategy wants to attempt recovery for the given error.
    fn can_recover(&self, error: &WalletError) -> bool;

    /// Attempt recovery. A failure here is logged but never re-thrown.
    async fn recover(&self, error: &WalletError) -> Result<()>;
}

type ErrorSink = Arc<dyn Fn(WalletError) + Send + Sync>;

/// Central error handler: normalization, logging, recovery, emission.
pub struct ErrorHandler {
    /// Recent errors (ring buffer of last [`MAX_ERROR_LOG`] entries).
    log: Mutex<VecDeque<WalletError>>,
    /// Recovery strategies by error code.
    strategies: Mutex<HashMap<ErrorCode, Arc<dyn RecoveryStrategy>>>,
    /// Outward emission for unrecovered errors.
    sink: Mutex<Option<ErrorSink>>,
    /// Last storm warning timestamp (unix ms), for rate limiting.
    last_storm_warning: Mutex<Option<i64>>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(VecDeque::with_capacity(MAX_ERROR_LOG)),
            strategies: Mutex::new(HashMap::new()),
            sink: Mutex::new(None),
            last_storm_warning: Mutex::new(None),
        }
    }

    /// Install the outward sink for unrecovered errors.
    pub fn set_sink(&self, sink: impl Fn(WalletError) + Send + Sync + 'static) {
        *self.sink.lock() = Some(Arc::new(sink));
    }

    /// Register a recovery strategy for an error code, replacing any previous
    /// registration for the same code.
    pub fn register_strategy(&self, code: ErrorCode, strategy: Arc<dyn RecoveryStrategy>) {
        self.strategies.lock().insert(code, strategy);
    }

    /// Append an error to the log without running recovery or emission.
    ///
    /// Used from synchronous contexts (subscriber panics, auto-lock markers)
    /// where the full `handle` pipeline cannot be awaited.
    pub fn record(&self, error: &WalletError) {
        {
            let mut log = self.log.lock();
            if log.len() >= MAX_ERROR_LOG {
                log.pop_front();
            }
            log.push_back(error.clone());
        }
        self.check_error_storm();
    }

    /// Run the full handling pipeline for a typed error.
    ///
    /// The error is logged. If it is marked recoverable and a strategy is
    /// registered for its code whose `can_recover` accepts it, recovery is
    /// attempted. Recovered errors stop here; everything else is forwarded to
    /// the sink. The (possibly annotated) error is returned so callers can
    /// re-throw it with `?`.
    pub async fn handle(&self, error: WalletError) -> WalletError {
        tracing::error!(
            code = %error.code,
            severity = ?error.severity,
            recoverable = error.recoverable,
            context = error.context.as_deref().unwrap_or(""),
            message = %error.message,
            "Error recorded"
        );
        self.record(&error);

        if error.recoverable {
            // Clone the strategy out so the registry lock is not held across await.
            let strategy = self.strategies.lock().get(&error.code).cloned();
            if let Some(strategy) = strategy {
                if strategy.can_recover(&error) {
                    match strategy.recover(&error).await {
                        Ok(()) => {
                            tracing::info!(code = %error.code, "Error recovered by strategy");
                            return error;
                        }
                        Err(recovery_err) => {
                            tracing::warn!(
                                code = %error.code,
                                recovery_error = %recovery_err,
                                "Recovery strategy failed"
                            );
                        }
                    }
                }
            }
        }

        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(error.clone());
        }
        error
    }

    /// Normalize a raw failure message and run it through [`Self::handle`].
    pub async fn handle_message(&self, message: &str, context: Option<String>) -> WalletError {
        self.handle(WalletError::from_message(message, context)).await
    }

    /// Retry an async operation with linear-growth backoff
    /// (`base_delay * attempt`). The final failure is routed through
    /// [`Self::handle`] before being returned.
    pub async fn with_retry<T, F, Fut>(
        &self,
        mut operation: F,
        max_retries: u32,
        base_delay: Duration,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= max_retries => {
                    tracing::warn!(
                        attempt,
                        max_retries,
                        code = %err.code,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(base_delay * attempt).await;
                }
                Err(err) => {
                    return Err(self.handle(err).await);
                }
            }
        }
    }

    /// Most recent errors, newest first.
    pub fn recent_errors(&self, count: usize) -> Vec<WalletError> {
        self.log.lock().iter().rev().take(count).cloned().collect()
    }

    /// Number of errors currently in the log.
    pub fn error_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Per-code counts derived from the log. Not stored separately, so the
    /// distribution always matches the visible log exactly.
    pub fn error_stats(&self) -> HashMap<ErrorCode, usize> {
        let mut stats = HashMap::new();
        for entry in self.log.lock().iter() {
            *stats.entry(entry.code).or_insert(0) += 1;
        }
        stats
    }

    /// Drop every logged error.
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    // Warn (rate-limited) when errors arrive faster than STORM_THRESHOLD/sec.
    fn check_error_storm(&self) {
        let now = Utc::now().timestamp_millis();
        let one_second_ago = now - 1_000;
        let recent = self
            .log
            .lock()
            .iter()
            .rev()
            .take_while(|e| e.timestamp > one_second_ago)
            .count();

        if recent >= STORM_THRESHOLD {
            let mut last = self.last_storm_warning.lock();
            let should_warn = last
                .map(|t| now - t >= STORM_WARNING_INTERVAL_MS)
                .unwrap_or(true);
            if should_warn {
                tracing::error!(
                    errors_per_second = recent,
                    threshold = STORM_THRESHOLD,
                    "Error storm detected - high error rate"
                );
                *last = Some(now);
            }
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStrategy {
        accept: bool,
        succeed: bool,
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl RecoveryStrategy for CountingStrategy {
        fn can_recover(&self, _error: &WalletError) -> bool {
            self.accept
        }

        async fn recover(&self, _error: &WalletError) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(WalletError::storage("recovery write failed"))
            }
        }
    }

    // ========== Ring Buffer Tests ==========

    #[test]
    fn test_log_never_exceeds_cap() {
        let handler = ErrorHandler::new();
        for i in 0..250 {
            handler.record(&WalletError::validation(format!("err {i}")));
        }
        assert_eq!(handler.error_count(), MAX_ERROR_LOG);

        // Oldest entries evicted first: the newest message must survive.
        let recent = handler.recent_errors(1);
        assert_eq!(recent[0].message, "err 249");
    }

    #[test]
    fn test_stats_match_log_distribution() {
        let handler = ErrorHandler::new();
        for _ in 0..3 {
            handler.record(&WalletError::storage("disk"));
        }
        for _ in 0..2 {
            handler.record(&WalletError::network("net"));
        }
        let stats = handler.error_stats();
        assert_eq!(stats.get(&ErrorCode::StorageError), Some(&3));
        assert_eq!(stats.get(&ErrorCode::NetworkError), Some(&2));
        assert_eq!(stats.values().sum::<usize>(), handler.error_count());
    }

    #[test]
    fn test_clear_empties_log() {
        let handler = ErrorHandler::new();
        handler.record(&WalletError::validation("x"));
        handler.clear();
        assert_eq!(handler.error_count(), 0);
        assert!(handler.error_stats().is_empty());
    }

    // ========== Recovery Tests ==========

    #[tokio::test]
    async fn test_successful_recovery_suppresses_sink() {
        let handler = ErrorHandler::new();
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = emitted.clone();
        handler.set_sink(move |_| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        let strategy = Arc::new(CountingStrategy {
            accept: true,
            succeed: true,
            invocations: AtomicUsize::new(0),
        });
        handler.register_strategy(ErrorCode::StorageError, strategy.clone());

        handler.handle(WalletError::storage("flaky write")).await;

        assert_eq!(strategy.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(emitted.load(Ordering::SeqCst), 0);
        // Recovered errors still land in the log.
        assert_eq!(handler.error_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_recovery_still_emits() {
        let handler = ErrorHandler::new();
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = emitted.clone();
        handler.set_sink(move |_| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        handler.register_strategy(
            ErrorCode::StorageError,
            Arc::new(CountingStrategy {
                accept: true,
                succeed: false,
                invocations: AtomicUsize::new(0),
            }),
        );

        handler.handle(WalletError::storage("flaky write")).await;
        assert_eq!(emitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_strategy_declining_skips_recover() {
        let handler = ErrorHandler::new();
        let strategy = Arc::new(CountingStrategy {
            accept: false,
            succeed: true,
            invocations: AtomicUsize::new(0),
        });
        handler.register_strategy(ErrorCode::StorageError, strategy.clone());

        handler.handle(WalletError::storage("write failed")).await;
        assert_eq!(strategy.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrecoverable_errors_bypass_strategies() {
        let handler = ErrorHandler::new();
        let strategy = Arc::new(CountingStrategy {
            accept: true,
            succeed: true,
            invocations: AtomicUsize::new(0),
        });
        handler.register_strategy(ErrorCode::CryptoError, strategy.clone());

        // crypto() asserts recoverable = false.
        handler.handle(WalletError::crypto("bad key")).await;
        assert_eq!(strategy.invocations.load(Ordering::SeqCst), 0);
    }

    // ========== Retry Tests ==========

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_after_transient_failures() {
        let handler = ErrorHandler::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = handler
            .with_retry(
                move || {
                    let attempts = attempts_clone.clone();
                    async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(WalletError::network("transient"))
                        } else {
                            Ok(42u32)
                        }
                    }
                },
                3,
                Duration::from_millis(100),
            )
            .await;

        assert_eq!(result.expect("retry should succeed"), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_routes_final_failure() {
        let handler = ErrorHandler::new();
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = emitted.clone();
        handler.set_sink(move |_| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        let result: Result<u32> = handler
            .with_retry(
                || async { Err(WalletError::network("down")) },
                2,
                Duration::from_millis(50),
            )
            .await;

        assert!(result.is_err());
        // Only the final failure is handled/emitted, not every attempt.
        assert_eq!(emitted.load(Ordering::SeqCst), 1);
        assert_eq!(handler.error_count(), 1);
    }

    // ========== Normalization Tests ==========

    #[tokio::test]
    async fn test_handle_message_classifies() {
        let handler = ErrorHandler::new();
        let err = handler
            .handle_message("fetch failed: connection refused", Some("poll".into()))
            .await;
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert_eq!(err.severity, Severity::Medium);
        assert_eq!(err.context.as_deref(), Some("poll"));
    }
}
