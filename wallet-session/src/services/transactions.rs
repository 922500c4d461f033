//! # Transaction Lifecycle Manager
//!
//! Creates transaction records and drives result polling until a terminal
//! status is reached.
//!
//! State machine: `Pending → Submitted → {Success, Failure, Rejected,
//! Expired}`. The four terminal statuses absorb every further transition
//! attempt. Polling invariants:
//!
//! - at most one active polling task per transaction id, enforced by the
//!   task map (starting a poll cancels any prior poll for the same id)
//! - a poll started at time T stops by `T + max_poll_duration`, expiring the
//!   transaction if no terminal result arrived
//! - a `Critical`-severity probe error forces terminal `Failure`; any other
//!   probe error is logged and polling continues unchanged
//!
//! Poll tasks hold only a `Weak` reference to the coordinator, so a torn-down
//! session is never kept alive by background polling.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::config::SessionConfig;
use crate::core::error::{Result, Severity, WalletError};
use crate::core::service::{PollStatus, ResultSource};
use crate::session::state::{Transaction, TransactionStatus};
use crate::session::SessionCoordinator;
use crate::utils::validation::validate_amount;

/// Partially specified transaction handed to `add_transaction`.
#[derive(Debug, Clone, Default)]
pub struct TransactionDraft {
    pub from: String,
    pub to: Option<String>,
    pub amount: Option<f64>,
    pub gas: Option<f64>,
    pub chain_id: String,
    /// Known hash means polling starts immediately after the record lands.
    pub hash: Option<String>,
    pub capability: Option<String>,
    pub data: Option<serde_json::Value>,
    /// Defaults to `Pending`; terminal initial statuses are rejected.
    pub status: Option<TransactionStatus>,
}

/// Transaction creation and result polling.
pub struct TransactionManager {
    source: Arc<dyn ResultSource>,
    /// Active poll task per transaction id.
    polls: Mutex<HashMap<String, JoinHandle<()>>>,
    poll_interval: Duration,
    max_poll_duration: Duration,
}

impl TransactionManager {
    pub fn new(source: Arc<dyn ResultSource>, config: &SessionConfig) -> Self {
        Self {
            source,
            polls: Mutex::new(HashMap::new()),
            poll_interval: config.poll_interval,
            max_poll_duration: config.max_poll_duration,
        }
    }

    /// Validate a draft and mint the transaction record.
    pub fn prepare(&self, draft: TransactionDraft) -> Result<Transaction> {
        if draft.from.trim().is_empty() {
            return Err(WalletError::invalid_transaction("Sender is required"));
        }
        if draft.chain_id.trim().is_empty() {
            return Err(WalletError::invalid_transaction("Chain id is required"));
        }
        if let Some(amount) = draft.amount {
            validate_amount(amount)
                .require()
                .map_err(|e| WalletError::invalid_transaction(e.message))?;
        }

        let status = draft.status.unwrap_or(TransactionStatus::Pending);
        if status.is_terminal() {
            return Err(WalletError::invalid_transaction(
                "New transactions cannot start in a terminal status",
            ));
        }

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            hash: draft.hash,
            from: draft.from,
            to: draft.to,
            amount: draft.amount,
            gas: draft.gas,
            status,
            timestamp: Utc::now().timestamp_millis(),
            chain_id: draft.chain_id,
            capability: draft.capability,
            data: draft.data,
            result: None,
            updated_at: None,
        })
    }

    /// Start polling the result source for a transaction hash.
    ///
    /// Any prior poll for the same id is cancelled first, so the
    /// one-timer-per-id guarantee holds across restarts.
    pub fn start_polling(
        &self,
        coordinator: Weak<SessionCoordinator>,
        id: impl Into<String>,
        hash: impl Into<String>,
    ) {
        let id = id.into();
        let hash = hash.into();

        let mut polls = self.polls.lock();
        if let Some(previous) = polls.remove(&id) {
            tracing::debug!(id = %id, "Restarting poll, cancelling prior task");
            previous.abort();
        }

        tracing::info!(id = %id, hash = %hash, "Polling started");
        let task = tokio::spawn(poll_loop(
            coordinator,
            self.source.clone(),
            id.clone(),
            hash,
            self.poll_interval,
            self.max_poll_duration,
        ));
        polls.insert(id, task);
    }

    /// Cancel the active poll for a transaction id, if any.
    pub fn stop_polling(&self, id: &str) {
        if let Some(task) = self.polls.lock().remove(id) {
            task.abort();
            tracing::debug!(id = %id, "Polling stopped");
        }
    }

    /// Cancel every active poll. Called at session teardown.
    pub fn stop_all(&self) {
        let mut polls = self.polls.lock();
        for (id, task) in polls.drain() {
            task.abort();
            tracing::debug!(id = %id, "Polling aborted at teardown");
        }
    }

    /// Whether a poll task is currently tracked for the id.
    pub fn is_polling(&self, id: &str) -> bool {
        self.polls.lock().contains_key(id)
    }

    /// Number of live poll tasks.
    pub fn active_poll_count(&self) -> usize {
        self.polls.lock().len()
    }

    // A poll task deregisters itself before reporting a terminal status, so
    // the status update path does not abort the very task driving it.
    fn complete(&self, id: &str) {
        self.polls.lock().remove(id);
    }
}

async fn poll_loop(
    coordinator: Weak<SessionCoordinator>,
    source: Arc<dyn ResultSource>,
    id: String,
    hash: String,
    poll_interval: Duration,
    max_poll_duration: Duration,
) {
    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(coordinator) = coordinator.upgrade() else {
            tracing::debug!(id = %id, "Session gone, poll task exiting");
            return;
        };

        if started.elapsed() >= max_poll_duration {
            tracing::warn!(id = %id, elapsed_secs = started.elapsed().as_secs(), "Poll deadline exceeded, expiring transaction");
            coordinator.transaction_manager().complete(&id);
            if let Err(err) = coordinator
                .update_transaction_status(&id, TransactionStatus::Expired, None)
                .await
            {
                tracing::debug!(id = %id, code = %err.code, "Expiry update rejected");
            }
            return;
        }

        match source.wait_for_result(&hash).await {
            Ok(outcome) => match outcome.status {
                PollStatus::Pending => {
                    tracing::trace!(id = %id, hash = %hash, "No result yet");
                }
                PollStatus::Success => {
                    coordinator.transaction_manager().complete(&id);
                    if let Err(err) = coordinator
                        .update_transaction_status(&id, TransactionStatus::Success, outcome.data)
                        .await
                    {
                        tracing::debug!(id = %id, code = %err.code, "Success update rejected");
                    }
                    return;
                }
                PollStatus::Failure => {
                    coordinator.transaction_manager().complete(&id);
                    if let Err(err) = coordinator
                        .update_transaction_status(&id, TransactionStatus::Failure, outcome.data)
                        .await
                    {
                        tracing::debug!(id = %id, code = %err.code, "Failure update rejected");
                    }
                    return;
                }
            },
            Err(err) if err.severity == Severity::Critical => {
                coordinator.errors().handle(err).await;
                coordinator.transaction_manager().complete(&id);
                if let Err(update_err) = coordinator
                    .update_transaction_status(&id, TransactionStatus::Failure, None)
                    .await
                {
                    tracing::debug!(id = %id, code = %update_err.code, "Critical-failure update rejected");
                }
                return;
            }
            Err(err) => {
                // Non-critical probe errors never stop the poll.
                coordinator.errors().handle(err).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;
    use crate::testing::ScriptedResultSource;

    fn manager() -> TransactionManager {
        TransactionManager::new(
            Arc::new(ScriptedResultSource::new()),
            &SessionConfig::default(),
        )
    }

    // ========== Draft Validation Tests ==========

    #[test]
    fn test_prepare_assigns_id_and_defaults() {
        let manager = manager();
        let tx = manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                chain_id: "0".to_string(),
                ..Default::default()
            })
            .expect("prepare");

        assert!(!tx.id.is_empty());
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.hash.is_none());
        assert!(tx.result.is_none());
        assert!(tx.timestamp > 0);
    }

    #[test]
    fn test_prepare_requires_sender_and_chain() {
        let manager = manager();

        let err = manager
            .prepare(TransactionDraft {
                chain_id: "0".to_string(),
                ..Default::default()
            })
            .expect_err("missing sender");
        assert_eq!(err.code, ErrorCode::InvalidTransaction);

        let err = manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                ..Default::default()
            })
            .expect_err("missing chain id");
        assert_eq!(err.code, ErrorCode::InvalidTransaction);
    }

    #[test]
    fn test_prepare_rejects_negative_amount() {
        let manager = manager();
        let err = manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                chain_id: "0".to_string(),
                amount: Some(-1.0),
                ..Default::default()
            })
            .expect_err("negative amount");
        assert_eq!(err.code, ErrorCode::InvalidTransaction);
    }

    #[test]
    fn test_prepare_accepts_zero_amount() {
        let manager = manager();
        assert!(manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                chain_id: "0".to_string(),
                amount: Some(0.0),
                ..Default::default()
            })
            .is_ok());
    }

    #[test]
    fn test_prepare_rejects_terminal_initial_status() {
        let manager = manager();
        let err = manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                chain_id: "0".to_string(),
                status: Some(TransactionStatus::Success),
                ..Default::default()
            })
            .expect_err("terminal initial status");
        assert_eq!(err.code, ErrorCode::InvalidTransaction);
    }

    #[test]
    fn test_prepare_allows_submitted_initial_status() {
        let manager = manager();
        let tx = manager
            .prepare(TransactionDraft {
                from: "k:aaa".to_string(),
                chain_id: "0".to_string(),
                hash: Some("h1".to_string()),
                status: Some(TransactionStatus::Submitted),
                ..Default::default()
            })
            .expect("prepare");
        assert_eq!(tx.status, TransactionStatus::Submitted);
    }
}
