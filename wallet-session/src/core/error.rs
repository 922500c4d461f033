//! # Wallet Error Types
//!
//! Centralized error taxonomy for the session coordinator.
//!
//! Every failure in the crate is expressed as a [`WalletError`]: a typed code
//! from a fixed taxonomy plus a severity and a recoverability flag set by the
//! raising site (never inferred downstream). Raw failures coming from
//! collaborators that only surface a message are normalized through
//! [`classify`], which maps keyword heuristics onto the taxonomy.
//!
//! ## Usage Pattern
//!
//! ```rust,no_run
//! use wallet_session::core::error::{Result, WalletError};
//!
//! fn validate_amount(amount: f64) -> Result<f64> {
//!     if amount < 0.0 {
//!         return Err(WalletError::validation("Amount must not be negative"));
//!     }
//!     Ok(amount)
//! }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience type alias for `Result<T, WalletError>`.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Fixed error taxonomy.
///
/// Codes are stable identifiers carried on outbound error signals, so UI and
/// log consumers can switch on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    ConnectionFailed,
    SigningRejected,
    NetworkError,
    StorageError,
    ValidationError,
    CryptoError,
    TimeoutError,
    PermissionDenied,
    AccountNotFound,
    TransactionFailed,
    NetworkUnavailable,
    InsufficientFunds,
    InvalidTransaction,
    UserCancelled,
    AutoLockTriggered,
    ImportFailed,
    ExportFailed,
    MigrationFailed,
}

impl ErrorCode {
    /// Stable kebab-case identifier, as carried on error signals.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "connection-failed",
            ErrorCode::SigningRejected => "signing-rejected",
            ErrorCode::NetworkError => "network-error",
            ErrorCode::StorageError => "storage-error",
            ErrorCode::ValidationError => "validation-error",
            ErrorCode::CryptoError => "crypto-error",
            ErrorCode::TimeoutError => "timeout-error",
            ErrorCode::PermissionDenied => "permission-denied",
            ErrorCode::AccountNotFound => "account-not-found",
            ErrorCode::TransactionFailed => "transaction-failed",
            ErrorCode::NetworkUnavailable => "network-unavailable",
            ErrorCode::InsufficientFunds => "insufficient-funds",
            ErrorCode::InvalidTransaction => "invalid-transaction",
            ErrorCode::UserCancelled => "user-cancelled",
            ErrorCode::AutoLockTriggered => "auto-lock-triggered",
            ErrorCode::ImportFailed => "import-failed",
            ErrorCode::ExportFailed => "export-failed",
            ErrorCode::MigrationFailed => "migration-failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity, ordered from least to most serious.
///
/// `Critical` has special meaning during transaction polling: a critical poll
/// error forces the transaction into a terminal `Failure` status instead of
/// leaving it pending forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Application-wide error type.
///
/// The `recoverable` flag is asserted by the raising site: it means an
/// automated remediation (a registered recovery strategy, or a user re-prompt
/// for validation failures) may resolve the error.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct WalletError {
    /// Taxonomy code.
    pub code: ErrorCode,
    /// How serious the failure is.
    pub severity: Severity,
    /// Whether the raising site believes automated remediation can resolve it.
    pub recoverable: bool,
    /// Human-readable description.
    pub message: String,
    /// Optional free-form context (operation name, record id, ...).
    pub context: Option<String>,
    /// Unix milliseconds at which the error was raised.
    pub timestamp: i64,
}

impl WalletError {
    /// Build an error with an explicit code/severity/recoverability triple.
    pub fn new(
        code: ErrorCode,
        severity: Severity,
        recoverable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            recoverable,
            message: message.into(),
            context: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Attach context describing where the error was raised.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Input validation failure. Low severity, recoverable by construction:
    /// the caller is expected to re-prompt.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, Severity::Low, true, message)
    }

    /// Record store failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, Severity::High, true, message)
    }

    /// Network-level failure talking to a collaborator.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, Severity::Medium, true, message)
    }

    /// Key-material or signing-primitive failure.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, Severity::High, false, message)
    }

    /// Operation exceeded its deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimeoutError, Severity::Medium, true, message)
    }

    /// Operation not permitted in the current session state.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, Severity::Medium, false, message)
    }

    /// Referenced account is not in the registry.
    pub fn account_not_found(address: &str) -> Self {
        Self::new(
            ErrorCode::AccountNotFound,
            Severity::Medium,
            false,
            format!("Account not found: {address}"),
        )
    }

    /// Transaction reached a failure outcome.
    pub fn transaction_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionFailed, Severity::High, false, message)
    }

    /// Transaction draft or transition is not acceptable.
    pub fn invalid_transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransaction, Severity::Low, true, message)
    }

    /// User cancelled or aborted the operation.
    pub fn user_cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UserCancelled, Severity::Low, true, message)
    }

    /// Signing request was rejected by the user.
    pub fn signing_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningRejected, Severity::Low, false, message)
    }

    /// Key import failed (bad format, rejected material).
    pub fn import_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ImportFailed, Severity::Low, true, message)
    }

    /// Key export failed (missing private key, encoding failure).
    pub fn export_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExportFailed, Severity::Low, true, message)
    }

    /// Marker entry recorded when the inactivity guard forces a lock.
    pub fn auto_lock_triggered() -> Self {
        Self::new(
            ErrorCode::AutoLockTriggered,
            Severity::Low,
            false,
            "Wallet locked after inactivity timeout",
        )
    }

    /// Normalize a raw failure message into a typed error via [`classify`].
    pub fn from_message(message: impl Into<String>, context: Option<String>) -> Self {
        let message = message.into();
        let code = classify(&message);
        let (severity, recoverable) = default_profile(code);
        Self {
            code,
            severity,
            recoverable,
            message,
            context,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Classify a raw failure message by keyword heuristics.
///
/// Falls back to `ValidationError` (the least alarming, always-recoverable
/// bucket) when nothing matches.
pub fn classify(message: &str) -> ErrorCode {
    let lower = message.to_lowercase();
    if lower.contains("network") || lower.contains("fetch") {
        ErrorCode::NetworkError
    } else if lower.contains("storage") || lower.contains("index") || lower.contains("database") {
        ErrorCode::StorageError
    } else if lower.contains("crypto") || lower.contains("key") {
        ErrorCode::CryptoError
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCode::TimeoutError
    } else if lower.contains("permission") || lower.contains("access") {
        ErrorCode::PermissionDenied
    } else if lower.contains("cancel") || lower.contains("abort") {
        ErrorCode::UserCancelled
    } else {
        ErrorCode::ValidationError
    }
}

// Default (severity, recoverable) for errors that arrive as bare messages.
// Typed errors keep whatever their raising site asserted.
fn default_profile(code: ErrorCode) -> (Severity, bool) {
    match code {
        ErrorCode::NetworkError => (Severity::Medium, true),
        ErrorCode::StorageError => (Severity::High, true),
        ErrorCode::CryptoError => (Severity::High, false),
        ErrorCode::TimeoutError => (Severity::Medium, true),
        ErrorCode::PermissionDenied => (Severity::Medium, false),
        ErrorCode::UserCancelled => (Severity::Low, true),
        _ => (Severity::Low, true),
    }
}
