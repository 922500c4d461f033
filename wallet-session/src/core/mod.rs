//! # Core Abstractions
//!
//! Foundational pieces used throughout the session coordinator:
//!
//! - **[`error`]**: the error taxonomy (`WalletError`, `ErrorCode`, `Severity`)
//! - **[`handler`]**: the central `ErrorHandler` (logging, recovery, retry)
//! - **[`service`]**: capability traits for external collaborators
//!   (`RecordStore`, `KeyService`, `ResultSource`)
//! - **[`config`]**: timing configuration (`SessionConfig`)
//!
//! Service traits exist for dependency injection: production wires real
//! implementations, tests wire in-memory fakes.

pub mod config;
pub mod error;
pub mod handler;
pub mod service;

// Re-export commonly used types for convenience
pub use config::SessionConfig;
pub use error::{ErrorCode, Result, Severity, WalletError};
pub use handler::{ErrorHandler, RecoveryStrategy};
pub use service::{KeyService, PollOutcome, PollStatus, RecordStore, ResultSource};
