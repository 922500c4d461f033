//! # Wallet Session Coordinator
//!
//! Headless core of a non-custodial wallet: owns the session state, applies
//! account/network/transaction mutations, drives transaction-confirmation
//! polling, enforces inactivity auto-lock, and categorizes/recovers from
//! errors. Rendering, persistence media, cryptographic primitives, and chain
//! RPC all live behind capability traits; this crate has no opinion on any
//! of them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  UI / dapp side                                             │
//! │        │ inbound signals            outbound signals ▲      │
//! └────────┼───────────────────────────────────────────── ┼─────┘
//!          ▼                                              │
//!    EventBridge ──► SessionCoordinator ──► SignalBus<OutboundSignal>
//!                        │        ▲
//!          ┌─────────────┼────────┴─────────────┐
//!          ▼             ▼                      ▼
//!   AccountRegistry  TransactionManager   AutoLockGuard
//!   SettingsRegistry (poll timers)        (inactivity timer)
//!          │             │
//!          ▼             ▼
//!    RecordStore    ResultSource        ◄── capability traits
//!    KeyService                             (injected)
//! ```
//!
//! ## State Management
//!
//! The canonical [`WalletState`] lives behind `Arc<RwLock<_>>` with locks
//! held briefly; every mutation is serialized through a single async update
//! gate, so subscribers always observe whole updates and two racing
//! operations never interleave. See [`session`] for the full discipline.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wallet_session::{SessionConfig, WalletSession};
//!
//! let session = WalletSession::start(
//!     SessionConfig::from_env(),
//!     store,      // Arc<dyn RecordStore>
//!     keys,       // Arc<dyn KeyService>
//!     source,     // Arc<dyn ResultSource>
//! )
//! .await;
//!
//! let _sub = session.coordinator().subscribe(|state| render(state));
//! session.signals().emit(InboundSignal::Navigate(Screen::Accounts));
//! ```

pub mod bridge;
pub mod core;
pub mod guard;
pub mod logging;
pub mod services;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use crate::core::{
    ErrorCode, ErrorHandler, RecoveryStrategy, Result, SessionConfig, Severity, WalletError,
};
pub use crate::core::service::{
    KeyPair, KeyService, PollOutcome, PollStatus, RecordStore, ResultSource, SignedCommand,
};
pub use bridge::{BusSubscription, EventBridge, SignalBus};
pub use guard::{AutoLockGuard, FixedWindowThrottle};
pub use services::{AccountRegistry, SettingsRegistry, TransactionDraft, TransactionManager};
pub use session::signals::{
    ActivityKind, InboundKind, InboundSignal, OutboundKind, OutboundSignal, Signal,
};
pub use session::state::{
    Account, NetworkInfo, Screen, Settings, SigningRequest, Transaction, TransactionStatus,
    WalletState,
};
pub use session::{SessionCoordinator, StateSubscription, WalletSession};
