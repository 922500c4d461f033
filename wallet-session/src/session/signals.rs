//! # Session Signals
//!
//! Typed signal sets carried on the [`crate::bridge::SignalBus`].
//!
//! Inbound signals are UI/dapp-originated requests translated by the event
//! bridge into coordinator calls. Outbound signals announce committed state
//! changes for UI and log consumption. Each signal maps to a `kind`
//! discriminant so subscribers can register per signal name.

use crate::core::error::WalletError;
use crate::session::state::{Account, NetworkInfo, Screen, Settings, SigningRequest, Transaction};

/// Signals that can be carried on a [`crate::bridge::SignalBus`].
///
/// `Kind` is the subscription key: one variant of the payload enum per kind.
pub trait Signal: Clone + Send + 'static {
    type Kind: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send;

    fn kind(&self) -> Self::Kind;

    /// Stable signal name for logging.
    fn name(&self) -> &'static str;
}

/// Raw user-activity categories watched by the auto-lock guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Pointer,
    Keyboard,
    Scroll,
}

/// Discriminants for [`InboundSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Navigate,
    AccountSelectedRequest,
    NetworkChangeRequest,
    SignRequested,
    ConnectRequested,
    ConnectApproved,
    ConnectCancelled,
    SignApproved,
    SignRejected,
    SettingsChangeRequest,
    ResetConnectionState,
    UserActivity,
}

impl InboundKind {
    /// Every inbound kind, in the order the bridge registers handlers.
    pub fn all() -> &'static [InboundKind] {
        &[
            InboundKind::Navigate,
            InboundKind::AccountSelectedRequest,
            InboundKind::NetworkChangeRequest,
            InboundKind::SignRequested,
            InboundKind::ConnectRequested,
            InboundKind::ConnectApproved,
            InboundKind::ConnectCancelled,
            InboundKind::SignApproved,
            InboundKind::SignRejected,
            InboundKind::SettingsChangeRequest,
            InboundKind::ResetConnectionState,
            InboundKind::UserActivity,
        ]
    }
}

/// Requests arriving from the UI or a connected dapp.
#[derive(Debug, Clone)]
pub enum InboundSignal {
    Navigate(Screen),
    AccountSelectedRequest { address: String },
    NetworkChangeRequest { network_id: String },
    SignRequested(SigningRequest),
    ConnectRequested { origin: String },
    ConnectApproved,
    ConnectCancelled,
    SignApproved,
    SignRejected,
    SettingsChangeRequest(Settings),
    ResetConnectionState,
    UserActivity(ActivityKind),
}

impl Signal for InboundSignal {
    type Kind = InboundKind;

    fn kind(&self) -> InboundKind {
        match self {
            InboundSignal::Navigate(_) => InboundKind::Navigate,
            InboundSignal::AccountSelectedRequest { .. } => InboundKind::AccountSelectedRequest,
            InboundSignal::NetworkChangeRequest { .. } => InboundKind::NetworkChangeRequest,
            InboundSignal::SignRequested(_) => InboundKind::SignRequested,
            InboundSignal::ConnectRequested { .. } => InboundKind::ConnectRequested,
            InboundSignal::ConnectApproved => InboundKind::ConnectApproved,
            InboundSignal::ConnectCancelled => InboundKind::ConnectCancelled,
            InboundSignal::SignApproved => InboundKind::SignApproved,
            InboundSignal::SignRejected => InboundKind::SignRejected,
            InboundSignal::SettingsChangeRequest(_) => InboundKind::SettingsChangeRequest,
            InboundSignal::ResetConnectionState => InboundKind::ResetConnectionState,
            InboundSignal::UserActivity(_) => InboundKind::UserActivity,
        }
    }

    fn name(&self) -> &'static str {
        match self.kind() {
            InboundKind::Navigate => "navigate",
            InboundKind::AccountSelectedRequest => "account-selected-request",
            InboundKind::NetworkChangeRequest => "network-change-request",
            InboundKind::SignRequested => "sign-requested",
            InboundKind::ConnectRequested => "connect-requested",
            InboundKind::ConnectApproved => "connect-approved",
            InboundKind::ConnectCancelled => "connect-cancelled",
            InboundKind::SignApproved => "sign-approved",
            InboundKind::SignRejected => "sign-rejected",
            InboundKind::SettingsChangeRequest => "settings-changed-request",
            InboundKind::ResetConnectionState => "reset-connection-state",
            InboundKind::UserActivity => "user-activity",
        }
    }
}

/// Discriminants for [`OutboundSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundKind {
    AccountSelected,
    AccountCreated,
    NetworkChanged,
    WalletLocked,
    WalletUnlocked,
    SettingsChanged,
    WalletDataCleared,
    TransactionAdded,
    TransactionUpdated,
    WalletError,
    AutoLocked,
}

/// Committed state changes announced for UI and log consumption.
#[derive(Debug, Clone)]
pub enum OutboundSignal {
    AccountSelected(Account),
    AccountCreated(Account),
    NetworkChanged(NetworkInfo),
    WalletLocked,
    WalletUnlocked,
    SettingsChanged(Settings),
    WalletDataCleared,
    TransactionAdded(Transaction),
    TransactionUpdated(Transaction),
    WalletError(WalletError),
    AutoLocked,
}

impl Signal for OutboundSignal {
    type Kind = OutboundKind;

    fn kind(&self) -> OutboundKind {
        match self {
            OutboundSignal::AccountSelected(_) => OutboundKind::AccountSelected,
            OutboundSignal::AccountCreated(_) => OutboundKind::AccountCreated,
            OutboundSignal::NetworkChanged(_) => OutboundKind::NetworkChanged,
            OutboundSignal::WalletLocked => OutboundKind::WalletLocked,
            OutboundSignal::WalletUnlocked => OutboundKind::WalletUnlocked,
            OutboundSignal::SettingsChanged(_) => OutboundKind::SettingsChanged,
            OutboundSignal::WalletDataCleared => OutboundKind::WalletDataCleared,
            OutboundSignal::TransactionAdded(_) => OutboundKind::TransactionAdded,
            OutboundSignal::TransactionUpdated(_) => OutboundKind::TransactionUpdated,
            OutboundSignal::WalletError(_) => OutboundKind::WalletError,
            OutboundSignal::AutoLocked => OutboundKind::AutoLocked,
        }
    }

    fn name(&self) -> &'static str {
        match self.kind() {
            OutboundKind::AccountSelected => "account-selected",
            OutboundKind::AccountCreated => "account-created",
            OutboundKind::NetworkChanged => "network-changed",
            OutboundKind::WalletLocked => "wallet-locked",
            OutboundKind::WalletUnlocked => "wallet-unlocked",
            OutboundKind::SettingsChanged => "settings-changed",
            OutboundKind::WalletDataCleared => "wallet-data-cleared",
            OutboundKind::TransactionAdded => "transaction-added",
            OutboundKind::TransactionUpdated => "transaction-updated",
            OutboundKind::WalletError => "wallet-error",
            OutboundKind::AutoLocked => "auto-locked",
        }
    }
}
