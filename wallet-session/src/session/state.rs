//! # Session State Types
//!
//! All state owned by the session coordinator: the [`WalletState`] aggregate,
//! its record types (accounts, networks, transactions, settings), and the
//! [`StateUpdate`] partial used for merge-style mutation.
//!
//! One live [`WalletState`] exists per session. It is created empty, populated
//! by `SessionCoordinator::initialize`, and mutated exclusively through the
//! coordinator's update entry point. No other code path may write to it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::WalletError;

/// Maximum transactions retained in state, most-recent-first.
pub const MAX_TRANSACTIONS: usize = 100;

/// Maximum error records mirrored into state for UI consumption.
pub const MAX_STATE_ERRORS: usize = 100;

/// Application screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    /// Account list and selection (the home screen; forced while locked)
    Accounts,
    /// Transfer form
    Send,
    /// Transaction history
    Transactions,
    /// Dapp connection approval
    Connect,
    /// Signing request approval
    Sign,
    /// Preferences
    Settings,
}

impl Screen {
    /// All screens in navigation order.
    pub fn all() -> &'static [Screen] {
        &[
            Screen::Accounts,
            Screen::Send,
            Screen::Transactions,
            Screen::Connect,
            Screen::Sign,
            Screen::Settings,
        ]
    }

    /// Screen title for header display.
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Accounts => "Accounts",
            Screen::Send => "Send",
            Screen::Transactions => "Transaction History",
            Screen::Connect => "Connect",
            Screen::Sign => "Sign Request",
            Screen::Settings => "Settings",
        }
    }
}

/// A wallet account.
///
/// The address derives deterministically from the public key
/// (`"k:" + public_key`) unless the account was imported under an explicit
/// alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub public_key: String,
    /// Present only for locally held keys; never required for watch-only use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub name: String,
    pub chain_id: String,
    pub balance: f64,
}

impl Account {
    /// Derive the canonical single-key address for a public key.
    pub fn derive_address(public_key: &str) -> String {
        format!("k:{public_key}")
    }
}

/// A known chain network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub is_test: bool,
}

/// Built-in network list used when no override is supplied.
pub fn default_networks() -> Vec<NetworkInfo> {
    vec![
        NetworkInfo {
            id: "mainnet01".to_string(),
            name: "Mainnet".to_string(),
            host: "https://api.chainweb.com".to_string(),
            is_test: false,
        },
        NetworkInfo {
            id: "testnet04".to_string(),
            name: "Testnet".to_string(),
            host: "https://api.testnet.chainweb.com".to_string(),
            is_test: true,
        },
    ]
}

/// Transaction lifecycle status.
///
/// `Pending → Submitted → {Success, Failure, Rejected, Expired}`; the last
/// four are terminal and absorb any further transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Submitted,
    Success,
    Failure,
    Rejected,
    Expired,
}

impl TransactionStatus {
    /// Whether no further transition is permitted out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Success
                | TransactionStatus::Failure
                | TransactionStatus::Rejected
                | TransactionStatus::Expired
        )
    }
}

/// A tracked transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id assigned at creation.
    pub id: String,
    /// Populated once the underlying command is finalized; the polling key.
    pub hash: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub amount: Option<f64>,
    pub gas: Option<f64>,
    pub status: TransactionStatus,
    /// Unix milliseconds at creation.
    pub timestamp: i64,
    pub chain_id: String,
    pub capability: Option<String>,
    pub data: Option<serde_json::Value>,
    /// Result payload from the chain, once a terminal status is known.
    pub result: Option<serde_json::Value>,
    pub updated_at: Option<i64>,
}

/// The single in-flight unsigned request awaiting user approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub id: String,
    pub from: String,
    pub to: Option<String>,
    pub amount: Option<f64>,
    pub chain_id: String,
    pub capability: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// User preferences. Extensible: unknown boolean flags round-trip through
/// `flags` so older records never lose information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub auto_lock: bool,
    pub show_test_networks: bool,
    #[serde(flatten)]
    pub flags: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_lock: true,
            show_test_networks: false,
            flags: BTreeMap::new(),
        }
    }
}

/// The session aggregate. One live instance per session.
#[derive(Debug, Clone)]
pub struct WalletState {
    /// Current active screen.
    pub current_screen: Screen,
    /// Known accounts, unique by address, in insertion order.
    pub accounts: Vec<Account>,
    /// Selected account; always a member of `accounts` or `None`.
    pub selected_account: Option<Account>,
    /// Known networks, unique by id.
    pub networks: Vec<NetworkInfo>,
    /// Active network id; always a member of `networks` or `None`.
    pub active_network: Option<String>,
    /// Transaction history, most-recent-first, capped at [`MAX_TRANSACTIONS`].
    pub transactions: Vec<Transaction>,
    /// Single in-flight signing request awaiting approval.
    pub pending_request: Option<SigningRequest>,
    /// Locked sessions have no selected account and show the accounts screen.
    pub is_locked: bool,
    /// Unix milliseconds of the last qualifying activity; never decreases.
    pub last_activity: i64,
    pub settings: Settings,
    /// Recent errors mirrored from the error handler for UI convenience.
    /// Not authoritative.
    pub errors: Vec<WalletError>,
}

impl WalletState {
    /// Empty state at session start: no accounts, defaults everywhere.
    pub fn new() -> Self {
        let networks = default_networks();
        let active_network = networks.first().map(|n| n.id.clone());
        Self {
            current_screen: Screen::Accounts,
            accounts: Vec::new(),
            selected_account: None,
            networks,
            active_network,
            transactions: Vec::new(),
            pending_request: None,
            is_locked: false,
            last_activity: Utc::now().timestamp_millis(),
            settings: Settings::default(),
            errors: Vec::new(),
        }
    }

    /// Look up an account by address.
    pub fn find_account(&self, address: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address == address)
    }

    /// Look up a transaction by id.
    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Networks visible under the current `show_test_networks` preference.
    pub fn visible_networks(&self) -> Vec<&NetworkInfo> {
        self.networks
            .iter()
            .filter(|n| !n.is_test || self.settings.show_test_networks)
            .collect()
    }

    /// Merge a partial update into this state. Fields left `None` in the
    /// update are untouched.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(screen) = update.current_screen {
            self.current_screen = screen;
        }
        if let Some(accounts) = update.accounts {
            self.accounts = accounts;
        }
        if let Some(selected) = update.selected_account {
            self.selected_account = selected;
        }
        if let Some(networks) = update.networks {
            self.networks = networks;
        }
        if let Some(active) = update.active_network {
            self.active_network = active;
        }
        if let Some(transactions) = update.transactions {
            self.transactions = transactions;
        }
        if let Some(pending) = update.pending_request {
            self.pending_request = pending;
        }
        if let Some(locked) = update.is_locked {
            self.is_locked = locked;
        }
        if let Some(settings) = update.settings {
            self.settings = settings;
        }
        if let Some(errors) = update.errors {
            self.errors = errors;
        }
    }
}

impl Default for WalletState {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial state mutation consumed by `SessionCoordinator::update_state`.
///
/// Double-`Option` fields distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub current_screen: Option<Screen>,
    pub accounts: Option<Vec<Account>>,
    pub selected_account: Option<Option<Account>>,
    pub networks: Option<Vec<NetworkInfo>>,
    pub active_network: Option<Option<String>>,
    pub transactions: Option<Vec<Transaction>>,
    pub pending_request: Option<Option<SigningRequest>>,
    pub is_locked: Option<bool>,
    pub settings: Option<Settings>,
    pub errors: Option<Vec<WalletError>>,
}
