//! # Session State Coordinator
//!
//! The aggregate root of the wallet session. Owns the canonical
//! [`WalletState`], applies validated mutations, notifies subscribers, and
//! composes the account/settings/transaction services and the error handler.
//!
//! ## Architecture
//!
//! ```text
//! inbound signal ──► EventBridge ──► SessionCoordinator ──► service call
//!                                        │                  (RecordStore /
//!                                        │                   KeyService /
//!                                        ▼                   ResultSource)
//!                                  state replaced
//!                                        │
//!                                        ├──► subscribers notified
//!                                        └──► outbound signal emitted
//! ```
//!
//! ## Mutation discipline
//!
//! Every mutation funnels through one serialized update path: a
//! `tokio::sync::Mutex` gate is held across "read snapshot → side effect →
//! merge → publish → notify", so two racing operations never interleave
//! mid-update and no listener ever observes a state mixing before/after
//! fields of the same update. Collaborator side effects run **before** the
//! merge is published; a persistence failure therefore leaves the previous
//! snapshot in place and is re-thrown after routing through the error
//! handler, so no partial, unobserved mutation is ever visible.
//!
//! Locks on the state itself are held briefly (clone out, drop, then work),
//! the same discipline the rest of the crate follows.

pub mod signals;
pub mod state;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::bridge::{EventBridge, SignalBus};
use crate::core::config::SessionConfig;
use crate::core::error::{Result, Severity, WalletError};
use crate::core::handler::ErrorHandler;
use crate::core::service::{KeyService, RecordStore, ResultSource};
use crate::guard::AutoLockGuard;
use crate::services::{AccountRegistry, SettingsRegistry, TransactionDraft, TransactionManager};
use signals::{InboundSignal, OutboundSignal};
use state::{
    Account, Screen, Settings, SigningRequest, StateUpdate, Transaction, TransactionStatus,
    WalletState, MAX_STATE_ERRORS, MAX_TRANSACTIONS,
};

#[derive(Clone)]
struct ListenerEntry {
    id: u64,
    callback: Arc<dyn Fn(&WalletState) + Send + Sync>,
}

type ListenerTable = Arc<Mutex<Vec<ListenerEntry>>>;

/// Handle for one state subscription. Dropping it (or calling
/// [`StateSubscription::unsubscribe`]) removes the listener immediately: no
/// notification is delivered after the drop returns.
pub struct StateSubscription {
    id: u64,
    listeners: std::sync::Weak<Mutex<Vec<ListenerEntry>>>,
}

impl StateSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|entry| entry.id != self.id);
        }
    }
}

/// The aggregate root: single entry point for all wallet state mutation.
pub struct SessionCoordinator {
    state: RwLock<WalletState>,
    /// Serializes every mutation; see the module docs.
    update_gate: tokio::sync::Mutex<()>,
    listeners: ListenerTable,
    next_listener_id: AtomicU64,
    /// Handed to background tasks (polling) so teardown is never kept alive.
    self_ref: Weak<SessionCoordinator>,
    store: Arc<dyn RecordStore>,
    accounts: AccountRegistry,
    settings: SettingsRegistry,
    transactions: TransactionManager,
    errors: Arc<ErrorHandler>,
    bus: SignalBus<OutboundSignal>,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn RecordStore>,
        keys: Arc<dyn KeyService>,
        source: Arc<dyn ResultSource>,
        bus: SignalBus<OutboundSignal>,
        errors: Arc<ErrorHandler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            state: RwLock::new(WalletState::new()),
            update_gate: tokio::sync::Mutex::new(()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
            self_ref: self_ref.clone(),
            accounts: AccountRegistry::new(store.clone(), keys),
            settings: SettingsRegistry::new(store.clone()),
            transactions: TransactionManager::new(source, &config),
            store,
            errors,
            bus,
        })
    }

    /// Load persisted records and publish the opening state.
    ///
    /// Never fails: each record type that cannot be loaded degrades to its
    /// empty/default form (the failure is routed through the error handler),
    /// and the session starts with whatever survived. Unfinished submitted
    /// transactions resume polling.
    pub async fn initialize(&self) -> WalletState {
        let _gate = self.update_gate.lock().await;
        let mut init_errors = Vec::new();

        let accounts = match self.accounts.load().await {
            Ok(accounts) => accounts,
            Err(err) => {
                init_errors.push(self.errors.handle(err.with_context("initialize:keys")).await);
                Vec::new()
            }
        };

        let mut transactions = match self.store.get_transactions().await {
            Ok(transactions) => transactions,
            Err(err) => {
                init_errors.push(
                    self.errors
                        .handle(err.with_context("initialize:transactions"))
                        .await,
                );
                Vec::new()
            }
        };
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions.truncate(MAX_TRANSACTIONS);

        let settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(err) => {
                init_errors.push(
                    self.errors
                        .handle(err.with_context("initialize:settings"))
                        .await,
                );
                Settings::default()
            }
        };

        let selected_key = match self.store.get_selected_key().await {
            Ok(selected) => selected,
            Err(err) => {
                init_errors.push(
                    self.errors
                        .handle(err.with_context("initialize:selected-key"))
                        .await,
                );
                None
            }
        };

        let mut next = WalletState::new();
        next.settings = settings;
        next.selected_account =
            selected_key.and_then(|addr| accounts.iter().find(|a| a.address == addr).cloned());
        next.accounts = accounts;
        next.transactions = transactions;
        next.errors = init_errors;

        // Resume polling for anything still awaiting a result.
        for tx in &next.transactions {
            if !tx.status.is_terminal() {
                if let Some(hash) = &tx.hash {
                    self.transactions
                        .start_polling(self.self_ref.clone(), tx.id.clone(), hash.clone());
                }
            }
        }

        let snapshot = next.clone();
        *self.state.write() = next;
        self.notify(&snapshot);
        tracing::info!(
            accounts = snapshot.accounts.len(),
            transactions = snapshot.transactions.len(),
            "Session initialized"
        );
        snapshot
    }

    /// Immutable snapshot of the current state.
    pub fn state(&self) -> WalletState {
        self.state.read().clone()
    }

    /// Register a state listener. Notification order is registration order.
    pub fn subscribe(
        &self,
        listener: impl Fn(&WalletState) + Send + Sync + 'static,
    ) -> StateSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(ListenerEntry {
            id,
            callback: Arc::new(listener),
        });
        StateSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Merge a partial update into the state.
    ///
    /// Stamps `last_activity`, persists settings when the update carries
    /// them, publishes, then notifies subscribers. On persistence failure the
    /// pre-update snapshot stays published and the routed error is returned.
    pub async fn update_state(&self, update: StateUpdate) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        self.apply_update(update).await
    }

    /// Refresh `last_activity` without a merge/notify cycle. Raw activity
    /// signals come in far too often to fan out to subscribers.
    pub fn touch_activity(&self) {
        let mut state = self.state.write();
        state.last_activity = state.last_activity.max(Utc::now().timestamp_millis());
    }

    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn account_registry(&self) -> &AccountRegistry {
        &self.accounts
    }

    // ========== Derived Operations ==========

    /// Navigate to a screen. While locked, every screen except the accounts
    /// view redirects back to it.
    pub async fn set_current_screen(&self, screen: Screen) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let locked = self.state.read().is_locked;
        let target = if locked && screen != Screen::Accounts {
            tracing::info!(requested = screen.title(), "Navigation while locked, staying on accounts");
            Screen::Accounts
        } else {
            screen
        };
        self.apply_update(StateUpdate {
            current_screen: Some(target),
            ..Default::default()
        })
        .await
    }

    /// Select an account by address. Rejected while locked; the address must
    /// name a registered account.
    pub async fn set_selected_account(&self, address: &str) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if self.state.read().is_locked {
            return Err(self
                .route_error(WalletError::permission_denied(
                    "Cannot select an account while the wallet is locked",
                ))
                .await);
        }
        let account = self.state.read().find_account(address).cloned();
        let Some(account) = account else {
            return Err(self.route_error(WalletError::account_not_found(address)).await);
        };
        if let Err(err) = self.store.set_selected_key(Some(address)).await {
            return Err(self
                .route_error(err.with_context("set_selected_account"))
                .await);
        }
        let out = self
            .apply_update(StateUpdate {
                selected_account: Some(Some(account.clone())),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::AccountSelected(account));
        Ok(out)
    }

    /// Adopt an externally constructed account: persist it, then add it to
    /// state. A persistence failure leaves the in-memory state untouched.
    pub async fn add_account(&self, account: Account) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if self.state.read().find_account(&account.address).is_some() {
            return Err(self
                .route_error(WalletError::validation(format!(
                    "Account already exists: {}",
                    account.address
                )))
                .await);
        }
        if let Err(err) = self.accounts.persist(&account).await {
            return Err(self.route_error(err.with_context("add_account")).await);
        }
        self.adopt_account(account).await
    }

    /// Generate a fresh account through the key service and add it.
    pub async fn create_account(&self, name: &str, chain_id: &str) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let account = match self.accounts.generate(name, chain_id).await {
            Ok(account) => account,
            Err(err) => return Err(self.route_error(err).await),
        };
        self.adopt_account(account).await
    }

    /// Import an account from hex private key material and add it.
    pub async fn import_account(
        &self,
        private_key_hex: &str,
        name: &str,
        chain_id: &str,
        alias: Option<&str>,
    ) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let account = match self.accounts.import(private_key_hex, name, chain_id, alias).await {
            Ok(account) => account,
            Err(err) => return Err(self.route_error(err).await),
        };
        if self.state.read().find_account(&account.address).is_some() {
            return Err(self
                .route_error(WalletError::validation(format!(
                    "Account already exists: {}",
                    account.address
                )))
                .await);
        }
        self.adopt_account(account).await
    }

    /// Remove an account. When the selected account is removed, selection
    /// falls to the first remaining account (or clears).
    pub async fn remove_account(&self, address: &str) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if self.state.read().find_account(address).is_none() {
            return Err(self.route_error(WalletError::account_not_found(address)).await);
        }
        if let Err(err) = self.accounts.remove(address).await {
            return Err(self.route_error(err.with_context("remove_account")).await);
        }

        let snapshot = self.state.read().clone();
        let remaining: Vec<Account> = snapshot
            .accounts
            .iter()
            .filter(|a| a.address != address)
            .cloned()
            .collect();

        let mut update = StateUpdate {
            accounts: Some(remaining.clone()),
            ..Default::default()
        };
        if snapshot.selected_account.as_ref().map(|a| a.address.as_str()) == Some(address) {
            let next_selected = remaining.first().cloned();
            if let Err(err) = self
                .store
                .set_selected_key(next_selected.as_ref().map(|a| a.address.as_str()))
                .await
            {
                self.route_error(err.with_context("remove_account:selected")).await;
            }
            update.selected_account = Some(next_selected);
        }
        self.apply_update(update).await
    }

    /// Switch the active network. The id must name a known network.
    pub async fn set_active_network(&self, network_id: &str) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let network = self
            .state
            .read()
            .networks
            .iter()
            .find(|n| n.id == network_id)
            .cloned();
        let Some(network) = network else {
            return Err(self
                .route_error(WalletError::validation(format!(
                    "Unknown network: {network_id}"
                )))
                .await);
        };
        let out = self
            .apply_update(StateUpdate {
                active_network: Some(Some(network.id.clone())),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::NetworkChanged(network));
        Ok(out)
    }

    /// Validate a draft, persist the minted record, and add it to state.
    /// When the hash is already known, polling begins immediately.
    pub async fn add_transaction(&self, draft: TransactionDraft) -> Result<Transaction> {
        let _gate = self.update_gate.lock().await;
        let tx = match self.transactions.prepare(draft) {
            Ok(tx) => tx,
            Err(err) => return Err(self.route_error(err).await),
        };
        if let Err(err) = self.store.save_transaction(&tx).await {
            return Err(self.route_error(err.with_context("add_transaction")).await);
        }
        self.insert_transaction(tx.clone(), StateUpdate::default())
            .await?;
        Ok(tx)
    }

    /// Transition a transaction's status.
    ///
    /// Idempotent: reapplying the same terminal `(status, result)` pair is an
    /// observable no-op. Any other transition out of a terminal status is
    /// rejected with the state unchanged. Reaching a terminal status stops
    /// the active poll for the id.
    pub async fn update_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
        result: Option<serde_json::Value>,
    ) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let existing = self.state.read().find_transaction(id).cloned();
        let Some(existing) = existing else {
            return Err(self
                .route_error(WalletError::invalid_transaction(format!(
                    "Unknown transaction: {id}"
                )))
                .await);
        };

        if existing.status.is_terminal() {
            if existing.status == status && existing.result == result {
                return Ok(self.state.read().clone());
            }
            return Err(self
                .route_error(WalletError::invalid_transaction(format!(
                    "Transaction {id} already reached terminal status {:?}",
                    existing.status
                )))
                .await);
        }

        let mut updated = existing;
        updated.status = status;
        if result.is_some() {
            updated.result = result;
        }
        updated.updated_at = Some(Utc::now().timestamp_millis());

        let transactions: Vec<Transaction> = self
            .state
            .read()
            .transactions
            .iter()
            .map(|t| if t.id == id { updated.clone() } else { t.clone() })
            .collect();
        if let Err(err) = self.store.save_transactions(&transactions).await {
            return Err(self
                .route_error(err.with_context("update_transaction_status"))
                .await);
        }

        let out = self
            .apply_update(StateUpdate {
                transactions: Some(transactions),
                ..Default::default()
            })
            .await?;
        if status.is_terminal() {
            self.transactions.stop_polling(id);
        }
        tracing::info!(id = %id, status = ?status, "Transaction status updated");
        self.bus.emit(OutboundSignal::TransactionUpdated(updated));
        Ok(out)
    }

    /// Lock the wallet: selection cleared, accounts screen forced. The
    /// persisted selected key is kept so unlock can restore it.
    pub async fn lock_wallet(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if self.state.read().is_locked {
            return Ok(self.state.read().clone());
        }
        let out = self
            .apply_update(StateUpdate {
                is_locked: Some(true),
                selected_account: Some(None),
                current_screen: Some(Screen::Accounts),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::WalletLocked);
        Ok(out)
    }

    /// Unlock the wallet and restore the persisted selection when it still
    /// names a registered account.
    pub async fn unlock_wallet(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let restored = match self.store.get_selected_key().await {
            Ok(Some(address)) => self.state.read().find_account(&address).cloned(),
            Ok(None) => None,
            Err(err) => {
                self.route_error(err.with_context("unlock_wallet")).await;
                None
            }
        };
        let out = self
            .apply_update(StateUpdate {
                is_locked: Some(false),
                selected_account: Some(restored),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::WalletUnlocked);
        Ok(out)
    }

    /// Validate and apply new settings. Persistence happens inside the update
    /// path; a failure rolls the whole update back.
    pub async fn update_settings(&self, settings: Settings) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if let Err(err) = self.settings.validate(&settings) {
            return Err(self.route_error(err).await);
        }
        let out = self
            .apply_update(StateUpdate {
                settings: Some(settings.clone()),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::SettingsChanged(settings));
        Ok(out)
    }

    /// Wipe every persisted record and reset to the opening state.
    pub async fn clear_all_data(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if let Err(err) = self.store.clear_all_data().await {
            return Err(self.route_error(err.with_context("clear_all_data")).await);
        }
        self.transactions.stop_all();

        let next = WalletState::new();
        let snapshot = next.clone();
        *self.state.write() = next;
        self.notify(&snapshot);
        tracing::info!("Wallet data cleared");
        self.bus.emit(OutboundSignal::WalletDataCleared);
        Ok(snapshot)
    }

    // ========== Signing & Connection Flow ==========

    /// Park an incoming signing request for approval and surface the sign
    /// screen (unless locked, in which case the request waits behind the
    /// accounts view).
    pub async fn receive_signing_request(&self, request: SigningRequest) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let locked = self.state.read().is_locked;
        tracing::info!(request = %request.id, from = %request.from, "Signing request received");
        self.apply_update(StateUpdate {
            pending_request: Some(Some(request)),
            current_screen: Some(if locked { Screen::Accounts } else { Screen::Sign }),
            ..Default::default()
        })
        .await
    }

    /// Approve the pending signing request: sign it, persist the submitted
    /// transaction, and start polling its hash. The pending slot is kept on
    /// signing failure so the user can retry.
    pub async fn approve_pending_request(&self) -> Result<Transaction> {
        let _gate = self.update_gate.lock().await;
        let (pending, selected, locked) = {
            let state = self.state.read();
            (
                state.pending_request.clone(),
                state.selected_account.clone(),
                state.is_locked,
            )
        };
        let Some(request) = pending else {
            return Err(self
                .route_error(WalletError::validation("No pending signing request"))
                .await);
        };
        if locked {
            return Err(self
                .route_error(WalletError::permission_denied(
                    "Cannot sign while the wallet is locked",
                ))
                .await);
        }

        // The request's sender wins when it names a held account; otherwise
        // fall back to the current selection.
        let signer = self
            .state
            .read()
            .find_account(&request.from)
            .cloned()
            .or(selected);
        let Some(signer) = signer else {
            return Err(self.route_error(WalletError::account_not_found(&request.from)).await);
        };

        let signed = match self.accounts.sign(&request, &signer).await {
            Ok(signed) => signed,
            Err(err) => {
                return Err(self
                    .route_error(err.with_context("approve_pending_request"))
                    .await)
            }
        };

        let tx = Transaction {
            id: request.id.clone(),
            hash: Some(signed.hash.clone()),
            from: request.from.clone(),
            to: request.to.clone(),
            amount: request.amount,
            gas: None,
            status: TransactionStatus::Submitted,
            timestamp: Utc::now().timestamp_millis(),
            chain_id: request.chain_id.clone(),
            capability: request.capability.clone(),
            data: request.data.clone(),
            result: None,
            updated_at: None,
        };
        if let Err(err) = self.store.save_transaction(&tx).await {
            return Err(self
                .route_error(err.with_context("approve_pending_request"))
                .await);
        }

        self.insert_transaction(
            tx.clone(),
            StateUpdate {
                pending_request: Some(None),
                current_screen: Some(Screen::Transactions),
                ..Default::default()
            },
        )
        .await?;
        Ok(tx)
    }

    /// Reject the pending signing request. The rejection is announced
    /// outward as a `wallet-error` carrying the `signing-rejected` code.
    pub async fn reject_pending_request(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        if self.state.read().pending_request.is_none() {
            return Err(self
                .route_error(WalletError::validation("No pending signing request"))
                .await);
        }
        self.route_error(WalletError::signing_rejected(
            "Signing request rejected by user",
        ))
        .await;
        self.apply_update(StateUpdate {
            pending_request: Some(None),
            current_screen: Some(Screen::Accounts),
            ..Default::default()
        })
        .await
    }

    /// Surface the connect-approval screen for a dapp origin.
    pub async fn receive_connect_request(&self, origin: &str) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let locked = self.state.read().is_locked;
        tracing::info!(origin, "Connection requested");
        self.apply_update(StateUpdate {
            current_screen: Some(if locked { Screen::Accounts } else { Screen::Connect }),
            ..Default::default()
        })
        .await
    }

    /// Approve the connection: announces the selected account outward.
    pub async fn approve_connect(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        let selected = self.state.read().selected_account.clone();
        let Some(account) = selected else {
            return Err(self
                .route_error(WalletError::new(
                    crate::core::error::ErrorCode::AccountNotFound,
                    Severity::Medium,
                    false,
                    "No account selected for connection",
                ))
                .await);
        };
        let out = self
            .apply_update(StateUpdate {
                current_screen: Some(Screen::Accounts),
                ..Default::default()
            })
            .await?;
        self.bus.emit(OutboundSignal::AccountSelected(account));
        Ok(out)
    }

    /// Cancel the connection request. Announced outward as `user-cancelled`.
    pub async fn cancel_connect(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        self.route_error(WalletError::user_cancelled("Connection request cancelled"))
            .await;
        self.apply_update(StateUpdate {
            current_screen: Some(Screen::Accounts),
            ..Default::default()
        })
        .await
    }

    /// Drop any pending request and return to the accounts screen.
    pub async fn reset_connection_state(&self) -> Result<WalletState> {
        let _gate = self.update_gate.lock().await;
        self.apply_update(StateUpdate {
            pending_request: Some(None),
            current_screen: Some(Screen::Accounts),
            ..Default::default()
        })
        .await
    }

    /// Cancel all background work owned by the coordinator.
    pub fn shutdown(&self) {
        self.transactions.stop_all();
        tracing::info!("Session coordinator shut down");
    }

    // ========== Internals ==========

    // Caller must hold the update gate.
    async fn apply_update(&self, update: StateUpdate) -> Result<WalletState> {
        let settings_to_persist = update.settings.clone();

        let mut next = self.state.read().clone();
        next.apply(update);
        next.last_activity = next.last_activity.max(Utc::now().timestamp_millis());

        if let Some(settings) = &settings_to_persist {
            if let Err(err) = self.settings.save(settings).await {
                // The pre-update snapshot stays published; nothing of this
                // update was observed by anyone.
                return Err(self
                    .route_error(err.with_context("update_state:settings"))
                    .await);
            }
        }

        let snapshot = next.clone();
        *self.state.write() = next;
        self.notify(&snapshot);
        Ok(snapshot)
    }

    // Caller must hold the update gate and have persisted the account.
    // Adds it to state, auto-selecting when nothing is selected yet.
    async fn adopt_account(&self, account: Account) -> Result<WalletState> {
        let (accounts, auto_select) = {
            let state = self.state.read();
            let mut accounts = state.accounts.clone();
            accounts.push(account.clone());
            let auto_select = state.selected_account.is_none() && !state.is_locked;
            (accounts, auto_select)
        };

        let mut update = StateUpdate {
            accounts: Some(accounts),
            ..Default::default()
        };
        if auto_select {
            if let Err(err) = self.store.set_selected_key(Some(&account.address)).await {
                self.route_error(err.with_context("add_account:selected")).await;
            } else {
                update.selected_account = Some(Some(account.clone()));
            }
        }
        let out = self.apply_update(update).await?;
        self.bus.emit(OutboundSignal::AccountCreated(account));
        Ok(out)
    }

    // Caller must hold the update gate. Persisting the record is the
    // caller's job; this inserts into state, starts polling, and announces.
    async fn insert_transaction(
        &self,
        tx: Transaction,
        mut update: StateUpdate,
    ) -> Result<WalletState> {
        let mut transactions = self.state.read().transactions.clone();
        transactions.insert(0, tx.clone());
        transactions.truncate(MAX_TRANSACTIONS);
        update.transactions = Some(transactions);

        let out = self.apply_update(update).await?;
        if let Some(hash) = &tx.hash {
            if !tx.status.is_terminal() {
                self.transactions
                    .start_polling(self.self_ref.clone(), tx.id.clone(), hash.clone());
            }
        }
        self.bus.emit(OutboundSignal::TransactionAdded(tx));
        Ok(out)
    }

    async fn route_error(&self, error: WalletError) -> WalletError {
        let handled = self.errors.handle(error).await;
        let mut state = self.state.write();
        state.errors.push(handled.clone());
        if state.errors.len() > MAX_STATE_ERRORS {
            let overflow = state.errors.len() - MAX_STATE_ERRORS;
            state.errors.drain(0..overflow);
        }
        handled
    }

    fn notify(&self, state: &WalletState) {
        let entries: Vec<ListenerEntry> = self.listeners.lock().clone();
        for entry in entries {
            // A panicking listener must not corrupt the notification cycle.
            if catch_unwind(AssertUnwindSafe(|| (entry.callback)(state))).is_err() {
                tracing::error!(listener = entry.id, "State listener panicked");
            }
        }
    }
}

/// Composition root: wires the coordinator, auto-lock guard, event bridge,
/// and buses into a running session.
pub struct WalletSession {
    coordinator: Arc<SessionCoordinator>,
    guard: AutoLockGuard,
    bridge: EventBridge,
    inbound: SignalBus<InboundSignal>,
    outbound: SignalBus<OutboundSignal>,
}

impl WalletSession {
    /// Build and initialize a session around the given collaborators.
    pub async fn start(
        config: SessionConfig,
        store: Arc<dyn RecordStore>,
        keys: Arc<dyn KeyService>,
        source: Arc<dyn ResultSource>,
    ) -> Self {
        let outbound: SignalBus<OutboundSignal> = SignalBus::new();
        let errors = Arc::new(ErrorHandler::new());
        errors.set_sink({
            let bus = outbound.clone();
            move |err| bus.emit(OutboundSignal::WalletError(err))
        });

        let coordinator = SessionCoordinator::new(
            config.clone(),
            store,
            keys,
            source,
            outbound.clone(),
            errors,
        );
        coordinator.initialize().await;

        let guard = AutoLockGuard::start(&coordinator, outbound.clone(), &config);
        let inbound: SignalBus<InboundSignal> = SignalBus::new();
        let bridge = EventBridge::connect(coordinator.clone(), guard.clone(), &inbound);

        Self {
            coordinator,
            guard,
            bridge,
            inbound,
            outbound,
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    pub fn guard(&self) -> &AutoLockGuard {
        &self.guard
    }

    /// Inbound signal entry point (UI/dapp side).
    pub fn signals(&self) -> &SignalBus<InboundSignal> {
        &self.inbound
    }

    /// Outbound signal stream (UI/log side).
    pub fn events(&self) -> &SignalBus<OutboundSignal> {
        &self.outbound
    }

    /// Tear the session down: every listener registration and timer this
    /// session created is removed or cancelled.
    pub fn shutdown(mut self) {
        self.bridge.cleanup();
        self.guard.stop();
        self.coordinator.shutdown();
        tracing::info!("Wallet session shut down");
    }
}
