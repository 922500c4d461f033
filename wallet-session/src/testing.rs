//! In-memory collaborator implementations shared by the test suite.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bridge::SignalBus;
use crate::core::config::SessionConfig;
use crate::core::error::{Result, WalletError};
use crate::core::handler::ErrorHandler;
use crate::core::service::{
    KeyPair, KeyService, PollOutcome, RecordStore, ResultSource, SignedCommand,
};
use crate::session::signals::OutboundSignal;
use crate::session::state::{Account, Settings, SigningRequest, Transaction};
use crate::session::SessionCoordinator;

/// HashMap-backed record store with injectable failures.
pub(crate) struct MemoryRecordStore {
    keys: Mutex<Vec<Account>>,
    transactions: Mutex<Vec<Transaction>>,
    settings: Mutex<Option<Settings>>,
    selected: Mutex<Option<String>>,
    fail_key_saves: AtomicBool,
    fail_tx_saves: AtomicBool,
    fail_settings_records: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Vec::new()),
            transactions: Mutex::new(Vec::new()),
            settings: Mutex::new(None),
            selected: Mutex::new(None),
            fail_key_saves: AtomicBool::new(false),
            fail_tx_saves: AtomicBool::new(false),
            fail_settings_records: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn fail_key_saves(&self) {
        self.fail_key_saves.store(true, Ordering::SeqCst);
    }

    pub fn fail_tx_saves(&self) {
        self.fail_tx_saves.store(true, Ordering::SeqCst);
    }

    pub fn fail_settings(&self) {
        self.fail_settings_records.store(true, Ordering::SeqCst);
    }

    pub fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }

    pub fn seed_key(&self, account: Account) {
        self.keys.lock().push(account);
    }

    pub fn seed_transaction(&self, transaction: Transaction) {
        self.transactions.lock().push(transaction);
    }

    pub fn seed_settings(&self, settings: Settings) {
        *self.settings.lock() = Some(settings);
    }

    pub fn seed_selected(&self, address: &str) {
        *self.selected.lock() = Some(address.to_string());
    }

    pub fn selected(&self) -> Option<String> {
        self.selected.lock().clone()
    }

    pub fn stored_transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_keys(&self) -> Result<Vec<Account>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(WalletError::storage("key records unavailable"));
        }
        Ok(self.keys.lock().clone())
    }

    async fn save_key(&self, account: &Account) -> Result<()> {
        if self.fail_key_saves.load(Ordering::SeqCst) {
            return Err(WalletError::storage("key write rejected"));
        }
        let mut keys = self.keys.lock();
        keys.retain(|a| a.address != account.address);
        keys.push(account.clone());
        Ok(())
    }

    async fn remove_key(&self, address: &str) -> Result<()> {
        self.keys.lock().retain(|a| a.address != address);
        Ok(())
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(WalletError::storage("transaction records unavailable"));
        }
        Ok(self.transactions.lock().clone())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        if self.fail_tx_saves.load(Ordering::SeqCst) {
            return Err(WalletError::storage("transaction write rejected"));
        }
        let mut transactions = self.transactions.lock();
        transactions.retain(|t| t.id != transaction.id);
        transactions.push(transaction.clone());
        Ok(())
    }

    async fn save_transactions(&self, all: &[Transaction]) -> Result<()> {
        if self.fail_tx_saves.load(Ordering::SeqCst) {
            return Err(WalletError::storage("transaction write rejected"));
        }
        *self.transactions.lock() = all.to_vec();
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<Settings>> {
        if self.fail_settings_records.load(Ordering::SeqCst) || self.fail_loads.load(Ordering::SeqCst)
        {
            return Err(WalletError::storage("settings record unavailable"));
        }
        Ok(self.settings.lock().clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        if self.fail_settings_records.load(Ordering::SeqCst) {
            return Err(WalletError::storage("settings write rejected"));
        }
        *self.settings.lock() = Some(settings.clone());
        Ok(())
    }

    async fn get_selected_key(&self) -> Result<Option<String>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(WalletError::storage("selected key unavailable"));
        }
        Ok(self.selected.lock().clone())
    }

    async fn set_selected_key(&self, address: Option<&str>) -> Result<()> {
        *self.selected.lock() = address.map(str::to_string);
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.keys.lock().clear();
        self.transactions.lock().clear();
        *self.settings.lock() = None;
        *self.selected.lock() = None;
        Ok(())
    }
}

/// Deterministic key service: no real cryptography, stable derivations.
pub(crate) struct StaticKeyService {
    counter: AtomicU64,
    fail_signing: AtomicBool,
}

impl StaticKeyService {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            fail_signing: AtomicBool::new(false),
        }
    }

    pub fn fail_signing(&self) {
        self.fail_signing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyService for StaticKeyService {
    async fn generate_keypair(&self) -> Result<KeyPair> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(KeyPair {
            public_key: format!("{:064x}", 2 * n + 2),
            private_key: format!("{:064x}", 2 * n + 1),
        })
    }

    fn create_keypair_from_private_key(&self, bytes: &[u8]) -> Result<KeyPair> {
        if bytes.len() != 32 {
            return Err(WalletError::crypto(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut reversed = bytes.to_vec();
        reversed.reverse();
        Ok(KeyPair {
            public_key: hex::encode(reversed),
            private_key: hex::encode(bytes),
        })
    }

    fn export_key(&self, account: &Account) -> Result<String> {
        account
            .private_key
            .clone()
            .ok_or_else(|| WalletError::crypto("No private key held"))
    }

    async fn sign(&self, request: &SigningRequest, key: &Account) -> Result<SignedCommand> {
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(WalletError::crypto("Signer unavailable"));
        }
        Ok(SignedCommand {
            hash: format!("hash-{}", request.id),
            cmd: serde_json::to_string(request)
                .map_err(|e| WalletError::crypto(format!("Encoding failed: {e}")))?,
            sigs: vec![format!("sig-{}", key.public_key)],
        })
    }
}

/// Result source fed a script of probe outcomes; defaults to pending once
/// the script runs dry.
pub(crate) struct ScriptedResultSource {
    outcomes: Mutex<VecDeque<Result<PollOutcome>>>,
    probes: AtomicU64,
}

impl ScriptedResultSource {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            probes: AtomicU64::new(0),
        }
    }

    pub fn push(&self, outcome: Result<PollOutcome>) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultSource for ScriptedResultSource {
    async fn wait_for_result(&self, _hash: &str) -> Result<PollOutcome> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PollOutcome::pending()))
    }
}

/// A fully wired coordinator over in-memory collaborators.
pub(crate) struct Fixture {
    pub coordinator: Arc<SessionCoordinator>,
    pub store: Arc<MemoryRecordStore>,
    pub keys: Arc<StaticKeyService>,
    pub source: Arc<ScriptedResultSource>,
    pub bus: SignalBus<OutboundSignal>,
    pub errors: Arc<ErrorHandler>,
}

impl Fixture {
    /// Wire a coordinator over the given store and run `initialize`.
    pub async fn start(config: SessionConfig, store: Arc<MemoryRecordStore>) -> Self {
        let keys = Arc::new(StaticKeyService::new());
        let source = Arc::new(ScriptedResultSource::new());
        let errors = Arc::new(ErrorHandler::new());
        let bus: SignalBus<OutboundSignal> = SignalBus::new();
        errors.set_sink({
            let bus = bus.clone();
            move |err| bus.emit(OutboundSignal::WalletError(err))
        });

        let coordinator = SessionCoordinator::new(
            config,
            store.clone() as Arc<dyn RecordStore>,
            keys.clone() as Arc<dyn KeyService>,
            source.clone() as Arc<dyn ResultSource>,
            bus.clone(),
            errors.clone(),
        );
        coordinator.initialize().await;

        Self {
            coordinator,
            store,
            keys,
            source,
            bus,
            errors,
        }
    }
}

pub(crate) async fn fixture() -> Fixture {
    Fixture::start(SessionConfig::default(), Arc::new(MemoryRecordStore::new())).await
}

pub(crate) async fn fixture_with(config: SessionConfig) -> Fixture {
    Fixture::start(config, Arc::new(MemoryRecordStore::new())).await
}

/// Build an account whose key material starts with the given hex tag.
pub(crate) fn test_account(tag: &str) -> Account {
    let mut public_key = tag.to_string();
    while public_key.len() < 64 {
        public_key.push('0');
    }
    Account {
        address: format!("k:{public_key}"),
        public_key,
        private_key: Some("ab".repeat(32)),
        name: tag.to_string(),
        chain_id: "0".to_string(),
        balance: 0.0,
    }
}
