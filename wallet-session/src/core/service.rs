//! # Service Traits
//!
//! Capability traits for the coordinator's external collaborators, enabling
//! dependency injection and mocking in tests.
//!
//! The coordinator has no opinion on how records are encoded, where keys come
//! from, or how transaction results are fetched; it only consumes these
//! contracts. All operations are asynchronous and fallible; a failure must
//! surface as a [`WalletError`], never as silent data loss.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::session::state::{Account, Settings, SigningRequest, Transaction};

/// Persistence contract consumed by the coordinator.
///
/// Four independent record types: keys, transactions, settings, and the
/// selected key. "Last write wins" semantics are delegated to the store
/// itself; the coordinator uses no explicit transactions or locks on it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_keys(&self) -> Result<Vec<Account>>;
    async fn save_key(&self, account: &Account) -> Result<()>;
    async fn remove_key(&self, address: &str) -> Result<()>;

    async fn get_transactions(&self) -> Result<Vec<Transaction>>;
    async fn save_transaction(&self, transaction: &Transaction) -> Result<()>;
    async fn save_transactions(&self, all: &[Transaction]) -> Result<()>;

    async fn get_settings(&self) -> Result<Option<Settings>>;
    async fn save_settings(&self, settings: &Settings) -> Result<()>;

    async fn get_selected_key(&self) -> Result<Option<String>>;
    async fn set_selected_key(&self, address: Option<&str>) -> Result<()>;

    /// Wipe every record type.
    async fn clear_all_data(&self) -> Result<()>;
}

/// A freshly generated or reconstructed key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Hex-encoded public key.
    pub public_key: String,
    /// Hex-encoded private key.
    pub private_key: String,
}

/// A finalized, signed command ready for submission.
///
/// `hash` is the polling key used against the [`ResultSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCommand {
    pub hash: String,
    pub cmd: String,
    pub sigs: Vec<String>,
}

/// Signing and key-generation collaborator.
///
/// Cryptographic primitives live entirely behind this trait.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Generate a fresh random key pair.
    async fn generate_keypair(&self) -> Result<KeyPair>;

    /// Reconstruct a key pair from raw private key bytes.
    fn create_keypair_from_private_key(&self, bytes: &[u8]) -> Result<KeyPair>;

    /// Export the private key of an account as a hex string.
    fn export_key(&self, account: &Account) -> Result<String>;

    /// Sign a request with the given account's key.
    async fn sign(&self, request: &SigningRequest, key: &Account) -> Result<SignedCommand>;
}

/// Status reported by one probe of the external result source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No result yet; keep polling.
    Pending,
    /// Transaction succeeded on chain.
    Success,
    /// Transaction failed on chain.
    Failure,
}

/// Outcome of a single result probe.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub status: PollStatus,
    pub data: Option<serde_json::Value>,
}

impl PollOutcome {
    pub fn pending() -> Self {
        Self {
            status: PollStatus::Pending,
            data: None,
        }
    }
}

/// Transaction-result collaborator: submit a hash, poll for its result.
///
/// One call performs one probe; the transaction manager owns the cadence and
/// the overall deadline.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn wait_for_result(&self, hash: &str) -> Result<PollOutcome>;
}
