//! # Account Registry
//!
//! Generates, imports, validates, and persists wallet accounts.
//!
//! Key material never originates here: generation and reconstruction are
//! delegated to the [`KeyService`] collaborator, and persistence to the
//! [`RecordStore`]. The registry only enforces the account-level rules:
//! address derivation, input validation, and the persist-before-adopt
//! ordering the coordinator relies on.

use std::sync::Arc;

use crate::core::error::{Result, WalletError};
use crate::core::service::{KeyService, RecordStore, SignedCommand};
use crate::session::state::{Account, SigningRequest};
use crate::utils::validation::{validate_account_name, validate_address, validate_private_key_hex};

/// Account generation, import, and persistence.
pub struct AccountRegistry {
    store: Arc<dyn RecordStore>,
    keys: Arc<dyn KeyService>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn RecordStore>, keys: Arc<dyn KeyService>) -> Self {
        Self { store, keys }
    }

    /// Load all persisted accounts.
    pub async fn load(&self) -> Result<Vec<Account>> {
        self.store.get_keys().await
    }

    /// Generate a fresh account and persist it.
    ///
    /// The address derives from the generated public key via the `k:`
    /// convention.
    pub async fn generate(&self, name: &str, chain_id: &str) -> Result<Account> {
        validate_account_name(name).require()?;

        let pair = self.keys.generate_keypair().await?;
        let account = Account {
            address: Account::derive_address(&pair.public_key),
            public_key: pair.public_key,
            private_key: Some(pair.private_key),
            name: name.to_string(),
            chain_id: chain_id.to_string(),
            balance: 0.0,
        };

        self.store.save_key(&account).await?;
        tracing::info!(address = %account.address, "Generated account");
        Ok(account)
    }

    /// Import an account from a hex-encoded private key and persist it.
    ///
    /// `alias` overrides the derived address when given (watch names,
    /// vanity accounts). Bad key material surfaces as a recoverable
    /// `ImportFailed` so the caller can re-prompt.
    pub async fn import(
        &self,
        private_key_hex: &str,
        name: &str,
        chain_id: &str,
        alias: Option<&str>,
    ) -> Result<Account> {
        validate_account_name(name).require()?;
        validate_private_key_hex(private_key_hex)
            .require()
            .map_err(|e| WalletError::import_failed(e.message))?;

        let bytes = hex::decode(private_key_hex.trim())
            .map_err(|e| WalletError::import_failed(format!("Invalid hex: {e}")))?;
        let pair = self
            .keys
            .create_keypair_from_private_key(&bytes)
            .map_err(|e| WalletError::import_failed(e.message))?;

        let address = match alias {
            Some(alias) => {
                validate_address(alias).require()?;
                alias.to_string()
            }
            None => Account::derive_address(&pair.public_key),
        };

        let account = Account {
            address,
            public_key: pair.public_key,
            private_key: Some(pair.private_key),
            name: name.to_string(),
            chain_id: chain_id.to_string(),
            balance: 0.0,
        };

        self.store.save_key(&account).await?;
        tracing::info!(address = %account.address, "Imported account");
        Ok(account)
    }

    /// Export an account's private key as hex.
    ///
    /// Exposes the private key. Callers handle the result with care.
    pub fn export(&self, account: &Account) -> Result<String> {
        if account.private_key.is_none() {
            return Err(WalletError::export_failed(format!(
                "No private key held for {}",
                account.address
            )));
        }
        self.keys
            .export_key(account)
            .map_err(|e| WalletError::export_failed(e.message))
    }

    /// Persist an already-constructed account record.
    pub async fn persist(&self, account: &Account) -> Result<()> {
        validate_address(&account.address).require()?;
        self.store.save_key(account).await
    }

    /// Remove a persisted account by address.
    pub async fn remove(&self, address: &str) -> Result<()> {
        self.store.remove_key(address).await
    }

    /// Sign a request with the given account's key.
    pub async fn sign(&self, request: &SigningRequest, account: &Account) -> Result<SignedCommand> {
        if account.private_key.is_none() {
            return Err(WalletError::crypto(format!(
                "Account {} holds no signing key",
                account.address
            )));
        }
        self.keys.sign(request, account).await
    }
}
