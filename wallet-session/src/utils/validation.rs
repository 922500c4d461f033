/// Validation utilities for user input

use crate::core::error::{Result, WalletError};

pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
        }
    }

    /// Convert into a `Result`, raising a low-severity recoverable
    /// validation error on failure.
    pub fn require(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(WalletError::validation(
                self.error.unwrap_or_else(|| "Invalid input".to_string()),
            ))
        }
    }
}

/// Validate an account display name
pub fn validate_account_name(name: &str) -> ValidationResult {
    if name.trim().is_empty() {
        return ValidationResult::err("Account name is required");
    }

    if name.len() > 64 {
        return ValidationResult::err("Account name must be at most 64 characters");
    }

    ValidationResult::ok()
}

/// Validate an account address (single-key `k:` form or explicit alias)
pub fn validate_address(address: &str) -> ValidationResult {
    if address.is_empty() {
        return ValidationResult::err("Address is required");
    }

    if let Some(public_key) = address.strip_prefix("k:") {
        if public_key.len() != 64 || !public_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return ValidationResult::err("Single-key address must carry a 64-char hex public key");
        }
    }

    ValidationResult::ok()
}

/// Validate a transfer amount
pub fn validate_amount(amount: f64) -> ValidationResult {
    if !amount.is_finite() {
        return ValidationResult::err("Amount must be a finite number");
    }

    if amount < 0.0 {
        return ValidationResult::err("Amount must not be negative");
    }

    ValidationResult::ok()
}

/// Validate hex-encoded private key material (32 bytes)
pub fn validate_private_key_hex(key: &str) -> ValidationResult {
    let key = key.trim();
    if key.is_empty() {
        return ValidationResult::err("Private key is required");
    }

    if key.len() != 64 {
        return ValidationResult::err("Private key must be 64 hex characters");
    }

    if !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return ValidationResult::err("Private key must contain only hex characters");
    }

    ValidationResult::ok()
}
