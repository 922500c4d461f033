//! # Session Services
//!
//! The coordinator's sub-services:
//!
//! - **[`accounts`]**: account generation, import/export, persistence
//! - **[`settings`]**: preference load/validate/persist
//! - **[`transactions`]**: transaction lifecycle and result polling
//!
//! Services talk to the outside world exclusively through the capability
//! traits in [`crate::core::service`]; the coordinator composes them and owns
//! the in-memory state they feed.

pub mod accounts;
pub mod settings;
pub mod transactions;

pub use accounts::AccountRegistry;
pub use settings::SettingsRegistry;
pub use transactions::{TransactionDraft, TransactionManager};
