//! # Settings Registry
//!
//! Loads, validates, and persists user preferences through the record store.
//!
//! Missing or unreadable settings degrade to defaults: a fresh session must
//! never fail to start over a preferences record. Change notification is the
//! coordinator's job (it emits `settings-changed` after a successful persist).

use std::sync::Arc;

use crate::core::error::Result;
use crate::core::service::RecordStore;
use crate::session::state::Settings;

pub struct SettingsRegistry {
    store: Arc<dyn RecordStore>,
}

impl SettingsRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load persisted settings, falling back to defaults when absent.
    pub async fn load(&self) -> Result<Settings> {
        match self.store.get_settings().await? {
            Some(settings) => Ok(settings),
            None => {
                tracing::info!("No stored settings, using defaults");
                Ok(Settings::default())
            }
        }
    }

    /// Structural validation hook. All boolean preferences are acceptable
    /// today; unknown flags are preserved as-is.
    pub fn validate(&self, _settings: &Settings) -> Result<()> {
        Ok(())
    }

    /// Persist settings.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        self.store.save_settings(settings).await?;
        tracing::info!(
            auto_lock = settings.auto_lock,
            show_test_networks = settings.show_test_networks,
            "Settings saved"
        );
        Ok(())
    }
}
