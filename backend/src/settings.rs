//! Per-user privacy toggles and proof validity window.

use crate::errors::EngineError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use zk_circuits::CircuitKind;

pub const MIN_VALIDITY_SECS: u64 = 60 * 60;
pub const MAX_VALIDITY_SECS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_VALIDITY_SECS: u64 = 7 * 24 * 60 * 60;

/// Missing fields take their default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    pub enable_whitelist: bool,
    pub enable_jurisdiction: bool,
    pub enable_accreditation: bool,
    pub enable_compliance: bool,
    pub validity_period_secs: u64,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            enable_whitelist: true,
            enable_jurisdiction: true,
            enable_accreditation: true,
            enable_compliance: true,
            validity_period_secs: DEFAULT_VALIDITY_SECS,
        }
    }
}

impl PrivacySettings {
    pub fn validate(self) -> Result<Self, EngineError> {
        if !(MIN_VALIDITY_SECS..=MAX_VALIDITY_SECS).contains(&self.validity_period_secs) {
            return Err(EngineError::SettingsOutOfRange {
                got: self.validity_period_secs,
                min: MIN_VALIDITY_SECS,
                max: MAX_VALIDITY_SECS,
            });
        }
        Ok(self)
    }

    pub fn is_enabled(&self, kind: CircuitKind) -> bool {
        match kind {
            CircuitKind::WhitelistMembership => self.enable_whitelist,
            CircuitKind::JurisdictionEligibility => self.enable_jurisdiction,
            CircuitKind::AccreditationThreshold => self.enable_accreditation,
            CircuitKind::ComplianceAggregation => self.enable_compliance,
        }
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    default: RwLock<PrivacySettings>,
    users: RwLock<HashMap<String, PrivacySettings>>,
}

impl SettingsStore {
    pub fn new(default: PrivacySettings) -> Result<Self, EngineError> {
        Ok(Self {
            default: RwLock::new(default.validate()?),
            users: RwLock::new(HashMap::new()),
        })
    }

    /// The user's settings, or the global default if they never set any.
    pub fn get(&self, user: &str) -> PrivacySettings {
        self.users.read().get(user).copied().unwrap_or_else(|| self.default_settings())
    }

    /// Replace the user's settings wholesale.
    pub fn set(&self, user: &str, settings: PrivacySettings) -> Result<(), EngineError> {
        let settings = settings.validate()?;
        self.users.write().insert(user.to_string(), settings);
        info!(user, validity_secs = settings.validity_period_secs, "privacy settings updated");
        Ok(())
    }

    pub fn has_explicit(&self, user: &str) -> bool {
        self.users.read().contains_key(user)
    }

    pub fn default_settings(&self) -> PrivacySettings {
        *self.default.read()
    }

    pub fn set_default(&self, settings: PrivacySettings) -> Result<(), EngineError> {
        *self.default.write() = settings.validate()?;
        info!(validity_secs = settings.validity_period_secs, "default privacy settings updated");
        Ok(())
    }

    pub fn is_feature_enabled(&self, user: &str, kind: CircuitKind) -> bool {
        self.get(user).is_enabled(kind)
    }

    /// Restore persisted per-user settings. Invalid rows are skipped.
    pub fn hydrate(&self, rows: impl IntoIterator<Item = (String, PrivacySettings)>) {
        let mut users = self.users.write();
        for (user, settings) in rows {
            if let Ok(settings) = settings.validate() {
                users.insert(user, settings);
            }
        }
    }
}
