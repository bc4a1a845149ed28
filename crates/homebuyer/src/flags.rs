//! Per-user feature flag overrides.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    /// What-if improvement scenarios alongside the affordability result.
    Scenarios,
}

impl FeatureFlag {
    pub fn key(&self) -> &'static str {
        match self {
            FeatureFlag::Scenarios => "scenarios",
        }
    }

    pub fn default_enabled(&self) -> bool {
        match self {
            FeatureFlag::Scenarios => true,
        }
    }
}

/// Persistence for a user's overrides. Flags without an override use their
/// default.
pub trait FeatureFlagStore: Send + Sync {
    fn overrides(&self, user_id: &str) -> BTreeMap<FeatureFlag, bool>;
    fn set_override(&self, user_id: &str, flag: FeatureFlag, enabled: bool);
}

pub fn is_enabled(store: &dyn FeatureFlagStore, user_id: Option<&str>, flag: FeatureFlag) -> bool {
    user_id
        .and_then(|user| store.overrides(user).get(&flag).copied())
        .unwrap_or_else(|| flag.default_enabled())
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryFeatureFlags {
    overrides: Arc<Mutex<HashMap<String, BTreeMap<FeatureFlag, bool>>>>,
}

impl FeatureFlagStore for InMemoryFeatureFlags {
    fn overrides(&self, user_id: &str) -> BTreeMap<FeatureFlag, bool> {
        let guard = self.overrides.lock().expect("flag mutex poisoned");
        guard.get(user_id).cloned().unwrap_or_default()
    }

    fn set_override(&self, user_id: &str, flag: FeatureFlag, enabled: bool) {
        let mut guard = self.overrides.lock().expect("flag mutex poisoned");
        guard
            .entry(user_id.to_string())
            .or_default()
            .insert(flag, enabled);
    }
}
