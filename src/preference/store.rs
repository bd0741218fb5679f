//! Preference storage contract and in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use super::UserPreference;

/// Preference storage contract.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences for a user, if any.
    async fn preferences_for(&self, user_id: &str) -> Option<UserPreference>;
}

/// In-memory preference store.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    preferences: DashMap<String, UserPreference>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, preference: UserPreference) {
        self.preferences
            .insert(preference.user_id.clone(), preference);
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn preferences_for(&self, user_id: &str) -> Option<UserPreference> {
        self.preferences.get(user_id).map(|p| p.clone())
    }
}
