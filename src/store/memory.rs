// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory state store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::StateStore;
use crate::error::StoreError;
use crate::state::DeviceState;

/// Volatile [`StateStore`] backed by a shared map.
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the poll loop persisted.
///
/// # Examples
///
/// ```
/// use alarm_watcher::state::DeviceState;
/// use alarm_watcher::store::{MemoryStore, StateStore};
///
/// # async fn example() -> Result<(), alarm_watcher::error::StoreError> {
/// let store = MemoryStore::new();
/// store.set("ab123", &DeviceState::new("ab123", "Home", "armed")).await?;
/// assert_eq!(store.get("ab123").await?.unwrap().mode(), "armed");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, DeviceState>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `states`, keyed by their ids.
    #[must_use]
    pub fn with_states(states: impl IntoIterator<Item = DeviceState>) -> Self {
        let entries = states
            .into_iter()
            .map(|state| (state.id().to_string(), state))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Returns the number of persisted devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing has been persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a copy of the persisted state without going through the trait.
    #[must_use]
    pub fn snapshot(&self, device_id: &str) -> Option<DeviceState> {
        self.entries.read().get(device_id).cloned()
    }
}

impl StateStore for MemoryStore {
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError> {
        Ok(self.snapshot(device_id))
    }

    async fn set(&self, device_id: &str, state: &DeviceState) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(device_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_device_is_absent() {
        let store = MemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_or_bootstrap_substitutes_placeholder() {
        let store = MemoryStore::new();
        let (state, found) = store.get_or_bootstrap("ab123").await.unwrap();
        assert!(!found);
        assert_eq!(state, DeviceState::bootstrap("ab123"));
    }

    #[tokio::test]
    async fn set_overwrites_previous_entry() {
        let store = MemoryStore::new();
        store
            .set("ab123", &DeviceState::new("ab123", "Home", "armed"))
            .await
            .unwrap();
        store
            .set("ab123", &DeviceState::new("ab123", "Home", "disarmed"))
            .await
            .unwrap();

        let (state, found) = store.get_or_bootstrap("ab123").await.unwrap();
        assert!(found);
        assert_eq!(state.mode(), "disarmed");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = MemoryStore::with_states([DeviceState::new("a", "A", "armed")]);
        let handle = store.clone();
        store
            .set("b", &DeviceState::new("b", "B", "armed"))
            .await
            .unwrap();
        assert_eq!(handle.len(), 2);
        assert!(handle.snapshot("b").is_some());
    }
}
