// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of the last observed state of each device.
//!
//! A [`StateStore`] maps a device id to the last [`DeviceState`] the poller
//! saw for it. Entries are overwritten on every observation and never
//! deleted. The store does not synchronize concurrent writers to the same
//! key; the poll loop guarantees a single writer.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: volatile, in-process map
//! - [`JsonFileStore`]: whole snapshot kept in a JSON file

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::state::DeviceState;

/// Key-value persistence for device states.
#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Returns the persisted state for `device_id`, or `None` if the device
    /// was never observed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError>;

    /// Replaces the persisted state for `device_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails. Callers get no retry.
    async fn set(&self, device_id: &str, state: &DeviceState) -> Result<(), StoreError>;

    /// Returns the persisted state, substituting the bootstrap placeholder
    /// when the device is unknown.
    ///
    /// The boolean is `true` when a persisted entry was found.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    async fn get_or_bootstrap(&self, device_id: &str) -> Result<(DeviceState, bool), StoreError> {
        Ok(match self.get(device_id).await? {
            Some(state) => (state, true),
            None => (DeviceState::bootstrap(device_id), false),
        })
    }
}
