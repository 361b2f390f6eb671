// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports to the outside world.
//!
//! - [`ApiClient`]: fetches device snapshots from the alarm manager over HTTP
//! - [`MqttQueue`]: publishes notification messages to an MQTT topic
//!
//! The poll loop only sees the [`SnapshotSource`] trait and the channel
//! traits in [`notify`](crate::notify), so tests substitute fakes freely.

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "http")]
pub use http::{ApiClient, HttpConfig};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttQueue, MqttQueueBuilder};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::state::DeviceState;

/// Every device known to the alarm manager at one point in time.
///
/// Devices are keyed and iterated by id in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    devices: BTreeMap<String, DeviceState>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn new(devices: impl IntoIterator<Item = DeviceState>) -> Self {
        Self::at(devices, Utc::now())
    }

    /// Creates a snapshot with an explicit timestamp.
    #[must_use]
    pub fn at(devices: impl IntoIterator<Item = DeviceState>, fetched_at: DateTime<Utc>) -> Self {
        let devices = devices
            .into_iter()
            .map(|state| (state.id().to_string(), state))
            .collect();
        Self {
            devices,
            fetched_at,
        }
    }

    /// Returns the devices keyed by id.
    #[must_use]
    pub fn devices(&self) -> &BTreeMap<String, DeviceState> {
        &self.devices
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if the alarm manager reported no devices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns when the snapshot was taken.
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Consumes the snapshot, yielding devices in id order.
    #[must_use]
    pub fn into_devices(self) -> BTreeMap<String, DeviceState> {
        self.devices
    }
}

/// Source of device snapshots.
#[allow(async_fn_in_trait)]
pub trait SnapshotSource {
    /// Fetches the current state of every device.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if any part of the snapshot cannot be retrieved.
    /// No partial snapshot is ever returned.
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}
