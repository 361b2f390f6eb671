// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observed state of a single alarm device.

use serde::{Deserialize, Serialize};

/// Mode placeholder used for devices that have never been observed.
pub const BOOTSTRAP_MODE: &str = "Not Set";

/// One observation of an alarm device.
///
/// A `DeviceState` is a value: every poll produces fresh instances and the
/// last one seen for each device is what the [`StateStore`](crate::store::StateStore)
/// keeps. The `mode` vocabulary belongs to the alarm manager (`"armed"`,
/// `"disarmed"`, ...) and is only ever compared for equality.
///
/// # Examples
///
/// ```
/// use alarm_watcher::state::DeviceState;
///
/// let state = DeviceState::new("ab123", "Home Alarm", "armed").with_online(true);
/// assert_eq!(state.name(), "Home Alarm");
/// assert!(state.online());
/// assert!(!state.firing());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    id: String,
    name: String,
    mode: String,
    firing: bool,
    online: bool,
}

impl DeviceState {
    /// Creates a state with `firing` and `online` both false.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode: mode.into(),
            firing: false,
            online: false,
        }
    }

    /// Returns the placeholder state substituted for a device with no
    /// persisted entry.
    ///
    /// Name is empty, mode is [`BOOTSTRAP_MODE`], flags are false.
    ///
    /// ```
    /// use alarm_watcher::state::{BOOTSTRAP_MODE, DeviceState};
    ///
    /// let state = DeviceState::bootstrap("ab123");
    /// assert_eq!(state.name(), "");
    /// assert_eq!(state.mode(), BOOTSTRAP_MODE);
    /// assert!(state.is_bootstrap());
    /// ```
    #[must_use]
    pub fn bootstrap(id: impl Into<String>) -> Self {
        Self::new(id, "", BOOTSTRAP_MODE)
    }

    /// Sets the firing flag.
    #[must_use]
    pub fn with_firing(mut self, firing: bool) -> Self {
        self.firing = firing;
        self
    }

    /// Sets the online flag.
    #[must_use]
    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the device identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the alarm mode.
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Returns `true` if the alarm is currently firing.
    #[must_use]
    pub fn firing(&self) -> bool {
        self.firing
    }

    /// Returns `true` if the device is reachable by the alarm manager.
    #[must_use]
    pub fn online(&self) -> bool {
        self.online
    }

    /// Returns `true` if this equals the bootstrap placeholder for its id.
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        *self == Self::bootstrap(self.id.clone())
    }
}
