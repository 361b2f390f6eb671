// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change detection between two observations of a device.
//!
//! [`diff`] compares a fresh observation against the persisted one and
//! produces a [`ChangeReport`]: one human readable description plus a flag
//! per change category. Clauses always appear in the order name, mode,
//! firing, online, so the description text is stable across runs.
//!
//! # Examples
//!
//! ```
//! use alarm_watcher::state::{DeviceState, diff};
//!
//! let stored = DeviceState::new("ab123", "Test", "armed").with_online(true);
//! let current = stored.clone().with_firing(true);
//!
//! let (updated, report) = diff(current.clone(), &stored);
//! assert_eq!(updated, current);
//! assert_eq!(report.description(), "Started Firing");
//! assert!(report.mode_changed());
//! ```

use std::fmt::Write as _;

use super::device_state::DeviceState;

/// Outcome of comparing two observations of the same device.
///
/// `mode_changed` is also raised by firing transitions: both are alarm
/// events and share one notification category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    device_id: String,
    description: String,
    name_changed: bool,
    mode_changed: bool,
    firing_changed: bool,
    online_changed: bool,
}

impl ChangeReport {
    /// Returns the id of the device this report is about.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the space separated change clauses, empty when nothing changed.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns `true` if the description is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
    }

    /// Returns `true` if the display name changed.
    #[must_use]
    pub fn name_changed(&self) -> bool {
        self.name_changed
    }

    /// Returns `true` if the mode changed or the firing state toggled.
    #[must_use]
    pub fn mode_changed(&self) -> bool {
        self.mode_changed
    }

    /// Returns `true` if the firing state toggled.
    #[must_use]
    pub fn firing_changed(&self) -> bool {
        self.firing_changed
    }

    /// Returns `true` if the device went online or offline.
    #[must_use]
    pub fn online_changed(&self) -> bool {
        self.online_changed
    }
}

/// Returns `true` if a mode transition between the two observations should
/// be reported.
///
/// An empty mode on either side never counts. The stored side is also
/// skipped while it is still the bootstrap placeholder, so a first
/// observation is silent. A `"Not Set"` mode reported by the API itself is a
/// regular mode: `armed` to `Not Set` is a transition.
fn is_mode_transition(current: &DeviceState, stored: &DeviceState) -> bool {
    current.mode() != stored.mode()
        && !current.mode().is_empty()
        && !stored.mode().is_empty()
        && !stored.is_bootstrap()
}

/// Compares `current` against `stored` and returns the state to persist
/// along with the change report.
///
/// The state to persist is always `current` in full. A mode transition is
/// not reported when either mode is empty or when `stored` is still the
/// bootstrap placeholder.
#[must_use]
pub fn diff(current: DeviceState, stored: &DeviceState) -> (DeviceState, ChangeReport) {
    let mut report = ChangeReport {
        device_id: current.id().to_string(),
        ..ChangeReport::default()
    };
    let mut description = String::new();

    if current.name() != stored.name() {
        let _ = write!(description, "Changed Name to {} ", current.name());
        report.name_changed = true;
    }

    if is_mode_transition(&current, stored) {
        let _ = write!(
            description,
            "Changed Mode from {} to {} ",
            stored.mode(),
            current.mode()
        );
        report.mode_changed = true;
    }

    if current.firing() != stored.firing() {
        description.push_str(if current.firing() {
            "Started Firing "
        } else {
            "Stopped Firing "
        });
        report.firing_changed = true;
        report.mode_changed = true;
    }

    if current.online() != stored.online() {
        description.push_str(if current.online() {
            "Became Online "
        } else {
            "Became Offline "
        });
        report.online_changed = true;
    }

    report.description = description.trim().to_string();
    (current, report)
}
