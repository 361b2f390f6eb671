// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state and change detection.
//!
//! [`DeviceState`] is one observation of an alarm device. [`diff`] compares a
//! fresh observation with the persisted one and yields a [`ChangeReport`].
//!
//! # Examples
//!
//! ```
//! use alarm_watcher::state::{DeviceState, diff};
//!
//! let stored = DeviceState::new("ab123", "Test", "armed").with_online(true);
//! let current = stored.clone().with_online(false);
//!
//! let (_, report) = diff(current, &stored);
//! assert_eq!(report.description(), "Became Offline");
//! assert!(report.online_changed());
//! ```

mod change_report;
mod device_state;

pub use change_report::{ChangeReport, diff};
pub use device_state::{BOOTSTRAP_MODE, DeviceState};
