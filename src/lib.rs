// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Alarm Watcher - polls an alarm manager and reports device changes.
//!
//! On a fixed interval the watcher fetches the state of every alarm device,
//! compares it with the last persisted state, stores the new observation and
//! notifies email and/or message queue channels about relevant changes.
//!
//! # Building Blocks
//!
//! - [`state`]: [`DeviceState`] and the [`diff`] engine producing [`ChangeReport`]s
//! - [`store`]: [`StateStore`] persistence of the last observation per device
//! - [`notify`]: the notification gate and channel traits
//! - [`protocol`]: HTTP snapshot client and MQTT queue publisher
//! - [`poller`]: the [`PollLoop`] tying everything together
//! - [`config`]: TOML configuration for the daemon
//!
//! # Quick Start
//!
//! ```
//! use alarm_watcher::notify::{NotifyPolicy, should_notify};
//! use alarm_watcher::state::{DeviceState, diff};
//!
//! let stored = DeviceState::new("ab123", "Test", "armed").with_online(true);
//! let current = stored.clone().with_firing(true);
//!
//! let (updated, report) = diff(current, &stored);
//! assert_eq!(report.description(), "Started Firing");
//! assert!(should_notify(&report, NotifyPolicy::new(false, true)));
//! assert!(updated.firing());
//! ```
//!
//! ## Running a Poll Loop
//!
//! ```no_run
//! use alarm_watcher::poller::{PollLoop, PollSettings};
//! use alarm_watcher::protocol::HttpConfig;
//! use alarm_watcher::store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> alarm_watcher::Result<()> {
//!     let client = HttpConfig::new("alarm.local").with_port(8080).into_client()?;
//!     let store = JsonFileStore::open("alarm-status.json").await?;
//!
//!     PollLoop::new(client, store, PollSettings::default())
//!         .run()
//!         .await
//! }
//! ```

pub mod config;
pub mod error;
pub mod notify;
pub mod poller;
pub mod protocol;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{ConfigError, DeliveryError, Error, FetchError, Result, StoreError};
pub use notify::{EmailChannel, NotifyPolicy, QueueChannel, should_notify};
pub use poller::{PollLoop, PollSettings, TickSummary};
pub use protocol::{Snapshot, SnapshotSource};
pub use state::{ChangeReport, DeviceState, diff};
pub use store::{JsonFileStore, MemoryStore, StateStore};
