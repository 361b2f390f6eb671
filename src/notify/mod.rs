// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification gating and delivery channels.
//!
//! [`should_notify`] decides whether a [`ChangeReport`] is worth telling
//! anyone about. The same decision applies to every enabled channel; the
//! poll loop then formats one message with [`format_message`] and hands it
//! to each channel independently.
//!
//! # Channels
//!
//! - [`EmailChannel`]: `send(subject, body)`, implemented by [`SendmailChannel`]
//! - [`QueueChannel`]: `publish(body)`, implemented by the MQTT publisher in
//!   [`protocol`](crate::protocol) when the `mqtt` feature is enabled
//!
//! # Examples
//!
//! ```
//! use alarm_watcher::notify::{NotifyPolicy, should_notify};
//! use alarm_watcher::state::{DeviceState, diff};
//!
//! let stored = DeviceState::new("ab123", "Home", "armed").with_online(true);
//! let (_, report) = diff(stored.clone().with_online(false), &stored);
//!
//! assert!(should_notify(&report, NotifyPolicy::new(true, false)));
//! assert!(!should_notify(&report, NotifyPolicy::new(false, true)));
//! ```

mod email;

pub use email::SendmailChannel;

use std::fmt;

use crate::error::DeliveryError;
use crate::state::ChangeReport;

/// Subject line used for email notifications unless configured otherwise.
pub const DEFAULT_SUBJECT: &str = "Alarm Status Changed";

/// Which change categories produce a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyPolicy {
    /// Notify when a device goes online or offline.
    pub notify_offline: bool,
    /// Notify on mode changes and firing transitions.
    pub notify_status_change: bool,
}

impl NotifyPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(notify_offline: bool, notify_status_change: bool) -> Self {
        Self {
            notify_offline,
            notify_status_change,
        }
    }
}

/// Returns `true` if `report` should be dispatched under `policy`.
///
/// Name changes alone never notify: they appear in the description but are
/// not alarm events.
#[must_use]
pub fn should_notify(report: &ChangeReport, policy: NotifyPolicy) -> bool {
    !report.is_empty()
        && ((policy.notify_offline && report.online_changed())
            || (policy.notify_status_change && report.mode_changed()))
}

/// Formats the message body sent to every channel.
#[must_use]
pub fn format_message(device_name: &str, report: &ChangeReport) -> String {
    format!("{device_name} - {}", report.description())
}

/// A notification delivery mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Email delivery.
    Email,
    /// Message queue delivery.
    Queue,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Queue => f.write_str("queue"),
        }
    }
}

/// Email delivery collaborator.
#[allow(async_fn_in_trait)]
pub trait EmailChannel {
    /// Sends one email.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the message could not be handed off.
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Message queue delivery collaborator.
#[allow(async_fn_in_trait)]
pub trait QueueChannel {
    /// Publishes one message.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the message could not be published.
    async fn publish(&self, body: &str) -> Result<(), DeliveryError>;
}

/// Placeholder for a channel that is not configured.
///
/// The poll loop never calls it; it only fills the type parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannel;

impl EmailChannel for NoChannel {
    async fn send(&self, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

impl QueueChannel for NoChannel {
    async fn publish(&self, _body: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}
