// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the alarm watcher.
//!
//! Errors are split by the collaborator that produced them, which also
//! decides how the poll loop reacts:
//!
//! - [`FetchError`]: the snapshot could not be retrieved. Fatal, ends the loop.
//! - [`StoreError`]: persisting one device failed. That device is skipped.
//! - [`DeliveryError`]: one notification channel failed. Logged only.
//! - [`ConfigError`]: the configuration file is missing or invalid.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Snapshot retrieval from the alarm manager failed.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Reading or writing persisted device state failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A notification channel failed to deliver a message.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while fetching a device snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The response body was not the expected JSON document.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API reported `success: false`.
    #[error("request rejected by alarm manager: {0}")]
    Rejected(String),
}

/// Errors raised by a state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the write.
    #[error("write rejected for {device}: {reason}")]
    Rejected {
        /// Device whose write failed.
        device: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Errors raised by notification channels.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Spawning or talking to the mail transfer agent failed.
    #[error("mail transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The mail transfer agent exited unsuccessfully.
    #[error("sendmail exited with {0}")]
    MailerExit(String),

    /// MQTT client error.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Delivery did not complete in time.
    #[error("delivery timed out after {0} ms")]
    Timeout(u64),

    /// The message broker is not reachable right now.
    #[error("not connected to message broker")]
    NotConnected,

    /// The channel rejected the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config location environment variable is not set.
    #[error("Environment variable {0} is not defined.")]
    MissingEnv(&'static str),

    /// The config file could not be read.
    #[error("Fatal error reading config file: {0}")]
    Read(#[from] std::io::Error),

    /// The config file is not valid TOML.
    #[error("Fatal error parsing config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required top-level section is absent.
    #[error("Fatal error config: no {0} field was found.")]
    MissingSection(&'static str),

    /// A required key is absent from a section.
    #[error("Fatal error config: no {section} {key} was defined.")]
    MissingKey {
        /// Section name.
        section: &'static str,
        /// Key name.
        key: &'static str,
    },

    /// A channel is enabled but its section is absent.
    #[error("Fatal error config: {0} config section is required.")]
    MissingChannelSection(&'static str),

    /// A value is present but unusable.
    #[error("Fatal error config: invalid {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
