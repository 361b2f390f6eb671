// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the alarm manager API.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::protocol::{Snapshot, SnapshotSource};
use crate::state::DeviceState;

// ============================================================================
// HttpConfig - Connection parameters for the alarm manager
// ============================================================================

/// Connection parameters for the alarm manager API.
///
/// # Examples
///
/// ```
/// use alarm_watcher::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("alarm.local")
///     .with_port(8080)
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.base_url(), "http://alarm.local:8080");
///
/// // A full URL is used verbatim
/// let config = HttpConfig::new("http://127.0.0.1:9000/");
/// assert_eq!(config.base_url(), "http://127.0.0.1:9000");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    host: String,
    port: u16,
    use_https: bool,
    timeout: Duration,
}

impl HttpConfig {
    /// Default HTTP port.
    pub const DEFAULT_PORT: u16 = 80;
    /// Default HTTPS port.
    pub const DEFAULT_HTTPS_PORT: u16 = 443;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for `host`, which may also be a full base URL.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            use_https: false,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables HTTPS.
    ///
    /// If port hasn't been explicitly set, it will be changed to 443.
    #[must_use]
    pub fn with_https(mut self) -> Self {
        self.use_https = true;
        if self.port == Self::DEFAULT_PORT {
            self.port = Self::DEFAULT_HTTPS_PORT;
        }
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the base URL from this configuration.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            return self.host.trim_end_matches('/').to_string();
        }

        let scheme = if self.use_https { "https" } else { "http" };
        let port_suffix =
            if (self.use_https && self.port == 443) || (!self.use_https && self.port == 80) {
                String::new()
            } else {
                format!(":{}", self.port)
            };
        format!("{scheme}://{}{port_suffix}", self.host)
    }

    /// Creates an [`ApiClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<ApiClient, FetchError> {
        ApiClient::new(&self)
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// Body of `GET /devices`.
#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    success: bool,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

/// Body of `GET /devices/status/<id>`.
#[derive(Debug, Deserialize)]
struct DeviceStatusResponse {
    success: bool,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    firing: bool,
    #[serde(default)]
    online: bool,
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client fetching device snapshots from the alarm manager.
///
/// A snapshot takes one request listing devices (`/devices`, id to name)
/// followed by one status request per device (`/devices/status/<id>`).
/// Any failure along the way fails the whole snapshot.
///
/// # Examples
///
/// ```no_run
/// use alarm_watcher::protocol::{HttpConfig, SnapshotSource};
///
/// # async fn example() -> Result<(), alarm_watcher::error::FetchError> {
/// let client = HttpConfig::new("alarm.local").with_port(8080).into_client()?;
/// let snapshot = client.fetch_snapshot().await?;
/// for (id, state) in snapshot.devices() {
///     println!("{id}: {} is {}", state.name(), state.mode());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Creates a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(FetchError::Http)?;

        Ok(Self {
            base_url: config.base_url(),
            client,
        })
    }

    /// Returns the base URL of the alarm manager.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn devices_url(&self) -> String {
        format!("{}/devices", self.base_url)
    }

    fn status_url(&self, device_id: &str) -> String {
        format!(
            "{}/devices/status/{}",
            self.base_url,
            urlencoding::encode(device_id)
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tracing::debug!(url = %url, "Requesting alarm manager");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Http)?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await.map_err(FetchError::Http)?;

        tracing::trace!(body = %body, "Received alarm manager response");

        serde_json::from_str(&body).map_err(Into::into)
    }

    async fn fetch_device(&self, device_id: &str, name: &str) -> Result<DeviceState, FetchError> {
        let status: DeviceStatusResponse = self.get_json(&self.status_url(device_id)).await?;

        if !status.success {
            return Err(FetchError::Rejected(status.msg));
        }

        Ok(DeviceState::new(device_id, name, status.mode)
            .with_firing(status.firing)
            .with_online(status.online))
    }
}

impl SnapshotSource for ApiClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let list: DeviceListResponse = self.get_json(&self.devices_url()).await?;

        if !list.success {
            return Err(FetchError::Rejected(list.msg));
        }

        let mut ids: Vec<(String, String)> = list.data.into_iter().collect();
        ids.sort_unstable();

        let mut devices = Vec::with_capacity(ids.len());
        for (device_id, name) in &ids {
            devices.push(self.fetch_device(device_id, name).await?);
        }

        tracing::debug!(devices = devices.len(), "Fetched device snapshot");

        Ok(Snapshot::new(devices))
    }
}
