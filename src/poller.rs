// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed-interval poll loop.
//!
//! Each tick runs fetch, diff, persist and notify, strictly in that order
//! and one device at a time. Ticks never overlap: the next fetch starts only
//! after every dispatch of the previous tick has been attempted.
//!
//! Failure handling per tick:
//!
//! - a fetch failure ends the loop with [`Error::Fetch`]
//! - a store failure skips the remaining steps for that device only
//! - a delivery failure is logged and does not affect other channels or devices

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::error::{DeliveryError, Error, FetchError};
use crate::notify::{
    Channel, DEFAULT_SUBJECT, EmailChannel, NoChannel, NotifyPolicy, QueueChannel, format_message,
    should_notify,
};
use crate::protocol::SnapshotSource;
use crate::state::{DeviceState, diff};
use crate::store::StateStore;

/// Tuning for a [`PollLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Time between tick starts.
    pub interval: Duration,
    /// Which changes are dispatched.
    pub policy: NotifyPolicy,
    /// Subject line for email notifications.
    pub subject: String,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: NotifyPolicy::default(),
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

/// Counters describing one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Devices present in the snapshot.
    pub devices: usize,
    /// Devices whose change report was non-empty.
    pub changed: usize,
    /// Devices skipped because the store failed.
    pub persist_failures: usize,
    /// Messages successfully handed to a channel.
    pub notifications_sent: usize,
    /// Messages a channel failed to deliver.
    pub delivery_failures: usize,
}

/// Drives snapshot polling, change detection and notification dispatch.
///
/// Channels are optional: a loop built with [`PollLoop::new`] only tracks
/// state. Attach channels with [`with_email`](Self::with_email) and
/// [`with_queue`](Self::with_queue).
///
/// # Examples
///
/// ```ignore
/// use alarm_watcher::poller::{PollLoop, PollSettings};
///
/// let poller = PollLoop::new(api_client, store, PollSettings::default())
///     .with_queue(mqtt_queue);
/// poller.run_until(tokio::signal::ctrl_c()).await?;
/// ```
#[derive(Debug)]
pub struct PollLoop<F, S, E = NoChannel, Q = NoChannel> {
    source: F,
    store: S,
    email: Option<E>,
    queue: Option<Q>,
    settings: PollSettings,
}

impl<F, S> PollLoop<F, S>
where
    F: SnapshotSource,
    S: StateStore,
{
    /// Creates a loop with no notification channels.
    #[must_use]
    pub fn new(source: F, store: S, settings: PollSettings) -> Self {
        Self {
            source,
            store,
            email: None,
            queue: None,
            settings,
        }
    }
}

impl<F, S, E, Q> PollLoop<F, S, E, Q>
where
    F: SnapshotSource,
    S: StateStore,
    E: EmailChannel,
    Q: QueueChannel,
{
    /// Enables the email channel.
    #[must_use]
    pub fn with_email<E2: EmailChannel>(self, email: E2) -> PollLoop<F, S, E2, Q> {
        PollLoop {
            source: self.source,
            store: self.store,
            email: Some(email),
            queue: self.queue,
            settings: self.settings,
        }
    }

    /// Enables the queue channel.
    #[must_use]
    pub fn with_queue<Q2: QueueChannel>(self, queue: Q2) -> PollLoop<F, S, E, Q2> {
        PollLoop {
            source: self.source,
            store: self.store,
            email: self.email,
            queue: Some(queue),
            settings: self.settings,
        }
    }

    /// Returns the loop settings.
    #[must_use]
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Returns the state store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs ticks until a fetch fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] with the first fetch failure.
    pub async fn run(&self) -> Result<(), Error> {
        self.run_until(std::future::pending()).await
    }

    /// Runs ticks until `shutdown` resolves or a fetch fails.
    ///
    /// A tick in progress is always finished before shutdown is honoured.
    /// Late ticks are delayed rather than bunched together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] with the first fetch failure.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        // interval() panics on a zero period
        let period = self.settings.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = period.as_secs_f64(),
            email = self.email.is_some(),
            queue = self.queue.is_some(),
            "Poll loop started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Poll loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(summary) => {
                    tracing::debug!(?summary, "Tick complete");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fetching device snapshot failed");
                    return Err(e.into());
                }
            }
        }
    }

    /// Runs exactly one tick.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the snapshot could not be retrieved. Nothing
    /// is persisted or dispatched in that case.
    pub async fn tick(&self) -> Result<TickSummary, FetchError> {
        tracing::debug!("Checking alarm manager status");

        let snapshot = self.source.fetch_snapshot().await?;
        let mut summary = TickSummary {
            devices: snapshot.len(),
            ..TickSummary::default()
        };

        for (device_id, current) in snapshot.into_devices() {
            self.process_device(&device_id, current, &mut summary).await;
        }

        Ok(summary)
    }

    async fn process_device(
        &self,
        device_id: &str,
        current: DeviceState,
        summary: &mut TickSummary,
    ) {
        let stored = match self.store.get_or_bootstrap(device_id).await {
            Ok((stored, found)) => {
                if !found {
                    tracing::debug!(device = %device_id, "First observation of device");
                }
                stored
            }
            Err(e) => {
                tracing::warn!(
                    device = %device_id,
                    error = %e,
                    "Reading stored state failed, skipping device"
                );
                summary.persist_failures += 1;
                return;
            }
        };

        let (updated, report) = diff(current, &stored);

        if let Err(e) = self.store.set(device_id, &updated).await {
            tracing::warn!(
                device = %device_id,
                error = %e,
                "Persisting state failed, skipping device"
            );
            summary.persist_failures += 1;
            return;
        }

        if report.is_empty() {
            return;
        }

        summary.changed += 1;
        tracing::info!(
            device = %device_id,
            name = %updated.name(),
            change = %report.description(),
            "Device state changed"
        );

        if !should_notify(&report, self.settings.policy) {
            return;
        }

        let message = format_message(updated.name(), &report);

        if let Some(email) = &self.email {
            let result = email.send(&self.settings.subject, &message).await;
            Self::record_delivery(Channel::Email, device_id, result, summary);
        }

        if let Some(queue) = &self.queue {
            let result = queue.publish(&message).await;
            Self::record_delivery(Channel::Queue, device_id, result, summary);
        }
    }

    fn record_delivery(
        channel: Channel,
        device_id: &str,
        result: Result<(), DeliveryError>,
        summary: &mut TickSummary,
    ) {
        match result {
            Ok(()) => {
                tracing::info!(%channel, device = %device_id, "Notification sent");
                summary.notifications_sent += 1;
            }
            Err(e) => {
                tracing::warn!(
                    %channel,
                    device = %device_id,
                    error = %e,
                    "Notification delivery failed"
                );
                summary.delivery_failures += 1;
            }
        }
    }
}
