// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `alarm-watcher` daemon.
//!
//! Reads its configuration from `$ALARM_STATUS_WATCHER_CONFIG_FILE_LOCATION/config.toml`
//! and polls until Ctrl-C or a fatal fetch error. A non-zero exit status is
//! left to the process supervisor to act upon.

use std::process::ExitCode;

use alarm_watcher::config::Config;
use alarm_watcher::notify::{EmailChannel, QueueChannel, SendmailChannel};
use alarm_watcher::poller::{PollLoop, PollSettings};
use alarm_watcher::protocol::{HttpConfig, MqttQueue, MqttQueueBuilder, SnapshotSource};
use alarm_watcher::store::{JsonFileStore, StateStore};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alarm_watcher=info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Alarm watcher stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> alarm_watcher::Result<()> {
    let config = Config::load()?;

    let mut http = HttpConfig::new(config.alarm_manager.host.clone())
        .with_port(config.alarm_manager.port)
        .with_timeout(config.request_timeout);
    if config.alarm_manager.https {
        http = http.with_https();
    }
    let client = http.into_client()?;
    let store = JsonFileStore::open(&config.state_path).await?;

    tracing::info!(
        alarm_manager = %client.base_url(),
        state = %store.path().display(),
        "Alarm watcher starting"
    );

    let email = config.mail.as_ref().map(|mail| {
        SendmailChannel::new(mail.sender(), mail.destination.clone()).with_program(&mail.sendmail)
    });
    let queue = match &config.queue {
        Some(queue) => Some(connect_queue(queue).await?),
        None => None,
    };

    let poller = PollLoop::new(client, store, config.poll_settings());
    let result = match (email, queue.clone()) {
        (Some(email), Some(queue)) => drive(poller.with_email(email).with_queue(queue)).await,
        (Some(email), None) => drive(poller.with_email(email)).await,
        (None, Some(queue)) => drive(poller.with_queue(queue)).await,
        (None, None) => {
            tracing::warn!("No notification channel enabled, only tracking state");
            drive(poller).await
        }
    };

    if let Some(queue) = queue
        && let Err(e) = queue.disconnect().await
    {
        tracing::warn!(error = %e, "MQTT queue did not shut down cleanly");
    }

    result
}

async fn connect_queue(
    queue: &alarm_watcher::config::QueueConfig,
) -> alarm_watcher::Result<MqttQueue> {
    let mut builder = MqttQueueBuilder::new()
        .broker(queue.broker.clone())
        .topic(queue.topic.clone())
        .timeout(queue.timeout);
    if let Some((user, password)) = &queue.credentials {
        builder = builder.credentials(user.clone(), password.clone());
    }
    Ok(builder.build().await?)
}

async fn drive<F, S, E, Q>(poller: PollLoop<F, S, E, Q>) -> alarm_watcher::Result<()>
where
    F: SnapshotSource,
    S: StateStore,
    E: EmailChannel,
    Q: QueueChannel,
{
    let settings: &PollSettings = poller.settings();
    tracing::debug!(?settings, "Poll settings");

    poller
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Cannot listen for Ctrl-C, running until failure");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await
}
