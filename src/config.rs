// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Daemon configuration.
//!
//! The configuration is a `config.toml` file inside the directory named by
//! [`CONFIG_LOCATION_ENV`]:
//!
//! ```toml
//! [alarmmanager]
//! host = "alarm.local"
//! port = 8080
//! https = false
//!
//! [notify]
//! online = true
//! statuschange = true
//! mail = true
//! queue = false
//!
//! [mail]
//! mailfrom = "alarm"
//! maildomain = "example.com"
//! destination = "ops@example.com"
//!
//! [storage]
//! path = "/var/lib/alarm-watcher/state.json"
//!
//! [poll]
//! interval_seconds = 1
//! ```
//!
//! `[mail]` is only required when `notify.mail` is set, `[queue]` only when
//! `notify.queue` is set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::notify::{DEFAULT_SUBJECT, NotifyPolicy, SendmailChannel};
use crate::poller::PollSettings;

/// Environment variable naming the directory that holds `config.toml`.
pub const CONFIG_LOCATION_ENV: &str = "ALARM_STATUS_WATCHER_CONFIG_FILE_LOCATION";

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Alarm manager API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmManagerConfig {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Talk HTTPS instead of plain HTTP.
    pub https: bool,
}

/// What to notify and through which channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Notify on online/offline transitions.
    pub online: bool,
    /// Notify on mode and firing transitions.
    pub status_change: bool,
    /// Deliver through email.
    pub mail: bool,
    /// Deliver through the message queue.
    pub queue: bool,
}

/// Email channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    /// Local part of the sender address.
    pub mail_from: String,
    /// Domain of the sender address.
    pub mail_domain: String,
    /// Recipient address.
    pub destination: String,
    /// MTA binary.
    pub sendmail: PathBuf,
    /// Subject line.
    pub subject: String,
}

impl MailConfig {
    /// Returns the full sender address.
    #[must_use]
    pub fn sender(&self) -> String {
        format!("{}@{}", self.mail_from, self.mail_domain)
    }
}

/// Queue channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// MQTT broker URL.
    pub broker: String,
    /// Topic notifications are published to.
    pub topic: String,
    /// Optional username and password.
    pub credentials: Option<(String, String)>,
    /// How long a publish waits for the broker acknowledgement.
    pub timeout: Duration,
}

/// Fully validated daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Alarm manager endpoint.
    pub alarm_manager: AlarmManagerConfig,
    /// Notification policy and channel switches.
    pub notify: NotifyConfig,
    /// Present iff `notify.mail` is set.
    pub mail: Option<MailConfig>,
    /// Present iff `notify.queue` is set.
    pub queue: Option<QueueConfig>,
    /// Path of the JSON state file.
    pub state_path: PathBuf,
    /// Time between polls.
    pub poll_interval: Duration,
    /// Timeout for each alarm manager request.
    pub request_timeout: Duration,
}

// ============================================================================
// Raw file layout
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    alarmmanager: Option<RawAlarmManager>,
    notify: Option<RawNotify>,
    mail: Option<RawMail>,
    queue: Option<RawQueue>,
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    poll: RawPoll,
}

#[derive(Debug, Deserialize)]
struct RawAlarmManager {
    host: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    https: bool,
}

#[derive(Debug, Deserialize)]
struct RawNotify {
    online: Option<bool>,
    statuschange: Option<bool>,
    queue: Option<bool>,
    mail: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawMail {
    mailfrom: Option<String>,
    maildomain: Option<String>,
    destination: Option<String>,
    sendmail: Option<PathBuf>,
    subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQueue {
    broker: Option<String>,
    topic: Option<String>,
    user: Option<String>,
    password: Option<String>,
    #[serde(default = "default_queue_timeout_seconds")]
    timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    #[serde(default = "default_state_path")]
    path: PathBuf,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("alarm-status.json")
}

#[derive(Debug, Deserialize)]
struct RawPoll {
    #[serde(default = "default_interval_seconds")]
    interval_seconds: u64,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawPoll {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    1
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_queue_timeout_seconds() -> u64 {
    10
}

fn require<T>(
    value: Option<T>,
    section: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingKey { section, key })
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Loads `config.toml` from the directory named by [`CONFIG_LOCATION_ENV`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the variable is unset, the file cannot be
    /// read, or its contents are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let location = std::env::var_os(CONFIG_LOCATION_ENV)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingEnv(CONFIG_LOCATION_ENV))?;
        Self::load_from_dir(Path::new(&location))
    }

    /// Loads `config.toml` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first missing section or key.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;

        let alarm_manager = raw
            .alarmmanager
            .ok_or(ConfigError::MissingSection("alarmmanager"))?;
        let notify = raw.notify.ok_or(ConfigError::MissingSection("notify"))?;

        let alarm_manager = AlarmManagerConfig {
            port: require(alarm_manager.port, "alarmmanager", "port")?,
            host: require(alarm_manager.host, "alarmmanager", "host")?,
            https: alarm_manager.https,
        };

        let notify = NotifyConfig {
            online: require(notify.online, "notify", "online")?,
            status_change: require(notify.statuschange, "notify", "statuschange")?,
            queue: require(notify.queue, "notify", "queue")?,
            mail: require(notify.mail, "notify", "mail")?,
        };

        let mail = if notify.mail {
            let mail = raw.mail.ok_or(ConfigError::MissingChannelSection("mail"))?;
            Some(MailConfig {
                mail_from: require(mail.mailfrom, "mail", "mailfrom")?,
                mail_domain: require(mail.maildomain, "mail", "maildomain")?,
                destination: require(mail.destination, "mail", "destination")?,
                sendmail: mail
                    .sendmail
                    .unwrap_or_else(|| PathBuf::from(SendmailChannel::DEFAULT_PROGRAM)),
                subject: mail.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            })
        } else {
            None
        };

        let queue = if notify.queue {
            let queue = raw.queue.ok_or(ConfigError::MissingChannelSection("queue"))?;
            let credentials = match (queue.user, queue.password) {
                (Some(user), Some(password)) => Some((user, password)),
                (None, None) => None,
                (Some(_), None) => {
                    return Err(ConfigError::MissingKey {
                        section: "queue",
                        key: "password",
                    });
                }
                (None, Some(_)) => {
                    return Err(ConfigError::MissingKey {
                        section: "queue",
                        key: "user",
                    });
                }
            };
            if queue.timeout_seconds == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "queue.timeout_seconds",
                    message: "must be at least 1".to_string(),
                });
            }
            Some(QueueConfig {
                broker: require(queue.broker, "queue", "broker")?,
                topic: require(queue.topic, "queue", "topic")?,
                credentials,
                timeout: Duration::from_secs(queue.timeout_seconds),
            })
        } else {
            None
        };

        if raw.poll.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.interval_seconds",
                message: "must be at least 1".to_string(),
            });
        }
        if raw.poll.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.timeout_seconds",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            alarm_manager,
            notify,
            mail,
            queue,
            state_path: raw.storage.path,
            poll_interval: Duration::from_secs(raw.poll.interval_seconds),
            request_timeout: Duration::from_secs(raw.poll.timeout_seconds),
        })
    }

    /// Returns the notification policy.
    #[must_use]
    pub fn notify_policy(&self) -> NotifyPolicy {
        NotifyPolicy::new(self.notify.online, self.notify.status_change)
    }

    /// Returns the poll loop settings.
    #[must_use]
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            policy: self.notify_policy(),
            subject: self
                .mail
                .as_ref()
                .map_or_else(|| DEFAULT_SUBJECT.to_string(), |mail| mail.subject.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [alarmmanager]
        host = "alarm.local"
        port = 8080

        [notify]
        online = true
        statuschange = false
        mail = false
        queue = false
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.alarm_manager.host, "alarm.local");
        assert_eq!(config.alarm_manager.port, 8080);
        assert!(!config.alarm_manager.https);
        assert!(config.mail.is_none());
        assert!(config.queue.is_none());
        assert_eq!(config.state_path, PathBuf::from("alarm-status.json"));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.notify_policy(), NotifyPolicy::new(true, false));
        assert_eq!(config.poll_settings().subject, "Alarm Status Changed");
    }

    #[test]
    fn missing_alarmmanager_section() {
        let err = Config::from_toml_str("[notify]\nonline = true").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fatal error config: no alarmmanager field was found."
        );
    }

    #[test]
    fn missing_notify_key() {
        let text = MINIMAL.replace("statuschange = false", "");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fatal error config: no notify statuschange was defined."
        );
    }

    #[test]
    fn mail_section_required_when_enabled() {
        let text = MINIMAL.replace("mail = false", "mail = true");
        let err = Config::from_toml_str(&text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Fatal error config: mail config section is required."
        );
    }

    #[test]
    fn mail_section_is_parsed() {
        let text = format!(
            "{}\n[mail]\nmailfrom = \"alarm\"\nmaildomain = \"example.com\"\n\
             destination = \"ops@example.com\"\n",
            MINIMAL.replace("mail = false", "mail = true")
        );
        let config = Config::from_toml_str(&text).unwrap();
        let mail = config.mail.unwrap();

        assert_eq!(mail.sender(), "alarm@example.com");
        assert_eq!(mail.sendmail, PathBuf::from("/usr/sbin/sendmail"));
        assert_eq!(mail.subject, "Alarm Status Changed");
    }

    #[test]
    fn queue_section_requires_topic() {
        let text = format!(
            "{}\n[queue]\nbroker = \"mqtt://broker:1883\"\n",
            MINIMAL.replace("queue = false", "queue = true")
        );
        let err = Config::from_toml_str(&text).unwrap_err();
        assert_eq!(err.to_string(), "Fatal error config: no queue topic was defined.");
    }

    #[test]
    fn https_flag_is_read() {
        let text = MINIMAL.replace("port = 8080", "port = 8443\nhttps = true");
        let config = Config::from_toml_str(&text).unwrap();
        assert!(config.alarm_manager.https);
        assert_eq!(config.alarm_manager.port, 8443);
    }

    #[test]
    fn queue_section_is_parsed() {
        let text = format!(
            "{}\n[queue]\nbroker = \"mqtt://broker:1883\"\ntopic = \"alarms\"\n",
            MINIMAL.replace("queue = false", "queue = true")
        );
        let queue = Config::from_toml_str(&text).unwrap().queue.unwrap();

        assert_eq!(queue.topic, "alarms");
        assert!(queue.credentials.is_none());
        assert_eq!(queue.timeout, Duration::from_secs(10));
    }

    #[test]
    fn zero_queue_timeout_is_rejected() {
        let text = format!(
            "{}\n[queue]\nbroker = \"mqtt://broker:1883\"\ntopic = \"alarms\"\n\
             timeout_seconds = 0\n",
            MINIMAL.replace("queue = false", "queue = true")
        );
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::InvalidValue {
                field: "queue.timeout_seconds",
                ..
            })
        ));
    }

    #[test]
    fn queue_credentials_must_be_paired() {
        let text = format!(
            "{}\n[queue]\nbroker = \"mqtt://broker:1883\"\ntopic = \"alarms\"\n\
             user = \"watcher\"\n",
            MINIMAL.replace("queue = false", "queue = true")
        );
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::MissingKey {
                section: "queue",
                key: "password"
            })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let text = format!("{MINIMAL}\n[poll]\ninterval_seconds = 0\n");
        assert!(matches!(
            Config::from_toml_str(&text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        assert!(matches!(
            Config::from_toml_str("[alarmmanager"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_dir_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.alarm_manager.port, 8080);
    }

    #[test]
    fn load_from_missing_dir_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_dir(&dir.path().join("nonexistent")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
