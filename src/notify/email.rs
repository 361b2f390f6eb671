// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Email delivery through the local mail transfer agent.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::EmailChannel;
use crate::error::DeliveryError;

/// [`EmailChannel`] that pipes each message into `sendmail -t -i`.
///
/// SMTP relaying, authentication and retries are left to the MTA.
///
/// # Examples
///
/// ```
/// use alarm_watcher::notify::SendmailChannel;
///
/// let channel = SendmailChannel::new("alarm@example.com", "ops@example.com")
///     .with_program("/usr/sbin/sendmail");
/// let message = channel.compose("Alarm Status Changed", "Home - Started Firing");
/// assert!(message.contains("Subject: Alarm Status Changed\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct SendmailChannel {
    program: PathBuf,
    args: Vec<String>,
    from: String,
    to: String,
    timeout: Duration,
}

impl SendmailChannel {
    /// Default MTA binary.
    pub const DEFAULT_PROGRAM: &'static str = "/usr/sbin/sendmail";
    /// Default time allowed for the MTA to accept a message.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a channel sending from `from` to `to`.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from(Self::DEFAULT_PROGRAM),
            args: vec!["-t".to_string(), "-i".to_string()],
            from: from.into(),
            to: to.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the MTA binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Replaces the arguments passed to the MTA.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the delivery timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Returns the recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.to
    }

    /// Builds the RFC 5322 message handed to the MTA.
    #[must_use]
    pub fn compose(&self, subject: &str, body: &str) -> String {
        let domain = self
            .from
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain);
        let message_id = uuid::Uuid::new_v4();
        let date = chrono::Utc::now().to_rfc2822();

        let headers = [
            format!("From: {}", self.from),
            format!("To: {}", self.to),
            format!("Subject: {subject}"),
            format!("Date: {date}"),
            format!("Message-ID: <{message_id}@{domain}>"),
            "MIME-Version: 1.0".to_string(),
            "Content-Type: text/plain; charset=utf-8".to_string(),
        ];

        format!("{}\r\n\r\n{body}\r\n", headers.join("\r\n"))
    }

    async fn deliver(&self, message: String) -> Result<(), DeliveryError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DeliveryError::MailerExit(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

impl EmailChannel for SendmailChannel {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = self.compose(subject, body);

        tracing::debug!(program = %self.program.display(), to = %self.to, "Handing message to MTA");

        // Safe: configured timeouts are far below u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.timeout.as_millis() as u64;

        tokio::time::timeout(self.timeout, self.deliver(message))
            .await
            .map_err(|_| DeliveryError::Timeout(timeout_ms))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_has_headers_and_body() {
        let channel = SendmailChannel::new("alarm@example.com", "ops@example.com");
        let message = channel.compose("Alarm Status Changed", "Home - Became Offline");

        assert!(message.starts_with("From: alarm@example.com\r\nTo: ops@example.com\r\n"));
        assert!(message.contains("Subject: Alarm Status Changed\r\n"));
        assert!(message.contains("@example.com>\r\n"));
        assert!(message.ends_with("\r\n\r\nHome - Became Offline\r\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn send_pipes_message_to_program() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.eml");
        let channel = SendmailChannel::new("alarm@example.com", "ops@example.com")
            .with_program("/bin/sh")
            .with_args(["-c".to_string(), format!("cat > '{}'", out.display())]);

        channel
            .send("Alarm Status Changed", "Home - Started Firing")
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("Subject: Alarm Status Changed"));
        assert!(written.contains("Home - Started Firing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_reported() {
        let channel = SendmailChannel::new("alarm@example.com", "ops@example.com")
            .with_program("/bin/sh")
            .with_args(["-c", "cat > /dev/null; echo refused >&2; exit 75"]);

        let err = channel.send("subject", "body").await.unwrap_err();
        match err {
            DeliveryError::MailerExit(detail) => assert!(detail.contains("refused")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let channel = SendmailChannel::new("alarm@example.com", "ops@example.com")
            .with_program("/nonexistent/sendmail");

        let err = channel.send("subject", "body").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Io(_)));
    }
}
