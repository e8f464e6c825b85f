//! Delivery of backup success/failure events to an external sink.
//!
//! Delivery failures are logged and swallowed; a lost notification never
//! fails a backup cycle.

mod telegram;
mod webhook;

pub use telegram::Telegram;
pub use webhook::Webhook;

use derive_more::{Display, Error, From};

/// Outcome of a backup run, as reported to the sink.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[display("success")]
    Success,
    #[display("failure")]
    Failure,
}

/// One success/failure event for a completed backup cycle.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub status: Status,
    pub database: String,
    /// File name of the artifact; absent when the run failed.
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub message: String,
}

impl Notification {
    pub fn success(database: &str, file_name: &str) -> Self {
        Self {
            status: Status::Success,
            database: database.to_owned(),
            file_name: Some(file_name.to_owned()),
            message: format!(
                "Database \"{database}\" backed up successfully. File name: \"{file_name}\""
            ),
        }
    }

    pub fn failure(database: &str, diagnostic: &str) -> Self {
        let mut message = format!("Error backing up database \"{database}\"");
        if !diagnostic.trim().is_empty() {
            message = format!("{message}: {}", diagnostic.trim());
        }

        Self {
            status: Status::Failure,
            database: database.to_owned(),
            file_name: None,
            message,
        }
    }
}

#[derive(Debug, Display, Error, From)]
/// Errors on delivering a [Notification].
pub enum NotifyError {
    /// The HTTP request to the sink failed.
    #[display("notification request failed: {_0}")]
    #[from]
    Request(reqwest::Error),
    /// The sink answered with a non-success status code.
    #[display("notification endpoint answered {_0}")]
    EndpointStatus(#[error(ignore)] reqwest::StatusCode),
}

/// Configured notification transport.
///
/// Kept as an enum so the scheduler can hold and clone it without boxing;
/// [Sink::Disabled] turns every delivery into a no-op.
#[derive(Debug, Clone, Default)]
pub enum Sink {
    #[default]
    Disabled,
    Webhook(Webhook),
    Telegram(Telegram),
}

impl Sink {
    /// Delivers `notification`, logging instead of propagating any failure.
    pub async fn deliver(&self, notification: &Notification) {
        let delivery = match self {
            Sink::Disabled => return,
            Sink::Webhook(webhook) => webhook.send(notification).await,
            Sink::Telegram(telegram) => telegram.send(notification).await,
        };

        match delivery {
            Ok(()) => {
                log::debug!(
                    target: "notify",
                    "Delivered {} notification for \"{}\"",
                    notification.status,
                    notification.database
                );
            }
            Err(e) => {
                log::warn!(
                    target: "notify",
                    "Delivering {} notification for \"{}\" failed: {e}",
                    notification.status,
                    notification.database
                );
            }
        }
    }
}
