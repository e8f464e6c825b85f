//! JSON webhook transport.

use reqwest::Client;

use super::{Notification, NotifyError};

/// Posts every event as a JSON document to a single webhook URL.
#[derive(Debug, Clone)]
pub struct Webhook {
    client: Client,
    url: String,
}

impl Webhook {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub(super) async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::EndpointStatus(status));
        }

        Ok(())
    }
}
