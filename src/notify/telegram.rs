//! Telegram Bot API transport.

use reqwest::Client;

use super::{Notification, NotifyError};

const API_BASE: &str = "https://api.telegram.org";

/// Relays the event text to a chat through the [Bot API].
///
/// [Bot API]: https://core.telegram.org/bots/api#sendmessage
#[derive(Clone)]
pub struct Telegram {
    client: Client,
    token: String,
    chat_id: String,
}

impl Telegram {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            client: Client::new(),
            token,
            chat_id,
        }
    }

    pub(super) async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!("{API_BASE}/bot{}/sendMessage", self.token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": notification.message,
        });

        let response = self.client.post(url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::EndpointStatus(status));
        }

        Ok(())
    }
}

// Keep the bot token out of debug output.
impl std::fmt::Debug for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telegram")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}
