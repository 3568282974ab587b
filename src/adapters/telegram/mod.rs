use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::{
    app_error::{AppError, AppResult},
    use_cases::reminders::ReminderNotifier,
};
use secrecy::ExposeSecret;

/// Thin Bot API client; only `sendMessage` is needed, linking happens over
/// the token endpoints rather than a webhook bot.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    bot_token: Option<secrecy::SecretString>,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<secrecy::SecretString>) -> Self {
        Self {
            client: Client::new(),
            bot_token,
        }
    }
}

#[derive(Serialize)]
struct SendMessageReq<'a> {
    chat_id: i64,
    text: &'a str,
}

#[async_trait]
impl ReminderNotifier for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let token = self
            .bot_token
            .as_ref()
            .ok_or_else(|| AppError::Internal("TELEGRAM_BOT_TOKEN is not configured".into()))?;

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            token.expose_secret()
        );
        self.client
            .post(url)
            .json(&SendMessageReq { chat_id, text })
            .send()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }
}
