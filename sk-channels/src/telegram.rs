use crate::types::{InboundCommand, Reply};
use anyhow::Result;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

const LONG_POLL_TIMEOUT_SECS: &str = "25";
const ALLOWED_UPDATES: &str = r#"["message"]"#;
const NON_TRANSIENT_DELAY: Duration = Duration::from_secs(10);
const RETRY_BASE_MS: u64 = 250;
const RETRY_MAX_MS: u64 = 30_000;

#[derive(Clone)]
pub struct TelegramBot {
    http: reqwest::Client,
    bot_token: String,
}

impl TelegramBot {
    pub fn new(bot_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            bot_token: bot_token.to_string(),
        })
    }

    fn api_url(&self, method: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "https://api.telegram.org/bot{}/{}",
            self.bot_token, method
        ))?)
    }

    pub fn spawn_poll_loop(&self, tx: mpsc::Sender<InboundCommand>) {
        let bot = self.clone();
        tokio::spawn(async move {
            if let Err(e) = bot.run_poll_loop(tx).await {
                tracing::error!(%e, "telegram poll loop exited");
            }
        });
    }

    /// Long-poll `getUpdates` forever, pushing each text message into `tx`.
    /// Transient failures (429/408/5xx/transport) back off exponentially;
    /// non-transient statuses are logged and the loop stays alive.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn run_poll_loop(&self, tx: mpsc::Sender<InboundCommand>) -> Result<()> {
        let mut offset: i64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            let url = self.api_url("getUpdates")?;
            let response = match self
                .http
                .get(url)
                .query(&[
                    ("timeout", LONG_POLL_TIMEOUT_SECS),
                    ("offset", &offset.to_string()),
                    ("allowed_updates", ALLOWED_UPDATES),
                ])
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(%error, attempt = consecutive_failures, ?delay,
                        "getUpdates request failed; retrying with backoff");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                if is_transient_status(status) {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(%status, %body, attempt = consecutive_failures, ?delay,
                        "getUpdates transient failure; retrying with backoff");
                    tokio::time::sleep(delay).await;
                } else {
                    consecutive_failures = 0;
                    tracing::error!(%status, %body,
                        "getUpdates non-transient failure; keeping poll loop alive");
                    tokio::time::sleep(NON_TRANSIENT_DELAY).await;
                }
                continue;
            }

            let parsed = match response.json::<GetUpdatesResponse>().await {
                Ok(parsed) => parsed,
                Err(error) => {
                    consecutive_failures += 1;
                    let delay = transient_retry_delay(consecutive_failures);
                    tracing::warn!(%error, attempt = consecutive_failures, ?delay,
                        "getUpdates payload parse failed; retrying with backoff");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            consecutive_failures = 0;

            let mut updates = parsed.result;
            updates.sort_by_key(|update| update.update_id);
            for update in updates {
                // Advance the offset before dispatch so one poison update
                // cannot be replayed forever.
                if update.update_id < offset {
                    continue;
                }
                offset = update.update_id.saturating_add(1);

                if let Some(inbound) = inbound_from_update(&update) {
                    tx.send(inbound)
                        .await
                        .map_err(|e| anyhow::anyhow!("inbound queue closed: {e}"))?;
                }
            }
        }
    }

    /// Send one plain-text reply to `chat_id`, with keyboard markup when the
    /// reply carries any.
    pub async fn send(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let url = self.api_url("sendMessage")?;
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": reply.text,
        });
        if let Some(keyboard) = &reply.keyboard {
            body["reply_markup"] = keyboard.to_markup();
        }
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(anyhow::anyhow!(
                "telegram send failed: status={status} body={text}"
            ));
        }
        Ok(())
    }
}

fn transient_retry_delay(attempt: u32) -> Duration {
    let multiplier = 1_u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis((RETRY_BASE_MS * multiplier).min(RETRY_MAX_MS))
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Reduce one update to an `InboundCommand`. Non-text updates (stickers,
/// photos, edits without text) and blank messages yield `None`.
fn inbound_from_update(update: &TelegramUpdate) -> Option<InboundCommand> {
    let message = update.message.as_ref()?;
    let chat = message.chat.as_ref()?;
    let text = message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())?
        .to_string();
    let user_id = message.from.as_ref().map(|user| user.id).unwrap_or(chat.id);

    Some(InboundCommand {
        update_id: update.update_id,
        chat_id: chat.id,
        user_id,
        text,
    })
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    chat: Option<TelegramChat>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_exponentially_and_caps() {
        assert_eq!(transient_retry_delay(1).as_millis(), 250);
        assert_eq!(transient_retry_delay(2).as_millis(), 500);
        assert_eq!(transient_retry_delay(3).as_millis(), 1000);
        assert_eq!(transient_retry_delay(20).as_millis(), 30_000);
    }

    #[test]
    fn text_updates_become_inbound_commands() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 42,
            "message": {
                "from": {"id": 7},
                "chat": {"id": 99},
                "text": "  /note_list  "
            }
        }))
        .expect("parse");

        let inbound = inbound_from_update(&update).expect("inbound");
        assert_eq!(inbound.update_id, 42);
        assert_eq!(inbound.chat_id, 99);
        assert_eq!(inbound.user_id, 7);
        assert_eq!(inbound.text, "/note_list");
    }

    #[test]
    fn non_text_and_blank_updates_are_skipped() {
        let no_message: TelegramUpdate =
            serde_json::from_value(serde_json::json!({"update_id": 1})).expect("parse");
        assert!(inbound_from_update(&no_message).is_none());

        let blank: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": {"chat": {"id": 5}, "text": "   "}
        }))
        .expect("parse");
        assert!(inbound_from_update(&blank).is_none());
    }

    #[test]
    fn sender_falls_back_to_chat_id_without_from() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 3,
            "message": {"chat": {"id": 55}, "text": "/ping"}
        }))
        .expect("parse");
        assert_eq!(inbound_from_update(&update).expect("inbound").user_id, 55);
    }
}
