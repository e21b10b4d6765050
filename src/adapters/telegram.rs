//! Telegram approval channel.
//!
//! A draft post is sent to the configured chat with inline approve/reject
//! buttons. Decisions come back asynchronously through `getUpdates`:
//! callback presses map to Approve/Reject, and a text message of the form
//! `/edit <item_id> <new text>` replaces the draft content. The decision is
//! keyed by item id so nothing depends on in-process state.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::{Item, Post};
use crate::error::PipelineError;

use super::{ApprovalChannel, ApprovalDecision, Decision};

const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the Telegram approval channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    #[allow(dead_code)]
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    callback_query: Option<CallbackQuery>,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
}

/// Approval channel backed by the Telegram Bot API
pub struct TelegramApproval {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
    /// Next getUpdates offset, so each update is consumed once
    offset: Mutex<i64>,
}

impl TelegramApproval {
    pub fn new(config: TelegramConfig) -> Result<Self, PipelineError> {
        if config.bot_token.is_empty() || config.chat_id.is_empty() {
            return Err(PipelineError::Validation(
                "Telegram bot token and chat id are required".to_string(),
            ));
        }

        Ok(Self {
            bot_token: config.bot_token,
            chat_id: config.chat_id,
            client: reqwest::Client::builder()
                .timeout(TELEGRAM_TIMEOUT)
                .build()
                .map_err(|e| PipelineError::Api(e.to_string()))?,
            offset: Mutex::new(0),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, PipelineError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&payload)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            return Err(PipelineError::Auth(
                "Telegram rejected the bot token".to_string(),
            ));
        }
        if response.status().as_u16() == 429 {
            return Err(PipelineError::RateLimit("Telegram rate limit".to_string()));
        }

        let envelope: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| PipelineError::Api(format!("Bad Telegram payload: {}", e)))?;

        if !envelope.ok {
            return Err(PipelineError::Api(format!(
                "Telegram API error: {}",
                envelope.description.unwrap_or_default()
            )));
        }

        envelope
            .result
            .ok_or_else(|| PipelineError::Api("Telegram response had no result".to_string()))
    }

    /// Parse a callback or message into a decision, if it is one
    fn parse_decision(update: &Update) -> Option<ApprovalDecision> {
        if let Some(callback) = &update.callback_query {
            let data = callback.data.as_deref()?;
            let (action, id) = data.split_once(':')?;
            let item_id: i64 = id.parse().ok()?;
            let decision = match action {
                "approve" => Decision::Approve,
                "reject" => Decision::Reject,
                _ => return None,
            };
            return Some(ApprovalDecision { item_id, decision });
        }

        if let Some(message) = &update.message {
            let text = message.text.as_deref()?;
            let rest = text.strip_prefix("/edit ")?;
            let (id, new_text) = rest.split_once(' ')?;
            let item_id: i64 = id.parse().ok()?;
            let new_text = new_text.trim();
            if new_text.is_empty() {
                return None;
            }
            return Some(ApprovalDecision {
                item_id,
                decision: Decision::Edit(new_text.to_string()),
            });
        }

        None
    }
}

#[async_trait]
impl ApprovalChannel for TelegramApproval {
    async fn request_approval(&self, item: &Item, post: &Post) -> Result<(), PipelineError> {
        let text = format!(
            "Draft post for review\n\n{}\n{}\n\n---\n{}\n---\n\n{} chars. \
             Reply `/edit {} <new text>` to change it.",
            item.title,
            item.url,
            post.content,
            post.content.chars().count(),
            item.id,
        );

        let keyboard = json!({
            "inline_keyboard": [[
                { "text": "Approve", "callback_data": format!("approve:{}", item.id) },
                { "text": "Reject", "callback_data": format!("reject:{}", item.id) },
            ]]
        });

        let _msg: MessageResult = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": self.chat_id,
                    "text": text,
                    "reply_markup": keyboard,
                }),
            )
            .await?;

        debug!(item_id = item.id, "Approval requested");
        Ok(())
    }

    async fn poll_decisions(&self) -> Result<Vec<ApprovalDecision>, PipelineError> {
        let offset = *self.offset.lock().unwrap();
        let updates: Vec<Update> = self
            .call("getUpdates", json!({ "offset": offset, "timeout": 0 }))
            .await?;

        let mut decisions = Vec::new();
        let mut max_update_id = offset - 1;

        for update in &updates {
            max_update_id = max_update_id.max(update.update_id);

            if let Some(decision) = Self::parse_decision(update) {
                // Ack the button press; a failed ack only affects the
                // client-side spinner, so log and move on.
                if let Some(callback) = &update.callback_query {
                    let ack: Result<serde_json::Value, _> = self
                        .call(
                            "answerCallbackQuery",
                            json!({ "callback_query_id": callback.id }),
                        )
                        .await;
                    if let Err(e) = ack {
                        warn!(error = %e, "Failed to ack callback");
                    }
                }
                decisions.push(decision);
            }
        }

        *self.offset.lock().unwrap() = max_update_id + 1;
        Ok(decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_with_callback(data: &str) -> Update {
        Update {
            update_id: 1,
            callback_query: Some(CallbackQuery {
                id: "cb1".to_string(),
                data: Some(data.to_string()),
            }),
            message: None,
        }
    }

    fn update_with_text(text: &str) -> Update {
        Update {
            update_id: 2,
            callback_query: None,
            message: Some(Message {
                text: Some(text.to_string()),
            }),
        }
    }

    #[test]
    fn test_parse_approve_and_reject() {
        let decision = TelegramApproval::parse_decision(&update_with_callback("approve:42")).unwrap();
        assert_eq!(decision.item_id, 42);
        assert_eq!(decision.decision, Decision::Approve);

        let decision = TelegramApproval::parse_decision(&update_with_callback("reject:7")).unwrap();
        assert_eq!(decision.decision, Decision::Reject);
    }

    #[test]
    fn test_parse_edit() {
        let decision =
            TelegramApproval::parse_decision(&update_with_text("/edit 42 New post body here"))
                .unwrap();
        assert_eq!(decision.item_id, 42);
        assert_eq!(
            decision.decision,
            Decision::Edit("New post body here".to_string())
        );
    }

    #[test]
    fn test_parse_garbage_ignored() {
        assert!(TelegramApproval::parse_decision(&update_with_callback("publish:42")).is_none());
        assert!(TelegramApproval::parse_decision(&update_with_callback("approve:notanum")).is_none());
        assert!(TelegramApproval::parse_decision(&update_with_text("hello there")).is_none());
        assert!(TelegramApproval::parse_decision(&update_with_text("/edit 42 ")).is_none());
    }

    #[test]
    fn test_missing_config_rejected() {
        let result = TelegramApproval::new(TelegramConfig {
            bot_token: String::new(),
            chat_id: "123".to_string(),
        });
        assert!(result.is_err());
    }
}
