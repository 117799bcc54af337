//! Subscription gate: the catalog opens only for users who joined the
//! shop's channel and group.

use async_trait::async_trait;
use tracing::warn;

/// Answers whether a user may pass the subscribe screen.
#[async_trait]
pub trait SubscriptionGate: Send + Sync {
    async fn is_subscribed(&self, user_id: i64) -> bool;
}

/// Checks chat membership via the Bot API `getChatMember` call for each
/// required chat. Any API failure counts as not subscribed.
pub struct TelegramSubscriptionGate {
    http: reqwest::Client,
    bot_token: String,
    required_chats: Vec<String>,
}

impl TelegramSubscriptionGate {
    pub fn new(bot_token: String, channel_id: String, group_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            required_chats: vec![channel_id, group_id],
        }
    }
}

#[async_trait]
impl SubscriptionGate for TelegramSubscriptionGate {
    async fn is_subscribed(&self, user_id: i64) -> bool {
        for chat_id in &self.required_chats {
            let url = format!(
                "https://api.telegram.org/bot{}/getChatMember?chat_id={}&user_id={}",
                self.bot_token, chat_id, user_id
            );

            let data: serde_json::Value = match self.http.get(&url).send().await {
                Ok(response) => match response.json().await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e,
                            "Failed to parse chat member response");
                        return false;
                    }
                },
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Chat member request failed");
                    return false;
                }
            };

            if !data["ok"].as_bool().unwrap_or(false) {
                return false;
            }

            match data["result"]["status"].as_str() {
                Some("left") | Some("kicked") | None => return false,
                Some(_) => {}
            }
        }

        true
    }
}
