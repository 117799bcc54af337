//! Chat transport abstraction.
//!
//! The storefront flows talk to the user only through the [`Messenger`]
//! trait, so tests can swap in a recording implementation. The production
//! implementation wraps a teloxide [`Bot`].

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardMarkup, InlineQueryId, InlineQueryResult, InlineQueryResultArticle, InputFile,
    InputMessageContent, InputMessageContentText, MessageId,
};
use tracing::warn;

use crate::errors::ShopError;

/// One inline-mode search result (FAQ article).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineAnswer {
    pub id: String,
    pub title: String,
    pub text: String,
    pub description: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Outbound side of the chat transport.
///
/// `delete_message` is best-effort: a message that is already gone or that
/// the bot may not touch is logged and swallowed, never an error.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message, returning the new message id.
    async fn send_text(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError>;

    /// Send a photo with a caption, returning the new message id.
    async fn send_photo(
        &self,
        user_id: i64,
        photo: &str,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError>;

    /// Replace the text (and keyboard) of an existing message.
    async fn edit_text(
        &self,
        user_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ShopError>;

    /// Delete a message. NotFound/Forbidden are swallowed.
    async fn delete_message(&self, user_id: i64, message_id: i32) -> Result<(), ShopError>;

    /// Answer an inline query with FAQ articles.
    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineAnswer>,
    ) -> Result<(), ShopError>;
}

/// Production transport backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn transport_err(e: teloxide::RequestError) -> ShopError {
    ShopError::Transport(e.to_string())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError> {
        let mut request = self.bot.send_message(ChatId(user_id), text);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        let sent = request.await.map_err(transport_err)?;
        Ok(sent.id.0)
    }

    async fn send_photo(
        &self,
        user_id: i64,
        photo: &str,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError> {
        // Catalog image references are URLs; anything else is treated as
        // a transport file id.
        let input = match photo.parse() {
            Ok(url) => InputFile::url(url),
            Err(_) => InputFile::file_id(teloxide::types::FileId(photo.to_string())),
        };
        let mut request = self.bot.send_photo(ChatId(user_id), input).caption(caption.to_string());
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        let sent = request.await.map_err(transport_err)?;
        Ok(sent.id.0)
    }

    async fn edit_text(
        &self,
        user_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ShopError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(user_id), MessageId(message_id), text);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        request.await.map_err(transport_err)?;
        Ok(())
    }

    async fn delete_message(&self, user_id: i64, message_id: i32) -> Result<(), ShopError> {
        match self
            .bot
            .delete_message(ChatId(user_id), MessageId(message_id))
            .await
        {
            Ok(_) => Ok(()),
            // An already-deleted or foreign message must not fail the caller.
            Err(e) => {
                warn!(user_id = %user_id, message_id = %message_id, error = %e,
                    "Failed to delete message");
                Ok(())
            }
        }
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineAnswer>,
    ) -> Result<(), ShopError> {
        let articles: Vec<InlineQueryResult> = results
            .into_iter()
            .map(|answer| {
                let content = InputMessageContent::Text(InputMessageContentText::new(answer.text));
                let mut article =
                    InlineQueryResultArticle::new(answer.id, answer.title, content);
                article.description = Some(answer.description);
                article.reply_markup = answer.keyboard;
                InlineQueryResult::Article(article)
            })
            .collect();

        let mut request = self
            .bot
            .answer_inline_query(InlineQueryId(query_id.to_string()), articles);
        request.cache_time = Some(0);
        request.await.map_err(transport_err)?;
        Ok(())
    }
}
