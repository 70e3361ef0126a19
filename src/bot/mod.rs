pub mod client;
pub mod markup;
pub mod templates;
pub mod types;

use async_trait::async_trait;
use log::warn;

use crate::bot::client::TelegramClient;
use crate::bot::markup::Markup;
use crate::bot::types::{AnswerCallbackQueryRequest, SendMessageRequest};
use crate::domain::chat::ChatId;
use crate::error::DeliveryError;

/// Hard cap on outbound text length imposed by the bot API.
pub const MAX_TEXT_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "\n\n... (truncated)";
const TRUNCATION_MARGIN: usize = 50;

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatDelivery: Send + Sync {
    async fn send_text(
        &self,
        chat: &ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DeliveryError>;

    async fn send_document(
        &self,
        chat: &ChatId,
        data: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError>;

    /// Quick-ack for a button press; clears the client-side spinner.
    async fn answer_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError>;
}

/// Cut text over [`MAX_TEXT_CHARS`] and mark the cut.
pub fn clamp_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    let mut out: String = text
        .chars()
        .take(MAX_TEXT_CHARS - TRUNCATION_MARGIN)
        .collect();
    out.truncate(html_safe_end(&out));
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Byte length of `text` minus a trailing entity or tag left open by a cut.
fn html_safe_end(text: &str) -> usize {
    let mut end = text.len();
    if let Some(amp) = text.rfind('&') {
        if !text[amp..].contains(';') {
            end = amp;
        }
    }
    if let Some(lt) = text[..end].rfind('<') {
        if !text[lt..end].contains('>') {
            end = lt;
        }
    }
    end
}

#[async_trait]
impl ChatDelivery for TelegramClient {
    async fn send_text(
        &self,
        chat: &ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DeliveryError> {
        let clamped = clamp_text(text);
        if clamped.len() != text.len() {
            warn!("message to chat {chat} truncated");
        }
        let req = SendMessageRequest {
            chat_id: chat.to_string(),
            text: clamped,
            parse_mode: Some("HTML".to_string()),
            reply_markup: markup.map(|m| m.inline_keyboard()),
        };
        self.send_message(&req).await.map(|_| ())
    }

    async fn send_document(
        &self,
        chat: &ChatId,
        data: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        TelegramClient::send_document(self, chat.as_str(), data.to_vec(), filename, caption)
            .await
            .map(|_| ())
    }

    async fn answer_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let req = AnswerCallbackQueryRequest {
            callback_query_id: interaction_id.to_string(),
            text: text.map(str::to_string),
        };
        self.answer_callback_query(&req).await.map(|_| ())
    }
}
