//! Telegram Bot API wire types.

use serde::{Deserialize, Serialize};

use crate::domain::chat::{ChatId, EventKind, InboundEvent, Profile};

/// Every API method returns `{ ok, result?, description? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message carrying the pressed button; absent when it is too old.
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQueryRequest {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetWebhookRequest {
    pub url: String,
}

impl User {
    pub fn profile(&self) -> Profile {
        let name = match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        };
        Profile {
            name: name.trim().to_string(),
            firstname: Some(self.first_name.clone()).filter(|s| !s.is_empty()),
            username: self.username.clone(),
        }
    }
}

impl Update {
    /// Map an update onto an inbound event. Updates we do not act on
    /// (edits, stickers, channel posts without text) yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(cb) = self.callback_query {
            let chat = cb
                .message
                .as_ref()
                .map(|m| ChatId::from(m.chat.id))
                .unwrap_or_else(|| ChatId::from(cb.from.id));
            return Some(InboundEvent {
                chat,
                profile: cb.from.profile(),
                kind: EventKind::Callback {
                    interaction_id: cb.id,
                    data: cb.data.unwrap_or_default(),
                },
            });
        }

        let msg = self.message?;
        let text = msg.text?;
        let profile = msg.from.as_ref().map(User::profile).unwrap_or_default();
        let kind = if text.starts_with('/') {
            EventKind::Command(text)
        } else {
            EventKind::Text(text)
        };
        Some(InboundEvent {
            chat: ChatId::from(msg.chat.id),
            profile,
            kind,
        })
    }
}
