use std::fmt;

/// Destination chat and unit of authorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is talking to the bot, as reported by the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub firstname: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/keyword [args]`
    Command(String),
    /// Button press: opaque action token plus the id used for the quick-ack.
    Callback { interaction_id: String, data: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat: ChatId,
    pub profile: Profile,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn command(chat: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            profile: Profile::default(),
            kind: EventKind::Command(text.into()),
        }
    }

    pub fn callback(
        chat: impl Into<ChatId>,
        interaction_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            chat: chat.into(),
            profile: Profile::default(),
            kind: EventKind::Callback {
                interaction_id: interaction_id.into(),
                data: data.into(),
            },
        }
    }

    pub fn text(chat: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            profile: Profile::default(),
            kind: EventKind::Text(text.into()),
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn interaction_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Callback { interaction_id, .. } => Some(interaction_id),
            _ => None,
        }
    }
}

/// Per-event outcome reported back to the webhook layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ok,
    Unauthorized,
    NotFound,
}
