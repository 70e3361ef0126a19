//! Inbound tokens decoded into a closed set of intents.
//!
//! Callback data is produced by [`Action::token`] when buttons are built and
//! read back by [`Action::parse`], so both directions live here.

use crate::domain::email::MessageId;

/// A button action carried in callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CheckMail,
    OpenPage(u32),
    OpenMessage(MessageId),
    Menu,
    NextMessage,
    /// Cosmetic button (page indicator); only acknowledged.
    Noop,
}

impl Action {
    pub fn token(&self) -> String {
        match self {
            Action::CheckMail => "check_mail".to_string(),
            Action::OpenPage(page) => format!("mail_{page}"),
            Action::OpenMessage(id) => format!("email_{id}"),
            Action::Menu => "menu".to_string(),
            Action::NextMessage => "next_email".to_string(),
            Action::Noop => "noop".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Action> {
        match data {
            "check_mail" => return Some(Action::CheckMail),
            "menu" => return Some(Action::Menu),
            "next_email" => return Some(Action::NextMessage),
            "noop" => return Some(Action::Noop),
            _ => {}
        }

        if let Some(page) = data.strip_prefix("mail_") {
            return page.parse().ok().map(Action::OpenPage);
        }
        if let Some(id) = data.strip_prefix("email_") {
            return (!id.is_empty()).then(|| Action::OpenMessage(MessageId::new(id)));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Check,
    Mail,
    Queue,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse `/keyword`, tolerating a `@botname` suffix and trailing arguments.
    pub fn parse(text: &str) -> Command {
        let word = text.split_whitespace().next().unwrap_or_default();
        let word = word.trim_start_matches('/');
        let word = word.split('@').next().unwrap_or_default();

        match word {
            "start" => Command::Start,
            "check" => Command::Check,
            "mail" => Command::Mail,
            "queue" => Command::Queue,
            "help" => Command::Help,
            other => Command::Unknown(other.to_string()),
        }
    }
}
