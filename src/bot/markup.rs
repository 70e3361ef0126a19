use crate::bot::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::domain::email::MessageId;
use crate::relay::intent::Action;

const NUMBERS_PER_ROW: usize = 5;

/// Every keyboard the bot attaches to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    MainMenu,
    /// Numbered buttons for the entries of one list page, plus navigation.
    MessageList {
        page: u32,
        page_size: u32,
        total_pages: u32,
        ids: Vec<MessageId>,
    },
    /// Shown under a single opened message; returns to `page`.
    MessageView { page: u32 },
    /// "Next message" with the number still queued.
    Continuation { remaining: usize },
}

impl Markup {
    /// `None` once the queue is drained.
    pub fn continuation(remaining: usize) -> Option<Markup> {
        (remaining > 0).then_some(Markup::Continuation { remaining })
    }

    pub fn inline_keyboard(&self) -> InlineKeyboardMarkup {
        let rows = match self {
            Markup::MainMenu => main_menu(),
            Markup::MessageList {
                page,
                page_size,
                total_pages,
                ids,
            } => message_list(*page, *page_size, *total_pages, ids),
            Markup::MessageView { page } => message_view(*page),
            Markup::Continuation { remaining } => continuation(*remaining),
        };
        InlineKeyboardMarkup {
            inline_keyboard: rows,
        }
    }
}

fn button(text: impl Into<String>, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::new(text, action.token())
}

fn main_menu() -> Vec<Vec<InlineKeyboardButton>> {
    vec![
        vec![button("🔄 Check for new", Action::CheckMail)],
        vec![button("📬 Open mailbox", Action::OpenPage(0))],
    ]
}

fn message_list(
    page: u32,
    page_size: u32,
    total_pages: u32,
    ids: &[MessageId],
) -> Vec<Vec<InlineKeyboardButton>> {
    let first = page as usize * page_size as usize;
    let mut rows: Vec<Vec<InlineKeyboardButton>> = ids
        .chunks(NUMBERS_PER_ROW)
        .enumerate()
        .map(|(row, chunk)| {
            chunk
                .iter()
                .enumerate()
                .map(|(col, id)| {
                    let number = first + row * NUMBERS_PER_ROW + col + 1;
                    button(number.to_string(), Action::OpenMessage(id.clone()))
                })
                .collect()
        })
        .collect();

    let mut nav = Vec::with_capacity(3);
    if page > 0 {
        nav.push(button("⬅️", Action::OpenPage(page - 1)));
    }
    nav.push(button(format!("{}/{}", page + 1, total_pages), Action::Noop));
    if page + 1 < total_pages {
        nav.push(button("➡️", Action::OpenPage(page + 1)));
    }
    rows.push(nav);
    rows.push(vec![button("🔄 Refresh", Action::OpenPage(page))]);
    rows
}

fn message_view(page: u32) -> Vec<Vec<InlineKeyboardButton>> {
    vec![
        vec![button("📋 Back to list", Action::OpenPage(page))],
        vec![button("🏠 Menu", Action::Menu)],
    ]
}

fn continuation(remaining: usize) -> Vec<Vec<InlineKeyboardButton>> {
    vec![vec![button(
        format!("📬 Next message ({remaining})"),
        Action::NextMessage,
    )]]
}
