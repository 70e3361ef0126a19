//! Message texts (Telegram HTML parse mode).

use crate::domain::chat::ChatId;
use crate::domain::email::MessageRecord;

const BODY_LIMIT: usize = 2500;
const LIST_SUBJECT_LIMIT: usize = 40;
const LIST_SENDER_LIMIT: usize = 25;

pub const WELCOME: &str = "👋 Hi! I will forward new mail from your mailbox here.\n\n\
🔄 <b>/check</b> - check for new mail\n\
📬 <b>/mail</b> - open the mailbox";

pub const HELP: &str = "📋 <b>Commands:</b>\n\n\
/check - check for new mail\n\
/mail - list messages\n\
/queue - messages waiting for delivery\n\
/help - this help";

pub const AUTH_REQUIRED: &str = "🔐 <b>Authorization required</b>\n\nEnter the password to use this bot:";
pub const AUTH_REQUIRED_SHORT: &str = "🔐 Authorization required";
pub const AUTH_SUCCESS: &str = "✅ <b>Welcome!</b>\n\nYou now have access to the mailbox.";
pub const AUTH_FAILED: &str = "❌ <b>Wrong password</b>\n\nTry again:";

pub const NO_ACCESS_SHORT: &str = "⛔ No access";
pub const NO_NEW_MAIL: &str = "📭 No new mail";
pub const NO_MAIL_FOUND: &str = "📭 No messages found";
pub const MESSAGE_NOT_FOUND: &str = "❌ Message not found";
pub const MAIN_MENU: &str = "📋 Main menu";
pub const USE_BUTTONS: &str = "👆 Use the buttons to navigate";
pub const MESSAGE_ABOVE: &str = "👆 Message above";

pub fn no_access(chat: &ChatId) -> String {
    format!("⛔ No access\n\nYour chat id: <code>{}</code>", escape_html(chat.as_str()))
}

pub fn mail_found(count: usize) -> String {
    format!("📬 New messages: {count}")
}

pub fn queue_status(count: usize) -> String {
    format!("📬 Messages in queue: {count}")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Keep the first `max` characters, appending `suffix` when something was cut.
fn clip(text: &str, max: usize, suffix: &str) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str(suffix);
    out
}

/// Shorten to at most `limit` characters, ending in "..." when cut.
fn ellipsize(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    clip(text, limit.saturating_sub(3), "...")
}

pub fn format_size(bytes: usize) -> String {
    let kb = bytes as f64 / 1024.0;
    if kb > 1024.0 {
        format!("{:.1} MB", kb / 1024.0)
    } else {
        format!("{kb:.1} KB")
    }
}

/// Full view of one message: headers, attachment summary and clipped body.
pub fn format_full(rec: &MessageRecord) -> String {
    let body = escape_html(&clip(&rec.body, BODY_LIMIT, "\n\n... (truncated)"));

    let mut attachments = String::new();
    if rec.has_attachments() {
        attachments.push_str(&format!(
            "\n\n📎 <b>Attachments:</b> {}",
            rec.attachments.len()
        ));
        for att in &rec.attachments {
            attachments.push_str(&format!(
                "\n  • {} ({})",
                escape_html(&att.filename),
                format_size(att.size)
            ));
        }
    }

    format!(
        "📧 <b>NEW MESSAGE</b>\n\n\
         📌 <b>Subject:</b> {}\n\
         👤 <b>From:</b> {}\n\
         📅 <b>Date:</b> {}{attachments}\n\n\
         📝 <b>Content:</b>\n{body}",
        escape_html(&rec.subject),
        escape_html(&rec.sender),
        escape_html(&rec.date),
    )
}

/// Display part of a `"Name" <addr>` sender, or the whole value.
fn sender_name(sender: &str) -> &str {
    match sender.split_once('<') {
        Some((name, _)) if !name.trim().is_empty() => name.trim().trim_matches('"'),
        _ => sender.trim(),
    }
}

pub fn format_list(
    entries: &[MessageRecord],
    page: u32,
    page_size: u32,
    total_pages: u32,
    total: usize,
) -> String {
    if entries.is_empty() {
        return NO_MAIL_FOUND.to_string();
    }

    let first = page as usize * page_size as usize;
    let mut lines = vec![format!(
        "📬 <b>Mailbox</b> (page {}/{total_pages}, total: {total})\n",
        page + 1
    )];

    for (i, rec) in entries.iter().enumerate() {
        let subject = escape_html(&ellipsize(&rec.subject, LIST_SUBJECT_LIMIT));
        let sender = escape_html(&ellipsize(sender_name(&rec.sender), LIST_SENDER_LIMIT));
        let clip_icon = if rec.has_attachments() { " 📎" } else { "" };
        lines.push(format!(
            "<b>{}.</b> {subject}{clip_icon}\n    └ {sender}",
            first + i + 1
        ));
    }

    lines.push("\n👆 Tap a number to open the message".to_string());
    lines.join("\n")
}
