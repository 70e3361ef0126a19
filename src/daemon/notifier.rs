use std::sync::Arc;

use log::{error, warn};

use crate::bot::ChatDelivery;
use crate::bot::markup::Markup;
use crate::bot::templates::format_full;
use crate::domain::chat::ChatId;
use crate::domain::email::MessageRecord;

/// Sends one message record to a chat: formatted text first, then each
/// attachment as a document.
#[derive(Clone)]
pub struct Notifier {
    delivery: Arc<dyn ChatDelivery>,
}

impl Notifier {
    pub fn new(delivery: Arc<dyn ChatDelivery>) -> Self {
        Self { delivery }
    }

    /// Returns whether the text part went out. A failure is only logged:
    /// the record counts as dispatched either way.
    pub async fn deliver(
        &self,
        chat: &ChatId,
        record: &MessageRecord,
        markup: Option<Markup>,
    ) -> bool {
        let text = format_full(record);
        if let Err(e) = self.delivery.send_text(chat, &text, markup).await {
            error!("chat {chat}: delivering message {} failed: {e}", record.id);
            return false;
        }

        for att in &record.attachments {
            let caption = format!("📎 {}", att.filename);
            if let Err(e) = self
                .delivery
                .send_document(chat, &att.data, &att.filename, Some(&caption))
                .await
            {
                warn!(
                    "chat {chat}: attachment {} of message {} not sent: {e}",
                    att.filename, record.id
                );
            }
        }
        true
    }
}
