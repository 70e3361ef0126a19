use std::sync::Arc;

use crate::domain::chat::ChatId;
use crate::domain::email::{MessageId, MessageRecord};
use crate::error::MailError;
use crate::mail::MailAccessor;
use crate::relay::RelayState;

/// One newest-first window over the whole mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
    pub entries: Vec<MessageRecord>,
    pub total_count: usize,
    pub total_pages: u32,
}

/// `ceil(total / page_size)`; 0 for an empty mailbox.
pub fn total_pages(total: usize, page_size: u32) -> u32 {
    if total == 0 || page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as usize) as u32
}

pub struct Paginator {
    mail: Arc<dyn MailAccessor>,
    state: Arc<RelayState>,
}

impl Paginator {
    pub fn new(mail: Arc<dyn MailAccessor>, state: Arc<RelayState>) -> Self {
        Self { mail, state }
    }

    /// Fetch page `page` and, on success, make it the chat's cursor.
    ///
    /// A page past the end is not an error: it comes back empty with the
    /// real totals.
    pub async fn list_page(
        &self,
        chat: &ChatId,
        page: u32,
        page_size: u32,
    ) -> Result<Page, MailError> {
        let page_size = page_size.max(1);
        let (entries, total_count) = self.mail.list_page(page, page_size).await?;

        self.state.chat(chat).lock().await.set_cursor(page);

        Ok(Page {
            page,
            page_size,
            entries,
            total_count,
            total_pages: total_pages(total_count, page_size),
        })
    }

    /// Look up one message. Leaves the cursor alone.
    pub async fn get_by_id(&self, id: &MessageId) -> Result<Option<MessageRecord>, MailError> {
        self.mail.get_by_id(id).await
    }

    pub async fn cursor(&self, chat: &ChatId) -> u32 {
        self.state.cursor(chat).await
    }
}
