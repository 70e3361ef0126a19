pub mod decoders;
pub mod imap_client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::email::{MessageId, MessageRecord};
use crate::error::MailError;
use crate::mail::imap_client::ImapClient;

/// Read access to the mailbox, as structured records.
#[async_trait]
pub trait MailAccessor: Send + Sync {
    /// Up to `limit` of the newest unseen messages, oldest first.
    async fn list_unseen(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError>;

    /// Up to `limit` of the newest messages, in mailbox order (newest last).
    async fn list_all(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError>;

    /// One newest-first page and the total number of messages in the mailbox.
    async fn list_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<MessageRecord>, usize), MailError>;

    async fn get_by_id(&self, id: &MessageId) -> Result<Option<MessageRecord>, MailError>;

    /// Flag messages as read on the server. Listing never does this itself.
    async fn mark_seen(&self, ids: &[MessageId]) -> Result<(), MailError>;
}

/// [`MailAccessor`] over the blocking [`ImapClient`]: each call runs on the
/// blocking pool and is abandoned once `timeout` elapses.
pub struct ImapMailAccessor {
    client: Arc<ImapClient>,
    timeout: Duration,
}

impl ImapMailAccessor {
    pub fn new(client: ImapClient, timeout: Duration) -> Self {
        Self {
            client: Arc::new(client),
            timeout,
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, MailError>
    where
        T: Send + 'static,
        F: FnOnce(&ImapClient) -> anyhow::Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let task = tokio::task::spawn_blocking(move || op(&client));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_elapsed) => Err(MailError::Timeout(self.timeout)),
            Ok(Err(join)) => Err(MailError::Unavailable(format!("IMAP task failed: {join}"))),
            Ok(Ok(Err(e))) => Err(MailError::Unavailable(format!("{e:#}"))),
            Ok(Ok(Ok(v))) => Ok(v),
        }
    }
}

#[async_trait]
impl MailAccessor for ImapMailAccessor {
    async fn list_unseen(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError> {
        self.run(move |c| c.fetch_unseen(limit)).await
    }

    async fn list_all(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError> {
        self.run(move |c| c.fetch_latest(limit)).await
    }

    async fn list_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<MessageRecord>, usize), MailError> {
        self.run(move |c| c.fetch_page(page, page_size)).await
    }

    async fn get_by_id(&self, id: &MessageId) -> Result<Option<MessageRecord>, MailError> {
        let id = id.clone();
        self.run(move |c| c.fetch_by_id(&id)).await
    }

    async fn mark_seen(&self, ids: &[MessageId]) -> Result<(), MailError> {
        let ids = ids.to_vec();
        self.run(move |c| c.mark_seen(&ids)).await
    }
}
