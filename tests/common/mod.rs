#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mail_relay::bot::ChatDelivery;
use mail_relay::bot::markup::Markup;
use mail_relay::daemon::Poller;
use mail_relay::domain::{Attachment, ChatId, MessageId, MessageRecord, Profile};
use mail_relay::error::{DeliveryError, MailError};
use mail_relay::mail::MailAccessor;
use mail_relay::relay::router::InteractionRouter;
use mail_relay::relay::{RelaySettings, RelayState, Services};
use mail_relay::store::{SqliteUserStore, UserDirectory};

pub const PASSWORD: &str = "secret123";
pub const ALICE: &str = "100";
pub const BOB: &str = "200";

pub fn record(id: u32) -> MessageRecord {
    MessageRecord {
        id: MessageId::from(id),
        subject: format!("Subject {id}"),
        sender: format!("Sender {id} <s{id}@example.com>"),
        date: "Mon, 1 Jan 2024 10:00:00 +0000".to_string(),
        body: format!("body of {id}"),
        attachments: vec![],
    }
}

pub fn record_with_attachment(id: u32, filename: &str) -> MessageRecord {
    let mut rec = record(id);
    rec.attachments.push(Attachment::new(filename, vec![1, 2, 3]));
    rec
}

/// In-memory mailbox. `mailbox` is in arrival order (oldest first).
#[derive(Default)]
pub struct MockMail {
    pub unseen: Mutex<Vec<MessageRecord>>,
    pub mailbox: Mutex<Vec<MessageRecord>>,
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
    /// Ids flagged seen, in call order. The unseen list is not filtered by it.
    pub marked: Mutex<Vec<MessageId>>,
    pub failing_mark: AtomicBool,
}

impl MockMail {
    pub fn with_mailbox(count: u32) -> Self {
        let mail = Self::default();
        *mail.mailbox.lock().unwrap() = (1..=count).map(record).collect();
        mail
    }

    pub fn set_unseen(&self, records: Vec<MessageRecord>) {
        *self.unseen.lock().unwrap() = records;
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_marking(&self, on: bool) {
        self.failing_mark.store(on, Ordering::SeqCst);
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    fn enter(&self) -> Result<(), MailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Timeout(Duration::from_secs(1)));
        }
        Ok(())
    }
}

fn newest(records: &[MessageRecord], limit: usize) -> Vec<MessageRecord> {
    let start = records.len().saturating_sub(limit);
    records[start..].to_vec()
}

#[async_trait]
impl MailAccessor for MockMail {
    async fn list_unseen(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError> {
        self.enter()?;
        Ok(newest(&self.unseen.lock().unwrap(), limit))
    }

    async fn list_all(&self, limit: usize) -> Result<Vec<MessageRecord>, MailError> {
        self.enter()?;
        Ok(newest(&self.mailbox.lock().unwrap(), limit))
    }

    async fn list_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<MessageRecord>, usize), MailError> {
        self.enter()?;
        let mailbox = self.mailbox.lock().unwrap();
        let entries = mailbox
            .iter()
            .rev()
            .skip(page as usize * page_size as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok((entries, mailbox.len()))
    }

    async fn get_by_id(&self, id: &MessageId) -> Result<Option<MessageRecord>, MailError> {
        self.enter()?;
        Ok(self
            .mailbox
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.id == id)
            .cloned())
    }

    async fn mark_seen(&self, ids: &[MessageId]) -> Result<(), MailError> {
        self.enter()?;
        if self.failing_mark.load(Ordering::SeqCst) {
            return Err(MailError::Unavailable("STORE rejected".into()));
        }
        self.marked.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat: ChatId,
        text: String,
        markup: Option<Markup>,
    },
    Document {
        chat: ChatId,
        filename: String,
        caption: Option<String>,
    },
    Answer {
        interaction: String,
        text: Option<String>,
    },
}

/// Records everything the relay sends.
#[derive(Default)]
pub struct MockDelivery {
    pub sent: Mutex<Vec<Sent>>,
    pub failing: AtomicBool,
    /// Per-chat latency applied before a text or document is recorded.
    pub slow: Mutex<HashMap<ChatId, Duration>>,
}

impl MockDelivery {
    pub fn all(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// `(text, markup)` of every text message sent to `chat`, in order.
    pub fn texts_to(&self, chat: &str) -> Vec<(String, Option<Markup>)> {
        self.all()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text, markup } if c.as_str() == chat => Some((text, markup)),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat: &str) -> (String, Option<Markup>) {
        self.texts_to(chat).pop().expect("no text sent to chat")
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.all()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Answer { interaction, text } => Some((interaction, text)),
                _ => None,
            })
            .collect()
    }

    pub fn set_slow(&self, chat: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(ChatId::new(chat), delay);
    }

    async fn lag(&self, chat: &ChatId) {
        let delay = self.slow.lock().unwrap().get(chat).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Api("Bad Request: chat not found".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatDelivery for MockDelivery {
    async fn send_text(
        &self,
        chat: &ChatId,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), DeliveryError> {
        self.lag(chat).await;
        self.check()?;
        self.sent.lock().unwrap().push(Sent::Text {
            chat: chat.clone(),
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat: &ChatId,
        _data: &[u8],
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.lag(chat).await;
        self.check()?;
        self.sent.lock().unwrap().push(Sent::Document {
            chat: chat.clone(),
            filename: filename.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(())
    }

    async fn answer_interaction(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(Sent::Answer {
            interaction: interaction_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

/// Everything wired together over the mocks and an in-memory user store.
pub struct Harness {
    pub state: Arc<RelayState>,
    pub mail: Arc<MockMail>,
    pub delivery: Arc<MockDelivery>,
    pub users: Arc<SqliteUserStore>,
    pub settings: RelaySettings,
}

impl Harness {
    pub fn new(mail: MockMail) -> Self {
        Self {
            state: Arc::new(RelayState::new()),
            mail: Arc::new(mail),
            delivery: Arc::new(MockDelivery::default()),
            users: Arc::new(SqliteUserStore::open_in_memory(PASSWORD).unwrap()),
            settings: RelaySettings {
                allowed_chats: vec![ChatId::new(ALICE), ChatId::new(BOB)],
                ..RelaySettings::default()
            },
        }
    }

    pub fn services(&self) -> Services {
        Services {
            mail: self.mail.clone(),
            delivery: self.delivery.clone(),
            users: self.users.clone(),
        }
    }

    pub fn router(&self) -> InteractionRouter {
        InteractionRouter::new(self.state.clone(), self.services(), self.settings.clone())
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            self.state.clone(),
            self.services(),
            self.settings.clone(),
            Duration::from_secs(30),
        )
    }

    pub fn register(&self, chat: &str) {
        self.users
            .register(&ChatId::new(chat), &Profile::default())
            .unwrap();
    }

    pub fn is_registered(&self, chat: &str) -> bool {
        self.users.is_registered(&ChatId::new(chat)).unwrap()
    }
}
