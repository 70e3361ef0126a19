//! Process-scoped relay state shared by the poller and the interaction router.
//!
//! Each chat owns a [`ChatState`] (delivery queue plus page cursor) behind its
//! own async mutex, so work for one chat is serialized while different chats
//! proceed independently. Nothing here is persisted; a restart starts from
//! empty queues, page 0 and an empty seen-set.

pub mod intent;
pub mod paginator;
pub mod queue;
pub mod router;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bot::ChatDelivery;
use crate::domain::chat::ChatId;
use crate::domain::email::{MessageId, MessageRecord};
use crate::mail::MailAccessor;
use crate::store::repo::UserDirectory;

pub use queue::ChatState;

/// The three external collaborators the core talks to.
#[derive(Clone)]
pub struct Services {
    pub mail: Arc<dyn MailAccessor>,
    pub delivery: Arc<dyn ChatDelivery>,
    pub users: Arc<dyn UserDirectory>,
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub allowed_chats: Vec<ChatId>,
    pub page_size: u32,
    /// Max unseen messages taken per check.
    pub unseen_batch: usize,
    /// How many of the latest messages a broadcast sends.
    pub recent_batch: usize,
}

impl RelaySettings {
    pub fn is_allowed(&self, chat: &ChatId) -> bool {
        self.allowed_chats.contains(chat)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            allowed_chats: Vec::new(),
            page_size: 10,
            unseen_batch: 5,
            recent_batch: 10,
        }
    }
}

type ChatSlot = Arc<tokio::sync::Mutex<ChatState>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct RelayState {
    chats: Mutex<HashMap<ChatId, ChatSlot>>,
    seen: Mutex<HashSet<MessageId>>,
    awaiting_password: Mutex<HashSet<ChatId>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat's state slot, created on first use. Lock it to read or mutate.
    pub fn chat(&self, chat: &ChatId) -> ChatSlot {
        let mut chats = lock(&self.chats);
        Arc::clone(chats.entry(chat.clone()).or_default())
    }

    fn existing(&self, chat: &ChatId) -> Option<ChatSlot> {
        lock(&self.chats).get(chat).cloned()
    }

    pub fn has_chat_state(&self, chat: &ChatId) -> bool {
        lock(&self.chats).contains_key(chat)
    }

    pub async fn remaining_count(&self, chat: &ChatId) -> usize {
        match self.existing(chat) {
            Some(slot) => slot.lock().await.remaining_count(),
            None => 0,
        }
    }

    pub async fn enqueue(&self, chat: &ChatId, records: Vec<MessageRecord>) {
        self.chat(chat).lock().await.enqueue(records);
    }

    /// Last list page requested by the chat; 0 if it never listed.
    pub async fn cursor(&self, chat: &ChatId) -> u32 {
        match self.existing(chat) {
            Some(slot) => slot.lock().await.cursor(),
            None => 0,
        }
    }

    /// Drop records whose id was already observed and remember the rest.
    pub fn take_unseen(&self, records: Vec<MessageRecord>) -> Vec<MessageRecord> {
        let mut seen = lock(&self.seen);
        records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    }

    pub fn is_awaiting_password(&self, chat: &ChatId) -> bool {
        lock(&self.awaiting_password).contains(chat)
    }

    pub fn set_awaiting_password(&self, chat: &ChatId) {
        lock(&self.awaiting_password).insert(chat.clone());
    }

    pub fn clear_awaiting_password(&self, chat: &ChatId) {
        lock(&self.awaiting_password).remove(chat);
    }
}
