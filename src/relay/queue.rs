use std::collections::VecDeque;

use log::debug;

use crate::bot::markup::Markup;
use crate::daemon::notifier::Notifier;
use crate::domain::chat::ChatId;
use crate::domain::email::{MessageId, MessageRecord};
use crate::relay::RelayState;

/// Per-chat state: pending deliveries in discovery order and the page cursor.
#[derive(Debug, Default)]
pub struct ChatState {
    queue: VecDeque<MessageRecord>,
    cursor: u32,
}

impl ChatState {
    /// Append in order. No dedup here; the seen-set upstream handles that.
    pub fn enqueue(&mut self, records: impl IntoIterator<Item = MessageRecord>) {
        self.queue.extend(records);
    }

    /// Pop the head. The caller owns delivering it; there is no undo.
    pub fn dispatch_next(&mut self) -> Option<MessageRecord> {
        self.queue.pop_front()
    }

    pub fn remaining_count(&self) -> usize {
        self.queue.len()
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn set_cursor(&mut self, page: u32) {
        self.cursor = page;
    }
}

/// Result of one dispatch opportunity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Sent { id: MessageId, remaining: usize },
    Empty,
}

/// Pop and send one record while holding the chat lock, so nothing else can
/// enqueue or dispatch for this chat until the send has finished.
async fn dispatch_locked(
    state: &mut ChatState,
    notifier: &Notifier,
    chat: &ChatId,
) -> Dispatch {
    let Some(record) = state.dispatch_next() else {
        return Dispatch::Empty;
    };
    let remaining = state.remaining_count();
    debug!("chat {chat}: dispatching {} ({remaining} left)", record.id);

    notifier
        .deliver(chat, &record, Markup::continuation(remaining))
        .await;
    Dispatch::Sent {
        id: record.id,
        remaining,
    }
}

/// Send the next queued record for `chat`, if any.
pub async fn deliver_next(state: &RelayState, notifier: &Notifier, chat: &ChatId) -> Dispatch {
    let slot = state.chat(chat);
    let mut guard = slot.lock().await;
    dispatch_locked(&mut guard, notifier, chat).await
}

/// Enqueue `records` and send the queue head in one critical section.
pub async fn enqueue_and_deliver(
    state: &RelayState,
    notifier: &Notifier,
    chat: &ChatId,
    records: Vec<MessageRecord>,
) -> Dispatch {
    let slot = state.chat(chat);
    let mut guard = slot.lock().await;
    guard.enqueue(records);
    dispatch_locked(&mut guard, notifier, chat).await
}
