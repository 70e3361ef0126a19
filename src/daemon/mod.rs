pub mod notifier;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinSet;

use crate::bot::markup::Markup;
use crate::bot::templates;
use crate::daemon::notifier::Notifier;
use crate::domain::chat::ChatId;
use crate::domain::email::{MessageId, MessageRecord};
use crate::error::MailError;
use crate::mail::MailAccessor;
use crate::relay::queue::{self, Dispatch};
use crate::relay::{RelaySettings, RelayState, Services};

/// Granularity at which the idle wait notices a shutdown request.
const SHUTDOWN_TICK: Duration = Duration::from_millis(500);

/// Query unseen mail and keep only ids not observed before in this process.
pub async fn collect_new(
    state: &RelayState,
    mail: &dyn MailAccessor,
    limit: usize,
) -> Result<Vec<MessageRecord>, MailError> {
    let unseen = mail.list_unseen(limit).await?;
    Ok(state.take_unseen(unseen))
}

/// Flag `records` as read on the server once they sit in the delivery
/// queues. On failure they come back as unseen after a restart.
pub async fn mark_seen(mail: &dyn MailAccessor, records: &[MessageRecord]) {
    let ids: Vec<MessageId> = records.iter().map(|r| r.id.clone()).collect();
    if let Err(e) = mail.mark_seen(&ids).await {
        warn!("could not mark {} message(s) seen: {e}", ids.len());
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub recipients: usize,
    pub new_messages: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BroadcastReport {
    pub users: usize,
    pub emails_sent: usize,
}

pub struct Poller {
    state: Arc<RelayState>,
    services: Services,
    settings: RelaySettings,
    notifier: Notifier,
    interval: Duration,
}

impl Poller {
    pub fn new(
        state: Arc<RelayState>,
        services: Services,
        settings: RelaySettings,
        interval: Duration,
    ) -> Self {
        let notifier = Notifier::new(Arc::clone(&services.delivery));
        Self {
            state,
            services,
            settings,
            notifier,
            interval,
        }
    }

    /// Allow-listed chats that have passed the password gate.
    pub fn recipients(&self) -> Vec<ChatId> {
        self.settings
            .allowed_chats
            .iter()
            .filter(|chat| match self.services.users.is_registered(chat) {
                Ok(registered) => registered,
                Err(e) => {
                    warn!("chat {chat}: registration lookup failed: {e}");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Enqueue `records` for every chat and send one head per chat, in parallel.
    async fn fan_out(&self, recipients: &[ChatId], records: &[MessageRecord]) {
        let mut tasks = JoinSet::new();
        for chat in recipients {
            let state = Arc::clone(&self.state);
            let notifier = self.notifier.clone();
            let chat = chat.clone();
            let records = records.to_vec();
            tasks.spawn(async move {
                let sent = queue::enqueue_and_deliver(&state, &notifier, &chat, records).await;
                (chat, sent)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((chat, Dispatch::Sent { id, remaining })) => {
                    debug!("chat {chat}: sent {id}, {remaining} queued")
                }
                Ok((chat, Dispatch::Empty)) => debug!("chat {chat}: nothing to send"),
                Err(e) => error!("delivery task failed: {e}"),
            }
        }
    }

    /// One poll cycle. A no-op (no mailbox call) when nobody can receive mail.
    pub async fn poll_once(&self) -> Result<PollReport, MailError> {
        let recipients = self.recipients();
        if recipients.is_empty() {
            debug!("no registered recipients; skipping poll");
            return Ok(PollReport::default());
        }

        let fresh = collect_new(
            &self.state,
            self.services.mail.as_ref(),
            self.settings.unseen_batch,
        )
        .await?;
        if fresh.is_empty() {
            return Ok(PollReport {
                recipients: recipients.len(),
                new_messages: 0,
            });
        }

        info!(
            "{} new message(s) for {} chat(s)",
            fresh.len(),
            recipients.len()
        );
        self.fan_out(&recipients, &fresh).await;
        mark_seen(self.services.mail.as_ref(), &fresh).await;
        Ok(PollReport {
            recipients: recipients.len(),
            new_messages: fresh.len(),
        })
    }

    /// Deliver everything still queued for the recipients and return how many
    /// records went out. One-shot runs call this before exiting.
    pub async fn flush(&self) -> usize {
        let mut sent = 0;
        for chat in self.recipients() {
            while let Dispatch::Sent { .. } =
                queue::deliver_next(&self.state, &self.notifier, &chat).await
            {
                sent += 1;
            }
        }
        sent
    }

    /// Queue the latest messages for every recipient regardless of seen
    /// state, then post a summary with the main menu.
    pub async fn broadcast_recent(&self) -> Result<BroadcastReport, MailError> {
        let recipients = self.recipients();
        if recipients.is_empty() {
            return Ok(BroadcastReport::default());
        }

        let latest = self
            .services
            .mail
            .list_all(self.settings.recent_batch)
            .await?;
        if latest.is_empty() {
            return Ok(BroadcastReport {
                users: recipients.len(),
                emails_sent: 0,
            });
        }

        self.fan_out(&recipients, &latest).await;
        let summary = templates::mail_found(latest.len());
        for chat in &recipients {
            if let Err(e) = self
                .services
                .delivery
                .send_text(chat, &summary, Some(Markup::MainMenu))
                .await
            {
                warn!("chat {chat}: summary not sent: {e}");
            }
        }

        Ok(BroadcastReport {
            users: recipients.len(),
            emails_sent: latest.len(),
        })
    }

    /// Poll until `running` is cleared. Cycle failures are logged and the
    /// next cycle runs after the usual interval.
    pub async fn run(&self, running: Arc<AtomicBool>) {
        info!("checking mail every {}s", self.interval.as_secs());

        while running.load(Ordering::SeqCst) {
            match self.poll_once().await {
                Ok(report) if report.new_messages > 0 => debug!("poll: {report:?}"),
                Ok(_) => {}
                Err(e) => error!("poll cycle failed: {e}"),
            }
            idle(self.interval, &running).await;
        }

        info!("poller stopped");
    }
}

async fn idle(total: Duration, running: &AtomicBool) {
    let mut left = total;
    while !left.is_zero() && running.load(Ordering::SeqCst) {
        let step = left.min(SHUTDOWN_TICK);
        tokio::time::sleep(step).await;
        left = left.saturating_sub(step);
    }
}
