//! Inbound event handling: allow-list, password gate, then mailbox actions.
//!
//! Per chat the router walks `unknown → unregistered → awaiting password →
//! registered`. Registration is durable (user directory); the awaiting flag
//! lives in [`RelayState`] and is re-armed by the next event after a restart.

use std::sync::Arc;

use log::{error, info, warn};

use crate::bot::markup::Markup;
use crate::bot::templates;
use crate::daemon::{collect_new, mark_seen};
use crate::daemon::notifier::Notifier;
use crate::domain::chat::{Ack, ChatId, EventKind, InboundEvent, Profile};
use crate::domain::email::MessageId;
use crate::relay::intent::{Action, Command};
use crate::relay::paginator::Paginator;
use crate::relay::queue::{self, Dispatch};
use crate::relay::{RelaySettings, RelayState, Services};

pub struct InteractionRouter {
    state: Arc<RelayState>,
    services: Services,
    settings: RelaySettings,
    notifier: Notifier,
    paginator: Paginator,
}

/// Where replies go: a button press also owes a quick-ack.
struct Reply<'a> {
    chat: &'a ChatId,
    interaction: Option<&'a str>,
}

impl InteractionRouter {
    pub fn new(state: Arc<RelayState>, services: Services, settings: RelaySettings) -> Self {
        let notifier = Notifier::new(Arc::clone(&services.delivery));
        let paginator = Paginator::new(Arc::clone(&services.mail), Arc::clone(&state));
        Self {
            state,
            services,
            settings,
            notifier,
            paginator,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Ack {
        let reply = Reply {
            chat: &event.chat,
            interaction: event.interaction_id(),
        };

        if !self.settings.is_allowed(&event.chat) {
            info!("chat {} is not allowed", event.chat);
            return self.deny(&event, &reply).await;
        }

        let registered = match self.services.users.is_registered(&event.chat) {
            Ok(registered) => registered,
            Err(e) => {
                error!("chat {}: registration lookup failed: {e}", event.chat);
                self.answer(&reply, None).await;
                return Ack::Unauthorized;
            }
        };
        if !registered {
            return self.gate(&event, &reply).await;
        }

        match &event.kind {
            EventKind::Command(text) => self.on_command(&reply, Command::parse(text)).await,
            EventKind::Callback { data, .. } => match Action::parse(data) {
                Some(action) => self.on_action(&reply, action).await,
                None => {
                    warn!("chat {}: unknown callback data {data:?}", event.chat);
                    self.answer(&reply, None).await;
                    Ack::Ok
                }
            },
            EventKind::Text(_) => {
                self.say(reply.chat, templates::USE_BUTTONS, Some(Markup::MainMenu))
                    .await;
                Ack::Ok
            }
        }
    }

    async fn deny(&self, event: &InboundEvent, reply: &Reply<'_>) -> Ack {
        match &event.kind {
            EventKind::Command(_) => {
                self.say(reply.chat, &templates::no_access(reply.chat), None)
                    .await
            }
            EventKind::Callback { .. } => {
                self.answer(reply, Some(templates::NO_ACCESS_SHORT)).await
            }
            EventKind::Text(_) => {}
        }
        Ack::Unauthorized
    }

    /// Unregistered chats: free text while awaiting is a password attempt,
    /// anything else (re)starts the prompt without running its action.
    async fn gate(&self, event: &InboundEvent, reply: &Reply<'_>) -> Ack {
        let chat = reply.chat;
        match &event.kind {
            EventKind::Text(candidate) if self.state.is_awaiting_password(chat) => {
                self.try_password(chat, candidate, &event.profile).await
            }
            _ => {
                self.request_password(chat, &event.profile);
                self.answer(reply, Some(templates::AUTH_REQUIRED_SHORT))
                    .await;
                self.say(chat, templates::AUTH_REQUIRED, None).await;
                Ack::Unauthorized
            }
        }
    }

    fn request_password(&self, chat: &ChatId, profile: &Profile) {
        if let Err(e) = self.services.users.create_unregistered(chat, profile) {
            error!("chat {chat}: could not record first contact: {e}");
        }
        self.state.set_awaiting_password(chat);
    }

    async fn try_password(&self, chat: &ChatId, candidate: &str, profile: &Profile) -> Ack {
        if !self.services.users.check_password(candidate) {
            warn!("chat {chat}: wrong password");
            self.say(chat, templates::AUTH_FAILED, None).await;
            return Ack::Unauthorized;
        }

        if let Err(e) = self.services.users.register(chat, profile) {
            error!("chat {chat}: registration failed: {e}");
            self.say(chat, templates::AUTH_FAILED, None).await;
            return Ack::Unauthorized;
        }

        self.state.clear_awaiting_password(chat);
        info!("chat {chat} registered");
        self.say(chat, templates::AUTH_SUCCESS, Some(Markup::MainMenu))
            .await;
        Ack::Ok
    }

    async fn on_command(&self, reply: &Reply<'_>, command: Command) -> Ack {
        let chat = reply.chat;
        match command {
            Command::Start => {
                self.say(chat, templates::WELCOME, Some(Markup::MainMenu))
                    .await;
                Ack::Ok
            }
            Command::Check => self.check_new(reply).await,
            Command::Mail => self.show_page(reply, 0).await,
            Command::Queue => {
                let count = self.state.remaining_count(chat).await;
                self.say(chat, &templates::queue_status(count), None).await;
                Ack::Ok
            }
            Command::Help | Command::Unknown(_) => {
                self.say(chat, templates::HELP, Some(Markup::MainMenu))
                    .await;
                Ack::Ok
            }
        }
    }

    async fn on_action(&self, reply: &Reply<'_>, action: Action) -> Ack {
        let chat = reply.chat;
        match action {
            Action::CheckMail => self.check_new(reply).await,
            Action::OpenPage(page) => self.show_page(reply, page).await,
            Action::OpenMessage(id) => self.open_message(reply, &id).await,
            Action::Menu => {
                self.answer(reply, None).await;
                self.say(chat, templates::MAIN_MENU, Some(Markup::MainMenu))
                    .await;
                Ack::Ok
            }
            Action::NextMessage => {
                let remaining = self.state.remaining_count(chat).await;
                if remaining == 0 {
                    self.answer(reply, Some(templates::NO_NEW_MAIL)).await;
                    return Ack::Ok;
                }
                self.answer(reply, None).await;
                if queue::deliver_next(&self.state, &self.notifier, chat).await == Dispatch::Empty
                {
                    // drained by a concurrent dispatch between the check and the pop
                    self.say(chat, templates::NO_NEW_MAIL, None).await;
                }
                Ack::Ok
            }
            Action::Noop => {
                self.answer(reply, None).await;
                Ack::Ok
            }
        }
    }

    /// On-demand variant of a poll cycle, for this chat only.
    async fn check_new(&self, reply: &Reply<'_>) -> Ack {
        let chat = reply.chat;
        let fresh = match collect_new(
            &self.state,
            self.services.mail.as_ref(),
            self.settings.unseen_batch,
        )
        .await
        {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("chat {chat}: checking mail failed: {e}");
                Vec::new()
            }
        };

        if fresh.is_empty() {
            self.notice(reply, templates::NO_NEW_MAIL).await;
            return Ack::Ok;
        }

        self.answer(reply, Some(&templates::mail_found(fresh.len())))
            .await;
        queue::enqueue_and_deliver(&self.state, &self.notifier, chat, fresh.clone()).await;
        mark_seen(self.services.mail.as_ref(), &fresh).await;
        Ack::Ok
    }

    async fn show_page(&self, reply: &Reply<'_>, page: u32) -> Ack {
        let chat = reply.chat;
        let page_size = self.settings.page_size;
        let listing = match self.paginator.list_page(chat, page, page_size).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("chat {chat}: listing page {page} failed: {e}");
                self.notice(reply, templates::NO_MAIL_FOUND).await;
                return Ack::Ok;
            }
        };

        if listing.entries.is_empty() {
            self.notice(reply, templates::NO_MAIL_FOUND).await;
            return Ack::NotFound;
        }

        self.answer(reply, None).await;
        let text = templates::format_list(
            &listing.entries,
            listing.page,
            listing.page_size,
            listing.total_pages,
            listing.total_count,
        );
        let markup = Markup::MessageList {
            page: listing.page,
            page_size: listing.page_size,
            total_pages: listing.total_pages,
            ids: listing.entries.iter().map(|r| r.id.clone()).collect(),
        };
        self.say(chat, &text, Some(markup)).await;
        Ack::Ok
    }

    async fn open_message(&self, reply: &Reply<'_>, id: &MessageId) -> Ack {
        let chat = reply.chat;
        let record = match self.paginator.get_by_id(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.notice(reply, templates::MESSAGE_NOT_FOUND).await;
                return Ack::NotFound;
            }
            Err(e) => {
                warn!("chat {chat}: fetching message {id} failed: {e}");
                self.notice(reply, templates::NO_MAIL_FOUND).await;
                return Ack::Ok;
            }
        };

        self.answer(reply, None).await;
        self.notifier.deliver(chat, &record, None).await;
        let page = self.paginator.cursor(chat).await;
        self.say(
            chat,
            templates::MESSAGE_ABOVE,
            Some(Markup::MessageView { page }),
        )
        .await;
        Ack::Ok
    }

    /// Short status: a toast for button presses, a message with the menu
    /// for commands.
    async fn notice(&self, reply: &Reply<'_>, text: &str) {
        if reply.interaction.is_some() {
            self.answer(reply, Some(text)).await;
        } else {
            self.say(reply.chat, text, Some(Markup::MainMenu)).await;
        }
    }

    async fn say(&self, chat: &ChatId, text: &str, markup: Option<Markup>) {
        if let Err(e) = self.services.delivery.send_text(chat, text, markup).await {
            error!("chat {chat}: send failed: {e}");
        }
    }

    /// Quick-ack; does nothing for events that are not button presses.
    async fn answer(&self, reply: &Reply<'_>, text: Option<&str>) {
        let Some(interaction) = reply.interaction else {
            return;
        };
        if let Err(e) = self
            .services
            .delivery
            .answer_interaction(interaction, text)
            .await
        {
            warn!("chat {}: quick-ack failed: {e}", reply.chat);
        }
    }
}
