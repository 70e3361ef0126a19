mod common;

use common::*;
use mail_relay::bot::markup::Markup;
use mail_relay::bot::templates;
use mail_relay::domain::{Ack, ChatId, InboundEvent, Profile};
use mail_relay::store::UserDirectory;

fn list_ids(markup: &Option<Markup>) -> Vec<String> {
    match markup {
        Some(Markup::MessageList { ids, .. }) => ids.iter().map(|id| id.to_string()).collect(),
        other => panic!("expected a message list, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_outside_allow_list_is_refused_without_side_effects() {
    let h = Harness::new(MockMail::with_mailbox(3));
    let router = h.router();

    let ack = router.handle(InboundEvent::command("999", "/mail")).await;
    assert_eq!(ack, Ack::Unauthorized);
    let (text, markup) = h.delivery.last_text_to("999");
    assert!(text.contains("No access"));
    assert!(text.contains("999"));
    assert_eq!(markup, None);

    let ack = router
        .handle(InboundEvent::callback("999", "cb1", "check_mail"))
        .await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(
        h.delivery.answers(),
        vec![("cb1".to_string(), Some(templates::NO_ACCESS_SHORT.to_string()))]
    );

    let ack = router.handle(InboundEvent::text("999", "hello")).await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(h.delivery.texts_to("999").len(), 1);

    let chat = ChatId::new("999");
    assert_eq!(h.mail.calls(), 0);
    assert!(!h.state.has_chat_state(&chat));
    assert!(!h.state.is_awaiting_password(&chat));
    assert_eq!(h.users.get_user(&chat).unwrap(), None);
}

#[tokio::test]
async fn unregistered_chat_is_prompted_before_any_mail_access() {
    let h = Harness::new(MockMail::with_mailbox(3));
    let router = h.router();

    let ack = router.handle(InboundEvent::command(ALICE, "/mail")).await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(h.delivery.last_text_to(ALICE).0, templates::AUTH_REQUIRED);
    assert!(h.state.is_awaiting_password(&ChatId::new(ALICE)));

    let ack = router
        .handle(InboundEvent::callback(ALICE, "cb1", "mail_0"))
        .await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(
        h.delivery.answers(),
        vec![(
            "cb1".to_string(),
            Some(templates::AUTH_REQUIRED_SHORT.to_string())
        )]
    );

    assert_eq!(h.mail.calls(), 0);
    let user = h.users.get_user(&ChatId::new(ALICE)).unwrap().unwrap();
    assert!(!user.is_registered);
}

#[tokio::test]
async fn password_is_trimmed_but_case_sensitive() {
    let h = Harness::new(MockMail::default());
    let router = h.router();
    router.handle(InboundEvent::command(ALICE, "/start")).await;

    let ack = router.handle(InboundEvent::text(ALICE, "SECRET123")).await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(h.delivery.last_text_to(ALICE).0, templates::AUTH_FAILED);
    assert!(!h.is_registered(ALICE));
    assert!(h.state.is_awaiting_password(&ChatId::new(ALICE)));

    let profile = Profile {
        name: "Alice Liddell".into(),
        firstname: Some("Alice".into()),
        username: Some("alice".into()),
    };
    let ack = router
        .handle(InboundEvent::text(ALICE, "  secret123 \n").with_profile(profile))
        .await;
    assert_eq!(ack, Ack::Ok);
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::AUTH_SUCCESS.to_string(), Some(Markup::MainMenu))
    );
    assert!(h.is_registered(ALICE));
    assert!(!h.state.is_awaiting_password(&ChatId::new(ALICE)));

    let user = h.users.get_user(&ChatId::new(ALICE)).unwrap().unwrap();
    assert_eq!(user.name, "Alice Liddell");
    assert_eq!(user.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn registration_is_per_chat() {
    let h = Harness::new(MockMail::default());
    let router = h.router();
    router.handle(InboundEvent::command(ALICE, "/start")).await;
    router.handle(InboundEvent::text(ALICE, PASSWORD)).await;

    let ack = router.handle(InboundEvent::command(BOB, "/check")).await;
    assert_eq!(ack, Ack::Unauthorized);
    assert!(h.is_registered(ALICE));
    assert!(!h.is_registered(BOB));
}

#[tokio::test]
async fn free_text_without_prompt_starts_registration() {
    let h = Harness::new(MockMail::default());
    let router = h.router();

    // password sent before being asked is not accepted
    let ack = router.handle(InboundEvent::text(ALICE, PASSWORD)).await;
    assert_eq!(ack, Ack::Unauthorized);
    assert_eq!(h.delivery.last_text_to(ALICE).0, templates::AUTH_REQUIRED);
    assert!(!h.is_registered(ALICE));

    let ack = router.handle(InboundEvent::text(ALICE, PASSWORD)).await;
    assert_eq!(ack, Ack::Ok);
}

#[tokio::test]
async fn browsing_pages_tracks_the_cursor() {
    let h = Harness::new(MockMail::with_mailbox(25));
    h.register(ALICE);
    let router = h.router();
    let alice = ChatId::new(ALICE);

    let ack = router.handle(InboundEvent::command(ALICE, "/mail")).await;
    assert_eq!(ack, Ack::Ok);
    let (text, markup) = h.delivery.last_text_to(ALICE);
    assert!(text.contains("page 1/3"));
    assert!(text.contains("total: 25"));
    assert_eq!(list_ids(&markup).first().map(String::as_str), Some("25"));
    assert_eq!(list_ids(&markup).len(), 10);
    assert!(matches!(
        markup,
        Some(Markup::MessageList { page: 0, total_pages: 3, .. })
    ));

    let ack = router
        .handle(InboundEvent::callback(ALICE, "cb2", "mail_2"))
        .await;
    assert_eq!(ack, Ack::Ok);
    let (_, markup) = h.delivery.last_text_to(ALICE);
    assert_eq!(list_ids(&markup), vec!["5", "4", "3", "2", "1"]);
    assert_eq!(h.state.cursor(&alice).await, 2);

    let before = h.delivery.texts_to(ALICE).len();
    let ack = router
        .handle(InboundEvent::callback(ALICE, "cb3", "mail_3"))
        .await;
    assert_eq!(ack, Ack::NotFound);
    assert_eq!(h.delivery.texts_to(ALICE).len(), before);
    assert_eq!(
        h.delivery.answers().last(),
        Some(&("cb3".to_string(), Some(templates::NO_MAIL_FOUND.to_string())))
    );
    // a page past the end still becomes the cursor
    assert_eq!(h.state.cursor(&alice).await, 3);
}

#[tokio::test]
async fn mailbox_failure_degrades_and_keeps_the_cursor() {
    let h = Harness::new(MockMail::with_mailbox(25));
    h.register(ALICE);
    let router = h.router();
    router
        .handle(InboundEvent::callback(ALICE, "cb1", "mail_1"))
        .await;

    h.mail.fail(true);
    let ack = router.handle(InboundEvent::command(ALICE, "/mail")).await;
    assert_eq!(ack, Ack::Ok);
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::NO_MAIL_FOUND.to_string(), Some(Markup::MainMenu))
    );
    assert_eq!(h.state.cursor(&ChatId::new(ALICE)).await, 1);
}

#[tokio::test]
async fn opened_message_links_back_to_the_current_page() {
    let h = Harness::new(MockMail::with_mailbox(25));
    h.register(ALICE);
    let router = h.router();
    router
        .handle(InboundEvent::callback(ALICE, "cb1", "mail_1"))
        .await;
    h.delivery.clear();

    let ack = router
        .handle(InboundEvent::callback(ALICE, "cb2", "email_12"))
        .await;
    assert_eq!(ack, Ack::Ok);
    let texts = h.delivery.texts_to(ALICE);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].0.contains("Subject 12"));
    assert_eq!(
        texts[1],
        (
            templates::MESSAGE_ABOVE.to_string(),
            Some(Markup::MessageView { page: 1 })
        )
    );
    assert_eq!(h.state.cursor(&ChatId::new(ALICE)).await, 1);

    let ack = router
        .handle(InboundEvent::callback(ALICE, "cb3", "email_999"))
        .await;
    assert_eq!(ack, Ack::NotFound);
    assert_eq!(
        h.delivery.answers().last(),
        Some(&(
            "cb3".to_string(),
            Some(templates::MESSAGE_NOT_FOUND.to_string())
        ))
    );
}

#[tokio::test]
async fn backlog_is_walked_with_the_next_button() {
    let h = Harness::new(MockMail::default());
    h.mail.set_unseen(vec![record(1), record(2), record(3)]);
    h.register(ALICE);
    let router = h.router();

    let ack = router.handle(InboundEvent::command(ALICE, "/check")).await;
    assert_eq!(ack, Ack::Ok);
    let (text, markup) = h.delivery.last_text_to(ALICE);
    assert!(text.contains("Subject 1"));
    assert_eq!(markup, Some(Markup::Continuation { remaining: 2 }));

    router
        .handle(InboundEvent::callback(ALICE, "n1", "next_email"))
        .await;
    let (text, markup) = h.delivery.last_text_to(ALICE);
    assert!(text.contains("Subject 2"));
    assert_eq!(markup, Some(Markup::Continuation { remaining: 1 }));

    router
        .handle(InboundEvent::callback(ALICE, "n2", "next_email"))
        .await;
    let (text, markup) = h.delivery.last_text_to(ALICE);
    assert!(text.contains("Subject 3"));
    assert_eq!(markup, None);

    let sent = h.delivery.texts_to(ALICE).len();
    router
        .handle(InboundEvent::callback(ALICE, "n3", "next_email"))
        .await;
    assert_eq!(h.delivery.texts_to(ALICE).len(), sent);
    assert_eq!(
        h.delivery.answers().last(),
        Some(&("n3".to_string(), Some(templates::NO_NEW_MAIL.to_string())))
    );

    // already seen in this process
    router.handle(InboundEvent::command(ALICE, "/check")).await;
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::NO_NEW_MAIL.to_string(), Some(Markup::MainMenu))
    );
}

#[tokio::test]
async fn check_button_acks_with_the_count() {
    let h = Harness::new(MockMail::default());
    h.mail.set_unseen(vec![record(7), record(8)]);
    h.register(ALICE);
    let router = h.router();

    router
        .handle(InboundEvent::callback(ALICE, "cb", "check_mail"))
        .await;
    assert_eq!(
        h.delivery.answers(),
        vec![("cb".to_string(), Some(templates::mail_found(2)))]
    );
    assert_eq!(h.state.remaining_count(&ChatId::new(ALICE)).await, 1);
    assert_eq!(h.mail.marked(), vec!["7", "8"]);
}

#[tokio::test]
async fn queue_command_reports_pending_count() {
    let h = Harness::new(MockMail::default());
    h.register(ALICE);
    let alice = ChatId::new(ALICE);
    h.state.enqueue(&alice, vec![record(1), record(2)]).await;
    let router = h.router();

    router.handle(InboundEvent::command(ALICE, "/queue")).await;
    assert_eq!(h.delivery.last_text_to(ALICE).0, templates::queue_status(2));
}

#[tokio::test]
async fn attachments_follow_the_message_text() {
    let h = Harness::new(MockMail::default());
    h.mail
        .set_unseen(vec![record_with_attachment(4, "report.pdf")]);
    h.register(ALICE);
    let router = h.router();

    router.handle(InboundEvent::command(ALICE, "/check")).await;
    let sent = h.delivery.all();
    assert_eq!(sent.len(), 2);
    assert!(matches!(&sent[0], Sent::Text { text, .. } if text.contains("report.pdf")));
    assert_eq!(
        sent[1],
        Sent::Document {
            chat: ChatId::new(ALICE),
            filename: "report.pdf".into(),
            caption: Some("📎 report.pdf".into()),
        }
    );
}

#[tokio::test]
async fn cosmetic_and_unknown_buttons_are_only_acknowledged() {
    let h = Harness::new(MockMail::with_mailbox(3));
    h.register(ALICE);
    let router = h.router();

    assert_eq!(
        router
            .handle(InboundEvent::callback(ALICE, "a", "noop"))
            .await,
        Ack::Ok
    );
    assert_eq!(
        router
            .handle(InboundEvent::callback(ALICE, "b", "bogus_token"))
            .await,
        Ack::Ok
    );
    assert_eq!(
        h.delivery.answers(),
        vec![("a".to_string(), None), ("b".to_string(), None)]
    );
    assert!(h.delivery.texts_to(ALICE).is_empty());
    assert_eq!(h.mail.calls(), 0);
}

#[tokio::test]
async fn commands_and_free_text_for_registered_chats() {
    let h = Harness::new(MockMail::default());
    h.register(ALICE);
    let router = h.router();

    router.handle(InboundEvent::command(ALICE, "/start")).await;
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::WELCOME.to_string(), Some(Markup::MainMenu))
    );

    router.handle(InboundEvent::command(ALICE, "/frobnicate")).await;
    assert_eq!(h.delivery.last_text_to(ALICE).0, templates::HELP);

    router.handle(InboundEvent::text(ALICE, "hi there")).await;
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::USE_BUTTONS.to_string(), Some(Markup::MainMenu))
    );

    router
        .handle(InboundEvent::callback(ALICE, "m", "menu"))
        .await;
    assert_eq!(
        h.delivery.last_text_to(ALICE),
        (templates::MAIN_MENU.to_string(), Some(Markup::MainMenu))
    );
}

#[tokio::test]
async fn failed_send_still_consumes_the_queue_head() {
    let h = Harness::new(MockMail::default());
    h.mail.set_unseen(vec![record(1), record(2)]);
    h.register(ALICE);
    let router = h.router();

    h.delivery.failing.store(true, std::sync::atomic::Ordering::SeqCst);
    let ack = router.handle(InboundEvent::command(ALICE, "/check")).await;
    assert_eq!(ack, Ack::Ok);
    assert!(h.delivery.texts_to(ALICE).is_empty());
    assert_eq!(h.state.remaining_count(&ChatId::new(ALICE)).await, 1);

    h.delivery.failing.store(false, std::sync::atomic::Ordering::SeqCst);
    router
        .handle(InboundEvent::callback(ALICE, "n", "next_email"))
        .await;
    let (text, markup) = h.delivery.last_text_to(ALICE);
    assert!(text.contains("Subject 2"));
    assert_eq!(markup, None);
}
