mod support;

use support::Harness;
use tokio::sync::mpsc::UnboundedReceiver;
use tripmate_domain::error::DomainError;
use tripmate_domain::messages::{HistoryCursor, MessageKind};
use tripmate_domain::realtime::{ClientEvent, RoomId, RoomJoinPolicy, ServerEvent};

fn drain(events: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn handshake_requires_a_known_token() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);

    assert_eq!(
        sessions.connect(None).await.err(),
        Some(DomainError::Unauthenticated)
    );
    assert_eq!(
        sessions.connect(Some("  ")).await.err(),
        Some(DomainError::Unauthenticated)
    );
    assert_eq!(
        sessions.connect(Some("forged")).await.err(),
        Some(DomainError::Unauthenticated)
    );
    assert_eq!(sessions.session_count().await, 0);

    let connection = sessions.connect(Some("token-alice")).await.unwrap();
    assert_eq!(connection.identity.user_id, "alice");
    assert_eq!(
        sessions.rooms_of(connection.session_id).await,
        vec![RoomId::User("alice".to_string())]
    );
}

#[tokio::test]
async fn connected_send_reaches_peer_and_every_sender_tab() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let mut alice_tab_one = sessions.connect(Some("token-alice")).await.unwrap();
    let mut alice_tab_two = sessions.connect(Some("token-alice")).await.unwrap();
    let mut bob = sessions.connect(Some("token-bob")).await.unwrap();
    for connection in [&alice_tab_one, &alice_tab_two, &bob] {
        sessions
            .handle(
                connection.session_id,
                ClientEvent::JoinChat {
                    chat_id: chat.chat_id.clone(),
                },
            )
            .await;
    }
    assert_eq!(
        sessions.room_size(&RoomId::Chat(chat.chat_id.clone())).await,
        3
    );

    sessions
        .handle(
            alice_tab_one.session_id,
            ClientEvent::SendMessage {
                chat_id: chat.chat_id.clone(),
                content: "hi".to_string(),
                kind: MessageKind::Text,
            },
        )
        .await;

    for events in [
        &mut alice_tab_one.events,
        &mut alice_tab_two.events,
        &mut bob.events,
    ] {
        let received = drain(events);
        assert_eq!(received.len(), 2, "new_message then chat_updated");
        let ServerEvent::NewMessage(view) = &received[0] else {
            panic!("expected new_message, got {:?}", received[0]);
        };
        assert_eq!(view.content, "hi");
        assert_eq!(view.sender_id(), "alice");
        assert!(view.sender.is_populated());
        assert_eq!(view.sender.display_name(), "Alice");

        let ServerEvent::ChatUpdated {
            chat_id,
            last_message,
            last_message_at_ms,
        } = &received[1]
        else {
            panic!("expected chat_updated, got {:?}", received[1]);
        };
        assert_eq!(chat_id, &chat.chat_id);
        assert_eq!(last_message.message_id, view.message_id);
        assert_eq!(*last_message_at_ms, view.created_at_ms);
    }

    let stored = harness
        .messages
        .history(&chat.chat_id, "bob", &HistoryCursor::full())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn failed_send_notifies_only_the_sender() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let mut carol = sessions.connect(Some("token-carol")).await.unwrap();
    let mut bob = sessions.connect(Some("token-bob")).await.unwrap();
    for connection in [&carol, &bob] {
        sessions.join_chat(connection.session_id, &chat.chat_id).await;
    }

    sessions
        .send_message(carol.session_id, &chat.chat_id, "hello?", MessageKind::Text)
        .await;
    assert_eq!(
        drain(&mut carol.events),
        vec![ServerEvent::error("You are not a participant of this chat")]
    );
    assert!(drain(&mut bob.events).is_empty());

    sessions
        .send_message(carol.session_id, "missing", "hello?", MessageKind::Text)
        .await;
    assert_eq!(
        drain(&mut carol.events),
        vec![ServerEvent::error("Chat not found")]
    );

    let after = harness.directory.get_chat(&chat.chat_id).await.unwrap();
    assert_eq!(after.last_message_at_ms, chat.last_message_at_ms);
    assert_eq!(sessions.session_count().await, 2);
}

#[tokio::test]
async fn typing_reaches_others_and_survives_disconnect() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let mut alice = sessions.connect(Some("token-alice")).await.unwrap();
    let mut bob = sessions.connect(Some("token-bob")).await.unwrap();
    sessions.join_chat(alice.session_id, &chat.chat_id).await;
    sessions.join_chat(bob.session_id, &chat.chat_id).await;

    sessions
        .handle(
            alice.session_id,
            ClientEvent::TypingStart {
                chat_id: chat.chat_id.clone(),
            },
        )
        .await;
    assert!(drain(&mut alice.events).is_empty());
    assert_eq!(
        drain(&mut bob.events),
        vec![ServerEvent::UserTyping {
            user_id: "alice".to_string(),
            user_name: "Alice".to_string(),
            chat_id: chat.chat_id.clone(),
        }]
    );

    sessions.disconnect(alice.session_id).await;
    assert!(drain(&mut bob.events).is_empty());
    assert_eq!(
        sessions.room_size(&RoomId::Chat(chat.chat_id.clone())).await,
        1
    );
    assert_eq!(
        sessions.room_size(&RoomId::User("alice".to_string())).await,
        0
    );
    assert!(sessions.rooms_of(alice.session_id).await.is_empty());
}

#[tokio::test]
async fn left_room_no_longer_receives_messages() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let alice = sessions.connect(Some("token-alice")).await.unwrap();
    let mut bob = sessions.connect(Some("token-bob")).await.unwrap();
    sessions.join_chat(alice.session_id, &chat.chat_id).await;
    sessions.join_chat(bob.session_id, &chat.chat_id).await;
    sessions
        .handle(
            bob.session_id,
            ClientEvent::LeaveChat {
                chat_id: chat.chat_id.clone(),
            },
        )
        .await;

    sessions
        .send_message(alice.session_id, &chat.chat_id, "anyone?", MessageKind::Text)
        .await;
    assert!(drain(&mut bob.events).is_empty());
}

#[tokio::test]
async fn open_policy_admits_outsiders_to_rooms() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Open);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let alice = sessions.connect(Some("token-alice")).await.unwrap();
    let mut carol = sessions.connect(Some("token-carol")).await.unwrap();
    sessions.join_chat(alice.session_id, &chat.chat_id).await;
    sessions.join_chat(carol.session_id, &chat.chat_id).await;
    assert!(drain(&mut carol.events).is_empty());

    sessions
        .send_message(alice.session_id, &chat.chat_id, "hey bob", MessageKind::Text)
        .await;
    let received = drain(&mut carol.events);
    assert!(matches!(received.first(), Some(ServerEvent::NewMessage(_))));
}

#[tokio::test]
async fn participants_policy_refuses_outsiders() {
    let harness = Harness::new().await;
    let sessions = harness.sessions(RoomJoinPolicy::Participants);
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let mut carol = sessions.connect(Some("token-carol")).await.unwrap();
    sessions.join_chat(carol.session_id, &chat.chat_id).await;
    assert_eq!(
        drain(&mut carol.events),
        vec![ServerEvent::error("You are not a participant of this chat")]
    );
    assert_eq!(
        sessions.rooms_of(carol.session_id).await,
        vec![RoomId::User("carol".to_string())]
    );

    let bob = sessions.connect(Some("token-bob")).await.unwrap();
    sessions.join_chat(bob.session_id, &chat.chat_id).await;
    assert!(
        sessions
            .rooms_of(bob.session_id)
            .await
            .contains(&RoomId::Chat(chat.chat_id.clone()))
    );
}
