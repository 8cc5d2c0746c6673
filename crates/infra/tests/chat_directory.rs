mod support;

use std::collections::HashSet;

use support::Harness;
use tripmate_domain::chat::ChatKind;
use tripmate_domain::error::DomainError;
use tripmate_domain::messages::{HistoryCursor, MessageKind};

#[tokio::test]
async fn private_chat_is_shared_by_both_directions() {
    let harness = Harness::new().await;
    let first = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();
    let second = harness
        .directory
        .get_or_create_private_chat("bob", "alice")
        .await
        .unwrap();
    let third = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    assert_eq!(first.chat_id, second.chat_id);
    assert_eq!(first.chat_id, third.chat_id);
    assert_eq!(first.kind, ChatKind::Private);
    assert_eq!(first.participant_ids, vec!["alice", "bob"]);
    assert_eq!(first.last_message_at_ms, first.created_at_ms);
}

#[tokio::test]
async fn private_chat_with_self_is_rejected() {
    let harness = Harness::new().await;
    let err = harness
        .directory
        .get_or_create_private_chat("alice", "alice")
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::SelfChat);
}

#[tokio::test]
async fn ids_containing_colons_get_distinct_private_chats() {
    let harness = Harness::new().await;
    let first = harness
        .directory
        .get_or_create_private_chat("a:b", "c")
        .await
        .unwrap();
    let second = harness
        .directory
        .get_or_create_private_chat("a", "b:c")
        .await
        .unwrap();

    assert_ne!(first.chat_id, second.chat_id);
    assert_eq!(first.participant_ids, vec!["a:b", "c"]);
    assert_eq!(second.participant_ids, vec!["a", "b:c"]);
}

#[tokio::test]
async fn concurrent_private_creation_converges_on_one_chat() {
    let harness = Harness::new().await;
    let mut handles = Vec::new();
    for round in 0..16 {
        let directory = harness.directory.clone();
        handles.push(tokio::spawn(async move {
            if round % 2 == 0 {
                directory.get_or_create_private_chat("alice", "carol").await
            } else {
                directory.get_or_create_private_chat("carol", "alice").await
            }
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap().chat_id);
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(
        harness.directory.list_user_chats("alice").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn group_chat_snapshots_trip_members() {
    let harness = Harness::new().await;
    harness.trip("trip-1", &["alice", "bob"]).await;

    let chat = harness
        .directory
        .get_or_create_group_chat("trip-1", "alice")
        .await
        .unwrap();
    assert_eq!(
        chat.kind,
        ChatKind::Group {
            name: "Bali Chat".to_string(),
            trip_id: "trip-1".to_string(),
        }
    );
    assert_eq!(chat.participant_ids, vec!["alice", "bob"]);

    let again = harness
        .directory
        .get_or_create_group_chat("trip-1", "bob")
        .await
        .unwrap();
    assert_eq!(again.chat_id, chat.chat_id);

    harness.trip_service.join_trip("trip-1", "carol").await.unwrap();
    let after_join = harness.directory.get_chat(&chat.chat_id).await.unwrap();
    assert_eq!(after_join.participant_ids, vec!["alice", "bob"]);
    assert!(!after_join.is_participant("carol"));

    let carol_view = harness
        .directory
        .get_or_create_group_chat("trip-1", "carol")
        .await
        .unwrap();
    assert_eq!(carol_view.chat_id, chat.chat_id);
    let err = harness
        .messages
        .append(&chat.chat_id, "carol", "hi all", MessageKind::Text)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);
}

#[tokio::test]
async fn group_chat_requires_trip_membership() {
    let harness = Harness::new().await;
    harness.trip("trip-2", &["alice", "bob"]).await;

    assert_eq!(
        harness
            .directory
            .get_or_create_group_chat("trip-2", "carol")
            .await
            .unwrap_err(),
        DomainError::NotTripMember
    );
    assert_eq!(
        harness
            .directory
            .get_or_create_group_chat("missing", "alice")
            .await
            .unwrap_err(),
        DomainError::TripNotFound
    );
}

#[tokio::test]
async fn solo_trip_cannot_open_group_chat() {
    let harness = Harness::new().await;
    harness.trip("trip-3", &["alice"]).await;
    let err = harness
        .directory
        .get_or_create_group_chat("trip-3", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn joining_twice_reports_existing_membership() {
    let harness = Harness::new().await;
    harness.trip("trip-4", &["alice"]).await;
    let trip = harness.trip_service.join_trip("trip-4", "bob").await.unwrap();
    assert_eq!(trip.member_ids, vec!["alice", "bob"]);
    assert_eq!(
        harness
            .trip_service
            .join_trip("trip-4", "bob")
            .await
            .unwrap_err(),
        DomainError::AlreadyMember
    );
    assert_eq!(
        harness
            .trip_service
            .join_trip("nope", "bob")
            .await
            .unwrap_err(),
        DomainError::TripNotFound
    );
}

#[tokio::test]
async fn chats_are_listed_by_latest_activity() {
    let harness = Harness::new().await;
    let with_bob = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();
    let with_carol = harness
        .directory
        .get_or_create_private_chat("alice", "carol")
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    harness
        .messages
        .append(&with_bob.chat_id, "bob", "ping", MessageKind::Text)
        .await
        .unwrap();

    let chats = harness.directory.list_user_chats("alice").await.unwrap();
    let ids: Vec<&str> = chats.iter().map(|chat| chat.chat_id.as_str()).collect();
    assert_eq!(ids, vec![with_bob.chat_id.as_str(), with_carol.chat_id.as_str()]);

    let last = harness.directory.last_message(&chats[0]).await.unwrap().unwrap();
    assert_eq!(last.content, "ping");
    assert!(harness.directory.last_message(&chats[1]).await.unwrap().is_none());

    assert!(
        harness
            .messages
            .history(&with_carol.chat_id, "alice", &HistoryCursor::full())
            .await
            .unwrap()
            .is_empty()
    );
}
