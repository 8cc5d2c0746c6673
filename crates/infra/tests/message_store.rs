mod support;

use support::Harness;
use tripmate_domain::error::DomainError;
use tripmate_domain::messages::{HistoryCursor, MAX_CONTENT_LENGTH, MessageKind};

#[tokio::test]
async fn append_marks_sender_read_and_advances_chat() {
    let harness = Harness::new().await;
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let message = harness
        .messages
        .append(&chat.chat_id, "alice", "  see you at the airport  ", MessageKind::Text)
        .await
        .unwrap();
    assert_eq!(message.content, "see you at the airport");
    assert!(message.is_read_by("alice"));
    assert!(!message.is_read_by("bob"));

    let chat = harness.directory.get_chat(&chat.chat_id).await.unwrap();
    assert_eq!(chat.last_message_id.as_deref(), Some(message.message_id.as_str()));
    assert_eq!(chat.last_message_at_ms, message.created_at_ms);
}

#[tokio::test]
async fn outsider_send_persists_nothing() {
    let harness = Harness::new().await;
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let err = harness
        .messages
        .append(&chat.chat_id, "carol", "let me in", MessageKind::Text)
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NotParticipant);

    let after = harness.directory.get_chat(&chat.chat_id).await.unwrap();
    assert_eq!(after.last_message_at_ms, chat.last_message_at_ms);
    assert!(after.last_message_id.is_none());
    assert!(
        harness
            .messages
            .history(&chat.chat_id, "alice", &HistoryCursor::full())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn append_validates_chat_and_content() {
    let harness = Harness::new().await;
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    assert_eq!(
        harness
            .messages
            .append("missing", "alice", "hi", MessageKind::Text)
            .await
            .unwrap_err(),
        DomainError::ChatNotFound
    );
    assert!(matches!(
        harness
            .messages
            .append(&chat.chat_id, "alice", "   ", MessageKind::Text)
            .await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        harness
            .messages
            .append(
                &chat.chat_id,
                "alice",
                &"a".repeat(MAX_CONTENT_LENGTH + 1),
                MessageKind::Text
            )
            .await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn history_is_ordered_and_append_only() {
    let harness = Harness::new().await;
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();

    let mut sent = Vec::new();
    for (index, sender) in ["alice", "bob", "alice", "bob", "alice"].iter().enumerate() {
        let message = harness
            .messages
            .append(&chat.chat_id, sender, &format!("msg {index}"), MessageKind::Text)
            .await
            .unwrap();
        sent.push(message.message_id);
    }

    let before = harness
        .messages
        .history(&chat.chat_id, "bob", &HistoryCursor::full())
        .await
        .unwrap();
    let ids: Vec<String> = before.iter().map(|m| m.message_id.clone()).collect();
    assert_eq!(ids, sent);
    assert!(
        before
            .windows(2)
            .all(|pair| pair[0].created_at_ms <= pair[1].created_at_ms)
    );

    harness
        .messages
        .append(&chat.chat_id, "bob", "late", MessageKind::Image)
        .await
        .unwrap();
    let after = harness
        .messages
        .history(&chat.chat_id, "bob", &HistoryCursor::full())
        .await
        .unwrap();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after.last().map(|m| m.kind), Some(MessageKind::Image));

    let anchor = &after[1];
    let page = harness
        .messages
        .history(
            &chat.chat_id,
            "bob",
            &HistoryCursor::page(
                Some(anchor.created_at_ms),
                Some(anchor.message_id.clone()),
                Some(2),
            )
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(page, after[2..4].to_vec());

    assert_eq!(
        harness
            .messages
            .history(&chat.chat_id, "carol", &HistoryCursor::full())
            .await
            .unwrap_err(),
        DomainError::NotParticipant
    );
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let harness = Harness::new().await;
    let chat = harness
        .directory
        .get_or_create_private_chat("alice", "bob")
        .await
        .unwrap();
    for content in ["one", "two", "three"] {
        harness
            .messages
            .append(&chat.chat_id, "alice", content, MessageKind::Text)
            .await
            .unwrap();
    }

    assert_eq!(harness.messages.mark_read(&chat.chat_id, "bob").await.unwrap(), 3);
    for _ in 0..3 {
        assert_eq!(harness.messages.mark_read(&chat.chat_id, "bob").await.unwrap(), 0);
    }
    assert_eq!(harness.messages.mark_read(&chat.chat_id, "alice").await.unwrap(), 0);

    let history = harness
        .messages
        .history(&chat.chat_id, "bob", &HistoryCursor::full())
        .await
        .unwrap();
    for message in history {
        let bob_receipts = message
            .read_receipts
            .iter()
            .filter(|receipt| receipt.user_id == "bob")
            .count();
        assert_eq!(bob_receipts, 1);
    }

    assert_eq!(
        harness
            .messages
            .mark_read(&chat.chat_id, "carol")
            .await
            .unwrap_err(),
        DomainError::NotParticipant
    );
}
