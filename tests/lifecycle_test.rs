// ABOUTME: Tests for conversation lifecycle: resolution, sealing, rollover
// ABOUTME: Exercises the services layer directly against an in-memory database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{create_test_resources, test_config};
use helpers::mock_llm::MockLlm;

use std::sync::Arc;

use taskchat::services::lifecycle;
use uuid::Uuid;

async fn chat_fixture() -> (taskchat::database::ChatManager, Uuid) {
    let resources = create_test_resources(Arc::new(MockLlm::text_only("hi")), test_config()).await;
    (resources.database.chat(), Uuid::new_v4())
}

#[tokio::test]
async fn test_resolve_creates_conversation_when_none_exists() {
    let (chat, user_id) = chat_fixture().await;

    let conversation = lifecycle::resolve_conversation(&chat, user_id, None, 100)
        .await
        .unwrap();

    assert_eq!(conversation.message_count, 0);
    assert!(!conversation.archived);
    assert!(conversation.title.is_none());
}

#[tokio::test]
async fn test_resolve_reuses_latest_active_conversation() {
    let (chat, user_id) = chat_fixture().await;

    let first = lifecycle::resolve_conversation(&chat, user_id, None, 100)
        .await
        .unwrap();
    let second = lifecycle::resolve_conversation(&chat, user_id, None, 100)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_resolve_rejects_unknown_id() {
    let (chat, user_id) = chat_fixture().await;

    let err = lifecycle::resolve_conversation(&chat, user_id, Some("missing"), 100)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_resolve_rejects_foreign_id() {
    let (chat, user_id) = chat_fixture().await;
    let other_user = Uuid::new_v4();
    let foreign = chat.create_conversation(other_user).await.unwrap();

    let err = lifecycle::resolve_conversation(&chat, user_id, Some(&foreign.id), 100)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_resolve_rejects_archived_conversation() {
    let (chat, user_id) = chat_fixture().await;
    let conversation = chat.create_conversation(user_id).await.unwrap();
    chat.seal_conversation(user_id, &conversation.id)
        .await
        .unwrap();

    let err = lifecycle::resolve_conversation(&chat, user_id, Some(&conversation.id), 100)
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_full_conversation_rolls_over_to_successor() {
    let (chat, user_id) = chat_fixture().await;
    let conversation = chat.create_conversation(user_id).await.unwrap();
    chat.set_title_if_unset(user_id, &conversation.id, "groceries")
        .await
        .unwrap();
    for i in 0..4 {
        chat.add_message(&conversation.id, user_id, "user", &format!("msg {i}"), None)
            .await
            .unwrap();
    }

    let resolved = lifecycle::resolve_conversation(&chat, user_id, Some(&conversation.id), 4)
        .await
        .unwrap();

    // Fresh successor, old conversation sealed with a prefixed title
    assert_ne!(resolved.id, conversation.id);
    assert_eq!(resolved.message_count, 0);

    let sealed = chat
        .get_conversation(user_id, &conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert!(sealed.archived);
    assert_eq!(sealed.title.as_deref(), Some("[Archived] groceries"));
    assert_eq!(sealed.message_count, 4);
}

#[tokio::test]
async fn test_rollover_without_title_uses_bare_marker() {
    let (chat, user_id) = chat_fixture().await;
    let conversation = chat.create_conversation(user_id).await.unwrap();
    chat.add_message(&conversation.id, user_id, "user", "only", None)
        .await
        .unwrap();

    lifecycle::roll_over_if_full(
        &chat,
        user_id,
        chat.get_conversation(user_id, &conversation.id)
            .await
            .unwrap()
            .unwrap(),
        1,
    )
    .await
    .unwrap();

    let sealed = chat
        .get_conversation(user_id, &conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sealed.title.as_deref(), Some("[Archived]"));
}

#[tokio::test]
async fn test_roll_over_leaves_unfilled_conversation_alone() {
    let (chat, user_id) = chat_fixture().await;
    let conversation = chat.create_conversation(user_id).await.unwrap();

    let resolved = lifecycle::roll_over_if_full(&chat, user_id, conversation.clone(), 100)
        .await
        .unwrap();

    assert_eq!(resolved.id, conversation.id);
}

#[tokio::test]
async fn test_message_count_never_exceeds_bound_across_turns() {
    let (chat, user_id) = chat_fixture().await;
    let max = 4_i64;

    // Simulate six appends the way a turn does: resolve per message
    for i in 0..6 {
        let conversation = lifecycle::resolve_conversation(&chat, user_id, None, max)
            .await
            .unwrap();
        chat.add_message(&conversation.id, user_id, "user", &format!("msg {i}"), None)
            .await
            .unwrap();
    }

    let conversations = chat.list_conversations(user_id).await.unwrap();
    assert_eq!(conversations.len(), 2);
    for conversation in conversations {
        assert!(conversation.message_count <= max);
    }
}

#[tokio::test]
async fn test_title_set_only_once() {
    let (chat, user_id) = chat_fixture().await;
    let conversation = chat.create_conversation(user_id).await.unwrap();

    lifecycle::title_from_first_message(&chat, user_id, &conversation.id, "first message")
        .await
        .unwrap();
    lifecycle::title_from_first_message(&chat, user_id, &conversation.id, "second message")
        .await
        .unwrap();

    let stored = chat
        .get_conversation(user_id, &conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title.as_deref(), Some("first message"));
}
