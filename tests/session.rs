//! Conversation turn integration tests

use std::sync::Arc;

use biopsy::corpus::Dataset;
use biopsy::gate::{FILLER_REPLY, SAFETY_REPLY, STOP_REPLY};
use biopsy::prompt::SYSTEM_PROMPT;
use biopsy::provider::ChatRole;
use biopsy::{Mood, MoodZone, Retriever, Session, TurnAction, TurnGate, TurnKind};

mod common;
use common::{HashingEmbedder, ScriptedChat, fixture};

const REPLY: &str = "Kamu bilang \"cemas soal pekerjaan\". Boleh cerita lebih banyak?";

async fn session(safety: bool) -> (Session, Arc<ScriptedChat>, tempfile::TempDir) {
    let fx = fixture();
    let embedder = Arc::new(HashingEmbedder::new());
    fx.builder(embedder.clone()).ensure(false).await.unwrap();

    let retriever = Retriever::open(&fx.index_dir, embedder).unwrap();
    let chat = Arc::new(ScriptedChat::new(REPLY));
    let session = Session::new(TurnGate::new(safety), retriever, chat.clone());
    (session, chat, fx.dir)
}

#[tokio::test]
async fn test_normal_turn_uses_examples() {
    let (session, chat, _dir) = session(true).await;

    let outcome = session
        .handle("aku merasa sangat cemas soal pekerjaan")
        .await
        .unwrap();
    assert_eq!(outcome.kind, Some(TurnKind::Normal));
    assert_eq!(outcome.action, TurnAction::Respond);
    assert_eq!(outcome.reply.as_deref(), Some(REPLY));
    assert_eq!(outcome.mood.map(Mood::zone), Some(MoodZone::NeedsAttention));

    let prompts = chat.prompts();
    assert_eq!(prompts.len(), 1);
    let messages = &prompts[0];
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, SYSTEM_PROMPT);
    assert_eq!(messages[1].role, ChatRole::System);
    assert!(messages[1].content.contains("Apa yang membuatmu paling cemas?"));
    assert_eq!(messages[2].role, ChatRole::User);
    assert_eq!(messages[2].content, "aku merasa sangat cemas soal pekerjaan");
}

#[tokio::test]
async fn test_stop_ends_without_generation() {
    let (session, chat, _dir) = session(true).await;

    let outcome = session.handle("Stop.").await.unwrap();
    assert_eq!(outcome.kind, Some(TurnKind::Stop));
    assert!(outcome.ends_session());
    assert_eq!(outcome.reply.as_deref(), Some(STOP_REPLY));
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn test_filler_reprompts() {
    let (session, chat, _dir) = session(true).await;

    let outcome = session.handle("hmm...").await.unwrap();
    assert_eq!(outcome.kind, Some(TurnKind::Filler));
    assert_eq!(outcome.action, TurnAction::Reprompt);
    assert_eq!(outcome.reply.as_deref(), Some(FILLER_REPLY));
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn test_high_risk_gets_referral() {
    let (session, chat, _dir) = session(true).await;

    let outcome = session
        .handle("Kadang aku kepikiran Bunuh Diri")
        .await
        .unwrap();
    assert_eq!(outcome.kind, Some(TurnKind::Unsafe));
    assert_eq!(outcome.action, TurnAction::Reprompt);
    assert_eq!(outcome.reply.as_deref(), Some(SAFETY_REPLY));
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn test_safety_disabled_generates() {
    let (session, chat, _dir) = session(false).await;

    let outcome = session
        .handle("kadang aku kepikiran bunuh diri")
        .await
        .unwrap();
    assert_eq!(outcome.kind, Some(TurnKind::Normal));
    assert_eq!(chat.prompts().len(), 1);
}

#[tokio::test]
async fn test_empty_transcript_is_no_input() {
    let (session, chat, _dir) = session(true).await;

    let outcome = session.handle("   ").await.unwrap();
    assert_eq!(outcome.kind, None);
    assert_eq!(outcome.reply, None);
    assert_eq!(outcome.mood, None);
    assert_eq!(outcome.action, TurnAction::Reprompt);
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn test_zero_top_k_sends_two_messages() {
    let (session, chat, _dir) = session(true).await;
    let session = session.with_top_k(0);

    session.handle("aku susah tidur setiap malam").await.unwrap();
    let prompts = chat.prompts();
    assert_eq!(prompts[0].len(), 2);
    assert_eq!(prompts[0][1].role, ChatRole::User);
}

#[tokio::test]
async fn test_dataset_filter_limits_examples() {
    let (session, chat, _dir) = session(true).await;
    let session = session
        .with_top_k(5)
        .with_dataset_filter(Some(Dataset::Hqc));

    session.handle("aku susah tidur setiap malam").await.unwrap();
    let examples = &chat.prompts()[0][1].content;
    assert!(!examples.contains("Sudah berapa lama kamu susah tidur?"));
    assert!(examples.contains("Kamu merasa tidak didengar."));
}
