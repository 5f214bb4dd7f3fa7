//! Integration tests for the request controller state machine
//!
//! Exchanges run against a scripted transport; cancellation is pulled from
//! the view at fixed points so every run is deterministic.

use std::sync::Arc;
use std::time::Duration;

use relaychat::assembler::Segment;
use relaychat::controller::{DIAGNOSTIC_PREFIX, ExchangeState, NullView, RequestController};
use relaychat::conversation::{ChatMessage, KeyValueStore, MemoryKvStore};
use relaychat::decoder::Framing;
use relaychat::models::{ModelCatalog, ModelProfile};
use relaychat::session::ChatSession;
use relaychat::testing::{
    CancelTrigger, FailingKvStore, RecordingView, ScriptedReply, ScriptedTransport, ViewEvent,
};

// =============================================================================
// Test Fixtures
// =============================================================================

fn catalog() -> ModelCatalog {
    ModelCatalog::new(vec![
        ModelProfile::new("test/model").with_parameter("temperature", serde_json::json!(0.5)),
    ])
}

fn session_with(kv: Arc<dyn KeyValueStore>) -> ChatSession {
    ChatSession::open(kv, catalog(), false).unwrap()
}

fn session() -> ChatSession {
    session_with(Arc::new(MemoryKvStore::new()))
}

fn controller(replies: Vec<ScriptedReply>) -> (RequestController, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(replies));
    let controller = RequestController::new(transport.clone(), Framing::EventStream);
    (controller, transport)
}

fn committed_messages(session: &ChatSession) -> Vec<ChatMessage> {
    session.active().unwrap().messages.clone()
}

// =============================================================================
// Completion Tests
// =============================================================================

mod completion_tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_completes_and_commits() {
        let (mut controller, transport) =
            controller(vec![ScriptedReply::event_stream(&["Hel", "lo"])]);
        let mut session = session();
        let mut view = RecordingView::new();

        let outcome = controller.send(&mut session, "  Hi  ", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Completed);
        assert_eq!(outcome.committed, Some(ChatMessage::ai("Hello")));
        assert_eq!(controller.state(), ExchangeState::Idle);
        assert_eq!(
            committed_messages(&session),
            vec![ChatMessage::user("Hi"), ChatMessage::ai("Hello")]
        );
        assert_eq!(view.live_updates(), vec!["Hel", "Hello"]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test/model");
        assert_eq!(requests[0].messages[0].content, "Hi");
        assert!(requests[0].stream);
    }

    #[tokio::test]
    async fn test_view_sees_ordered_lifecycle() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream(&["Hi"])]);
        let mut session = session();
        let mut view = RecordingView::new();

        controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(
            view.events,
            vec![
                ViewEvent::Input(false),
                ViewEvent::Pending,
                ViewEvent::Live("Hi".to_string()),
                ViewEvent::Final {
                    message: ChatMessage::ai("Hi"),
                    segments: vec![Segment::Plain {
                        text: "Hi".to_string()
                    }],
                },
                ViewEvent::Input(true),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_stream_commits_nothing() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream(&[])]);
        let mut session = session();
        let mut view = RecordingView::new();

        let outcome = controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Completed);
        assert!(outcome.committed.is_none());
        assert_eq!(committed_messages(&session), vec![ChatMessage::user("Hello")]);
        assert!(view.events.contains(&ViewEvent::Cleared));
    }

    #[tokio::test]
    async fn test_blank_input_sends_nothing() {
        let (mut controller, transport) = controller(vec![]);
        let mut session = session();
        let mut view = RecordingView::new();

        let outcome = controller.send(&mut session, "   \n ", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Idle);
        assert!(outcome.conversation.is_none());
        assert!(transport.requests().is_empty());
        assert!(session.conversations().is_empty());
        assert!(view.events.is_empty());
    }

    #[tokio::test]
    async fn test_code_reply_is_segmented() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream(&[
            "See:\n```",
            "js\nconsole.log(1)\n",
            "```",
        ])]);
        let mut session = session();
        let mut view = RecordingView::new();

        controller.send(&mut session, "show me", &mut view).await.unwrap();

        let segments = view
            .events
            .iter()
            .find_map(|e| match e {
                ViewEvent::Final { segments, .. } => Some(segments.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            segments[1],
            Segment::Code {
                language: "js".to_string(),
                code: "console.log(1)".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_raw_chunk_framing() {
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedReply::raw(&["plain ", "chunks"])]));
        let mut controller = RequestController::new(transport, Framing::RawChunk);
        let mut session = session();

        let outcome = controller
            .send(&mut session, "hi", &mut NullView)
            .await
            .unwrap();

        assert_eq!(outcome.committed, Some(ChatMessage::ai("plain chunks")));
    }
}

// =============================================================================
// Cancellation Tests
// =============================================================================

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_before_any_token_commits_nothing() {
        let (mut controller, _) = controller(vec![ScriptedReply::Hang]);
        let mut session = session();
        let mut view = RecordingView::cancelling(controller.cancel_handle(), CancelTrigger::OnPending);

        let outcome = controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Aborted);
        assert!(outcome.committed.is_none());
        assert_eq!(committed_messages(&session), vec![ChatMessage::user("Hello")]);
        assert!(session.active().unwrap().placeholder().is_none());
        assert!(view.events.contains(&ViewEvent::Cleared));
        assert_eq!(view.input_enabled(), Some(true));
    }

    #[tokio::test]
    async fn test_cancel_after_tokens_commits_partial_text() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream_then_hang(&[
            "Par", "tial", " never",
        ])]);
        let mut session = session();
        let mut view =
            RecordingView::cancelling(controller.cancel_handle(), CancelTrigger::AfterUpdates(2));

        let outcome = controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Aborted);
        assert_eq!(outcome.committed, Some(ChatMessage::ai("Partial")));
        assert_eq!(
            committed_messages(&session),
            vec![ChatMessage::user("Hello"), ChatMessage::ai("Partial")]
        );
        assert_eq!(view.finals().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_stall_keeps_everything_seen() {
        let (mut controller, _) =
            controller(vec![ScriptedReply::event_stream_then_hang(&["one", " two"])]);
        let mut session = session();
        let mut view =
            RecordingView::cancelling(controller.cancel_handle(), CancelTrigger::AfterUpdates(2));

        let outcome = controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(outcome.committed, Some(ChatMessage::ai("one two")));
    }

    #[tokio::test]
    async fn test_trigger_when_idle_is_noop() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream(&["ok"])]);
        let handle = controller.cancel_handle();
        assert!(!handle.trigger());

        let mut session = session();
        let outcome = controller
            .send(&mut session, "Hello", &mut NullView)
            .await
            .unwrap();

        // A trigger before the exchange must not leak into it
        assert_eq!(outcome.state, ExchangeState::Completed);
        assert!(!handle.is_armed());
        assert!(!handle.trigger());
    }

    #[tokio::test]
    async fn test_abandoned_send_settles_back_to_idle() {
        let (mut controller, transport) = controller(vec![
            ScriptedReply::Hang,
            ScriptedReply::event_stream(&["Back"]),
        ]);
        let mut session = session();
        let handle = controller.cancel_handle();
        let mut view = RecordingView::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            controller.send(&mut session, "first", &mut view),
        )
        .await;
        assert!(abandoned.is_err());

        assert_eq!(controller.state(), ExchangeState::Idle);
        assert!(!handle.is_armed());
        assert!(session.active().unwrap().placeholder().is_none());
        assert!(view.events.contains(&ViewEvent::Cleared));
        assert_eq!(view.input_enabled(), Some(true));

        let outcome = controller
            .send(&mut session, "second", &mut NullView)
            .await
            .unwrap();

        assert_eq!(outcome.state, ExchangeState::Completed);
        assert_eq!(
            committed_messages(&session),
            vec![
                ChatMessage::user("first"),
                ChatMessage::user("second"),
                ChatMessage::ai("Back"),
            ]
        );
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_switch_is_fresh_for_each_exchange() {
        let (mut controller, _) = controller(vec![
            ScriptedReply::event_stream_then_hang(&["first"]),
            ScriptedReply::event_stream(&["second"]),
        ]);
        let mut session = session();

        let mut cancelling =
            RecordingView::cancelling(controller.cancel_handle(), CancelTrigger::AfterUpdates(1));
        let first = controller.send(&mut session, "one", &mut cancelling).await.unwrap();
        let second = controller.send(&mut session, "two", &mut NullView).await.unwrap();

        assert_eq!(first.state, ExchangeState::Aborted);
        assert_eq!(first.committed, Some(ChatMessage::ai("first")));
        assert_eq!(second.state, ExchangeState::Completed);
        assert_eq!(second.committed, Some(ChatMessage::ai("second")));
    }
}

// =============================================================================
// Failure Tests
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejection_becomes_diagnostic_reply() {
        let (mut controller, _) = controller(vec![ScriptedReply::Reject {
            status: 429,
            message: "rate limited".to_string(),
        }]);
        let mut session = session();
        let mut view = RecordingView::new();

        let outcome = controller.send(&mut session, "Hello", &mut view).await.unwrap();

        assert_eq!(outcome.state, ExchangeState::Failed);
        assert_eq!(outcome.error.as_deref(), Some("API error (429): rate limited"));
        let reply = outcome.committed.unwrap();
        assert_eq!(
            reply.content,
            format!("{DIAGNOSTIC_PREFIX}API error (429): rate limited")
        );
        assert_eq!(view.input_enabled(), Some(true));
        assert_eq!(controller.state(), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn test_connect_failure_becomes_diagnostic_reply() {
        let (mut controller, _) =
            controller(vec![ScriptedReply::Fail("connection refused".to_string())]);
        let mut session = session();

        let outcome = controller
            .send(&mut session, "Hello", &mut NullView)
            .await
            .unwrap();

        assert_eq!(outcome.state, ExchangeState::Failed);
        assert_eq!(
            outcome.committed.unwrap().content,
            "Sorry, I ran into a problem: connection refused"
        );
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_text() {
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream_then_error(
            &["half", " done"],
            "connection reset",
        )]);
        let mut session = session();

        let outcome = controller
            .send(&mut session, "Hello", &mut NullView)
            .await
            .unwrap();

        assert_eq!(outcome.state, ExchangeState::Failed);
        assert_eq!(outcome.committed, Some(ChatMessage::ai("half done")));
        assert_eq!(outcome.error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_commit_failure_still_returns_to_idle() {
        // First write (the user message) succeeds, the reply commit fails
        let kv: Arc<dyn KeyValueStore> = Arc::new(FailingKvStore::fail_after(1));
        let mut session = session_with(kv);
        let (mut controller, _) = controller(vec![ScriptedReply::event_stream(&["lost"])]);
        let mut view = RecordingView::new();

        let result = controller.send(&mut session, "Hello", &mut view).await;

        assert!(result.is_err());
        assert_eq!(controller.state(), ExchangeState::Idle);
        assert!(!controller.cancel_handle().is_armed());
        assert_eq!(view.input_enabled(), Some(true));
        assert!(session.active().unwrap().placeholder().is_none());
    }

    #[tokio::test]
    async fn test_no_retry_after_failure() {
        let (mut controller, transport) = controller(vec![ScriptedReply::Fail("down".to_string())]);
        let mut session = session();

        controller
            .send(&mut session, "Hello", &mut NullView)
            .await
            .unwrap();

        assert_eq!(transport.requests().len(), 1);
    }
}
