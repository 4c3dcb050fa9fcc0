//! Session actor behaviour, both in-place and behind an `ActorHandle`.

use std::sync::Arc;
use std::time::Duration;

use agent_hitl::models::execution::ExecutionId;
use agent_hitl::models::turn::{ContextMessage, TurnStatus};
use agent_hitl::session::actor::{SessionActor, DEFAULT_IDLE_TIMEOUT};
use agent_hitl::session::client::ClientFactory;
use agent_hitl::AppError;

use super::test_helpers::{result, text, thinking, ClientPlan, ScriptedFactory};

fn actor(factory: &Arc<ScriptedFactory>) -> SessionActor {
    let factory: Arc<dyn ClientFactory> = factory.clone();
    SessionActor::new(ExecutionId::new("a1"), factory, DEFAULT_IDLE_TIMEOUT)
}

#[tokio::test]
async fn actor_name_is_derived_from_execution_id() {
    let factory = ScriptedFactory::new(vec![]);
    assert_eq!(actor(&factory).name(), "agent-session-a1");
}

#[tokio::test]
async fn connect_opens_then_sends_and_classifies() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![vec![
        thinking("hmm"),
        text("hello"),
        result(),
    ]])]);
    let mut actor = actor(&factory);

    let turn = actor.connect("ping").await.unwrap();

    assert!(actor.is_connected());
    assert_eq!(turn.status, TurnStatus::Complete);
    assert_eq!(turn.user_messages.len(), 1);
    assert!(matches!(
        turn.context_messages[0],
        ContextMessage::Thinking { ref content, .. } if content == "hmm"
    ));
    assert_eq!(factory.log.opened(), 1);
    assert_eq!(factory.log.sent(), vec!["ping".to_owned()]);
}

#[tokio::test]
async fn query_before_connect_is_not_connected() {
    let factory = ScriptedFactory::new(vec![]);
    let mut actor = actor(&factory);

    let err = actor.query("hello").await.unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)), "got {err:?}");
    assert!(factory.log.sent().is_empty());
}

#[tokio::test]
async fn query_after_disconnect_is_not_connected() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![vec![text("hi")]])]);
    let mut actor = actor(&factory);
    actor.connect("ping").await.unwrap();
    actor.disconnect().await;

    let err = actor.query("again").await.unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![vec![text("hi")]])]);
    let mut actor = actor(&factory);

    actor.disconnect().await;
    actor.connect("ping").await.unwrap();
    for _ in 0..3 {
        actor.disconnect().await;
        assert!(!actor.is_connected());
    }
    assert_eq!(factory.log.closed(), 1);
}

#[tokio::test]
async fn second_connect_closes_the_first_client() {
    let factory = ScriptedFactory::new(vec![
        ClientPlan::turns(vec![vec![text("first")]]),
        ClientPlan::turns(vec![vec![text("second")]]),
    ]);
    let mut actor = actor(&factory);

    actor.connect("one").await.unwrap();
    let turn = actor.connect("two").await.unwrap();

    assert_eq!(turn.user_messages[0].content(), "second");
    assert_eq!(factory.log.created(), 2);
    assert_eq!(factory.log.closed(), 1);
    assert!(actor.is_connected());
}

#[tokio::test]
async fn failed_connect_closes_client_and_stays_disconnected() {
    let factory = ScriptedFactory::new(vec![ClientPlan::broken_pipe()]);
    let mut actor = actor(&factory);

    let err = actor.connect("ping").await.unwrap_err();

    assert!(matches!(err, AppError::Transport(_)));
    assert!(!actor.is_connected());
    assert_eq!(factory.log.closed(), 1);
}

#[tokio::test]
async fn stream_without_result_is_ready_and_preserves_order() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![
        vec![text("a")],
        vec![text("b"), thinking("t"), text("c")],
    ])]);
    let mut actor = actor(&factory);
    actor.connect("ping").await.unwrap();

    let turn = actor.query("more").await.unwrap();

    assert_eq!(turn.status, TurnStatus::Ready);
    let texts: Vec<&str> = turn.user_messages.iter().map(|m| m.content()).collect();
    assert_eq!(texts, ["b", "c"]);
    assert_eq!(turn.context_messages.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn check_timeout_tracks_idle_time() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![
        vec![text("hi")],
        vec![text("again")],
    ])]);
    let mut actor = actor(&factory);

    actor.connect("ping").await.unwrap();
    assert!(!actor.check_timeout());

    tokio::time::advance(Duration::from_secs(600)).await;
    assert!(!actor.check_timeout());

    actor.query("still here").await.unwrap();
    tokio::time::advance(Duration::from_secs(600)).await;
    assert!(!actor.check_timeout());

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(actor.check_timeout());
}

#[tokio::test(start_paused = true)]
async fn check_timeout_respects_custom_threshold() {
    let factory: Arc<dyn ClientFactory> =
        ScriptedFactory::new(vec![ClientPlan::turns(vec![vec![text("hi")]])]);
    let mut actor = SessionActor::new(ExecutionId::new("a2"), factory, Duration::from_secs(5));

    actor.connect("ping").await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(actor.check_timeout());
}

#[tokio::test(start_paused = true)]
async fn long_running_turn_is_not_idle_time() {
    let factory = ScriptedFactory::new(vec![ClientPlan::slow(
        vec![vec![text("hi")], vec![text("report ready"), result()]],
        Duration::from_secs(700),
    )]);
    let mut actor = actor(&factory);

    actor.connect("ping").await.unwrap();
    assert!(!actor.check_timeout(), "idle clock restarts when the turn ends");

    actor.query("run the long job").await.unwrap();
    assert!(!actor.check_timeout());

    tokio::time::advance(Duration::from_secs(661)).await;
    assert!(actor.check_timeout());
}

#[tokio::test(start_paused = true)]
async fn handle_reports_fresh_activity_after_slow_turn() {
    let factory = ScriptedFactory::new(vec![ClientPlan::slow(
        vec![vec![text("done thinking"), result()]],
        Duration::from_secs(900),
    )]);
    let handle = actor(&factory).spawn(None);

    handle.connect("ping").await.unwrap();

    assert!(!handle.check_timeout().await.unwrap());
    handle.destroy();
}

// ── Through the handle ──────────────────────────────────

#[tokio::test]
async fn handle_round_trips_commands() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![
        vec![text("hello")],
        vec![text("world"), result()],
    ])]);
    let handle = actor(&factory).spawn(None);

    assert_eq!(handle.name(), "agent-session-a1");
    let first = handle.connect("ping").await.unwrap();
    assert_eq!(first.status, TurnStatus::Ready);
    let second = handle.query("next").await.unwrap();
    assert_eq!(second.status, TurnStatus::Complete);
    assert!(!handle.check_timeout().await.unwrap());
    handle.disconnect().await.unwrap();
    handle.disconnect().await.unwrap();

    let err = handle.query("late").await.unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)));
    handle.destroy();
}

#[tokio::test]
async fn crashed_actor_surfaces_actor_failure() {
    let factory = ScriptedFactory::new(vec![ClientPlan::crash()]);
    let handle = actor(&factory).spawn(None);

    let err = handle.connect("ping").await.unwrap_err();
    assert!(err.is_actor_failure(), "got {err:?}");

    let err = handle.query("anyone?").await.unwrap_err();
    assert!(err.is_actor_failure(), "got {err:?}");
    assert!(!handle.is_alive());
}

#[tokio::test]
async fn destroyed_actor_surfaces_actor_failure() {
    let factory = ScriptedFactory::new(vec![ClientPlan::turns(vec![vec![text("hi")]])]);
    let handle = actor(&factory).spawn(None);
    handle.connect("ping").await.unwrap();

    handle.destroy();
    handle.destroy();

    let err = handle.check_timeout().await.unwrap_err();
    assert!(matches!(err, AppError::ActorFailure(_)), "got {err:?}");
}
