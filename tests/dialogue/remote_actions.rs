use std::sync::Arc;
use std::time::Duration;

use convo_core::config::ActionEndpointConfig;
use convo_core::core::actions::{ActionExecutor, ActionOutcome, HttpActionExecutor};
use convo_core::core::events::{Event, EventKind, UserMessage};
use convo_core::core::tracker::Tracker;
use convo_core::error::ActionError;
use convo_core::{Conversation, Domain};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(server: &MockServer) -> Arc<dyn ActionExecutor> {
    Arc::new(HttpActionExecutor::new(ActionEndpointConfig {
        url: format!("{}/webhook", server.uri()),
        timeout_secs: 1,
        connect_timeout_secs: 1,
        token: None,
    }))
}

fn conversation() -> Conversation {
    Conversation::new(Tracker::from_events(
        "remote",
        [
            Event::action_listen(),
            Event::user(UserMessage::new("what's the weather?").with_intent("ask_weather")),
        ],
        &[],
    ))
}

async fn slow_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"events": []})),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn timeout_of_known_action_fails_the_turn() {
    let server = slow_server().await;
    let domain = Domain::default().with_actions(["action_check_weather"]);
    let mut conversation = conversation();
    let before = conversation.tracker().events().len();

    let err = conversation
        .execute_remote("action_check_weather", executor(&server), &domain)
        .await
        .unwrap_err();

    assert!(matches!(err, ActionError::Timeout { ref action_name, .. } if action_name == "action_check_weather"));
    assert_eq!(conversation.tracker().events().len(), before);
}

#[tokio::test]
async fn timeout_of_new_action_continues_with_bare_execution() {
    let server = slow_server().await;
    let domain = Domain::default();
    let mut conversation = conversation();
    conversation.session_mut().register_new_action("action_check_forecast");

    let outcome = conversation
        .execute_remote("action_check_forecast", executor(&server), &domain)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Completed(Vec::new()));
    assert_eq!(
        conversation.tracker().events().last(),
        Some(&Event::action("action_check_forecast"))
    );
}

#[tokio::test]
async fn server_events_and_responses_are_logged_after_the_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"event": "slot", "name": "weather", "value": "rain"}],
            "responses": [{"text": "Bring an umbrella."}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let domain = Domain::default().with_actions(["action_check_weather"]);
    let mut conversation = conversation();

    conversation
        .execute_remote("action_check_weather", executor(&server), &domain)
        .await
        .unwrap();

    let events = conversation.tracker().events();
    let tail: Vec<_> = events[events.len() - 3..].iter().map(Event::kind).collect();
    assert!(matches!(tail[0], EventKind::ActionExecuted { action_name, .. } if action_name == "action_check_weather"));
    assert!(matches!(tail[1], EventKind::BotUttered { text: Some(text), .. } if text == "Bring an umbrella."));
    assert_eq!(conversation.tracker().latest_action_name(), Some("action_check_weather"));
}

#[tokio::test]
async fn rejected_action_is_logged_as_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "action_name": "action_pay",
            "error": "no account linked"
        })))
        .mount(&server)
        .await;
    let domain = Domain::default().with_actions(["action_pay"]);
    let mut conversation = conversation();

    let outcome = conversation
        .execute_remote("action_pay", executor(&server), &domain)
        .await
        .unwrap();

    assert!(outcome.is_rejected());
    assert_eq!(
        conversation.tracker().events().last(),
        Some(&Event::active_loop_rejected(Some("action_pay".into())))
    );
}

async fn unknown_action_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no registered action found"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn not_found_for_new_action_continues_with_bare_execution() {
    let server = unknown_action_server().await;
    let domain = Domain::default();
    let mut conversation = conversation();
    conversation.session_mut().register_new_action("action_brand_new");

    let outcome = conversation
        .execute_remote("action_brand_new", executor(&server), &domain)
        .await
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Completed(Vec::new()));
    assert_eq!(
        conversation.tracker().events().last(),
        Some(&Event::action("action_brand_new"))
    );
}

#[tokio::test]
async fn not_found_for_known_action_fails_the_turn() {
    let server = unknown_action_server().await;
    let domain = Domain::default().with_actions(["action_check_weather"]);
    let mut conversation = conversation();
    let before = conversation.tracker().events().len();

    let err = conversation
        .execute_remote("action_check_weather", executor(&server), &domain)
        .await
        .unwrap_err();

    assert!(matches!(err, ActionError::Server { status: 404, .. }));
    assert_eq!(conversation.tracker().events().len(), before);
}
