use convo_core::Config;
use convo_core::core::domain::Domain;
use convo_core::core::events::EventKind;
use convo_core::core::tracker::Tracker;

const CONFIG: &str = r#"
[action_endpoint]
url = "https://actions.example.com/webhook"
timeout_secs = 3

[stubs]
test_file = "tests/e2e.yml"
test_case = "happy_path"

[stubs.actions.action_check_balance]
events = [{ event = "slot", name = "balance", value = 100 }]

[stubs.actions."happy_path::action_check_balance"]
events = [{ event = "slot", name = "balance", value = 250 }]
responses = [{ text = "You have 250." }]

[validation]
max_history = 5
ignore_warnings = true

[observability]
log_level = "debug"
"#;

#[tokio::test]
async fn config_file_drives_the_stubbed_executor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.config_path, path);
    assert_eq!(config.action_endpoint.timeout_secs, 3);
    assert_eq!(config.validation.max_history, Some(5));
    assert!(config.validation.ignore_warnings);
    assert_eq!(config.observability.log_level, "debug");

    let executor = config.action_executor().unwrap();
    let response = executor
        .run("action_check_balance", &Tracker::new("stub", &[]), &Domain::default())
        .await
        .unwrap();

    let events = response.into_events();
    assert!(matches!(events[0].kind(), EventKind::BotUttered { .. }));
    assert!(matches!(
        events[1].kind(),
        EventKind::SlotSet { name, value } if name == "balance" && *value == 250
    ));
}

#[test]
fn invalid_endpoint_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[action_endpoint]\nurl = \"localhost webhook\"\n").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("not a valid URL"));
}
