use convo_core::core::domain::Domain;
use convo_core::core::events::{Event, UserMessage};
use convo_core::core::flows::FlowsList;
use convo_core::core::stories::{StoryGraph, StoryStep, find_story_conflicts};
use convo_core::core::validator::StoryValidator;
use serde_json::json;

fn user(intent: &str) -> Event {
    Event::user(UserMessage::new(intent).with_intent(intent))
}

fn domain() -> Domain {
    Domain::from_value(json!({
        "intents": ["greet", "affirm", "ask_weather"],
        "actions": ["action_book", "action_cancel", "action_weather"],
        "responses": {"utter_greet": [{"text": "Hi!"}]}
    }))
    .unwrap()
}

fn stories() -> StoryGraph {
    StoryGraph::new(vec![
        StoryStep::new(
            "weather then book",
            vec![
                user("ask_weather"),
                Event::action("action_weather"),
                user("greet"),
                Event::action("utter_greet"),
                user("affirm"),
                Event::action("action_book"),
            ],
        ),
        StoryStep::new(
            "cancel",
            vec![
                user("greet"),
                Event::action("utter_greet"),
                user("affirm"),
                Event::action("action_cancel"),
            ],
        ),
    ])
}

#[test]
fn short_history_exposes_the_conflict() {
    let domain = domain();
    let trackers = stories().generate_story_trackers(&domain);

    // With full histories the first story starts differently.
    assert!(find_story_conflicts(&trackers, &domain, None).is_empty());

    let conflicts = find_story_conflicts(&trackers, &domain, Some(2));
    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        conflicts[0].competing_next_actions.iter().collect::<Vec<_>>(),
        vec!["action_book", "action_cancel"]
    );
}

#[test]
fn validator_reports_structure_and_flows() {
    let domain = domain();
    let stories = stories();
    let flows = FlowsList::from_value(&json!({
        "flows": {
            "book": {
                "description": "Book a table",
                "steps": [{"action": "action_book", "next": "END"}]
            }
        }
    }))
    .unwrap();
    let validator = StoryValidator::new(&domain, &stories, &flows);

    assert!(validator.verify_actions_in_stories());
    assert!(validator.verify_intents_in_stories(false));
    assert!(validator.verify_utterances_in_dialogues(false));
    assert!(!validator.verify_story_structure(false, Some(2)));
    assert!(validator.verify_story_structure(true, Some(2)));
    assert!(validator.verify_flows_structure().is_ok());
}
