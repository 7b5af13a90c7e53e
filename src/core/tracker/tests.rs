use serde_json::json;

use super::*;
use crate::core::domain::{SlotSpec, SlotType};
use crate::core::events::{Entity, Event, UserMessage};

fn slots() -> Vec<SlotSpec> {
    vec![
        SlotSpec::new("cuisine", SlotType::Text),
        SlotSpec::new("people", SlotType::Float),
        SlotSpec::new("outdoor", SlotType::Bool).with_initial_value(false),
    ]
}

fn conversation() -> Vec<Event> {
    vec![
        Event::action_listen(),
        Event::user(UserMessage::new("book a table").with_intent("request_table")),
        Event::action("booking_form"),
        Event::form_activated("booking_form"),
        Event::slot_set("requested_slot", "cuisine"),
        Event::action_listen(),
        Event::user(
            UserMessage::new("thai")
                .with_intent("inform")
                .with_entity(Entity::new("cuisine", "thai")),
        ),
        Event::slot_set("cuisine", "thai"),
    ]
}

#[test]
fn initial_values_come_from_the_slot_schema() {
    let tracker = Tracker::new("t", &slots());
    assert_eq!(tracker.get_slot("outdoor"), Some(&json!(false)));
    assert_eq!(tracker.get_slot("cuisine"), None);
    assert!(tracker.active_loop().is_none());
}

#[test]
fn incremental_append_matches_replay() {
    let mut incremental = Tracker::new("t", &slots());
    for event in conversation() {
        incremental.append(event);
    }
    let replayed = Tracker::from_events("t", conversation(), &slots());

    assert_eq!(incremental.state(), replayed.state());
    assert_eq!(
        incremental.state(),
        &DialogueState::replay(incremental.schema(), incremental.events())
    );
}

#[test]
fn unknown_slot_is_ignored() {
    let tracker = Tracker::from_events("t", [Event::slot_set("colour", "red")], &slots());
    assert!(!tracker.slots().contains_key("colour"));
    assert_eq!(tracker.events().len(), 1);
}

#[test]
fn null_slot_value_reads_as_unset() {
    let tracker = Tracker::from_events(
        "t",
        [Event::slot_set("cuisine", "thai"), Event::slot_set("cuisine", json!(null))],
        &slots(),
    );
    assert_eq!(tracker.get_slot("cuisine"), None);
}

#[test]
fn restart_resets_state_and_generation() {
    let mut tracker = Tracker::from_events("t", conversation(), &slots());
    tracker.append(Event::restarted());

    assert_eq!(tracker.get_slot("cuisine"), None);
    assert!(tracker.active_loop().is_none());
    assert_eq!(tracker.events_since_last_restart().count(), 0);

    tracker.append(Event::action_listen());
    assert_eq!(tracker.events_since_last_restart().count(), 1);
    assert_eq!(tracker.events().len(), conversation().len() + 2);
}

#[test]
fn action_reverted_undoes_back_to_previous_action() {
    let mut tracker = Tracker::from_events(
        "t",
        [
            Event::action_listen(),
            Event::user(UserMessage::new("hi").with_intent("greet")),
            Event::action("action_pick_cuisine"),
            Event::slot_set("cuisine", "thai"),
        ],
        &slots(),
    );
    tracker.append(Event::action_reverted());

    assert_eq!(tracker.get_slot("cuisine"), None);
    assert_eq!(tracker.latest_action_name(), Some("action_listen"));
    assert_eq!(tracker.latest_intent_name(), Some("greet"));
}

#[test]
fn user_utterance_reverted_undoes_back_to_previous_message() {
    let mut tracker = Tracker::from_events(
        "t",
        [
            Event::user(UserMessage::new("hi").with_intent("greet")),
            Event::action("utter_greet"),
            Event::action_listen(),
            Event::user(UserMessage::new("thai").with_intent("inform")),
            Event::slot_set("cuisine", "thai"),
        ],
        &slots(),
    );
    tracker.append(Event::user_utterance_reverted());

    assert_eq!(tracker.get_slot("cuisine"), None);
    assert_eq!(tracker.latest_intent_name(), Some("greet"));
    assert_eq!(tracker.latest_action_name(), Some("utter_greet"));
    assert_eq!(tracker.applied_events().len(), 2);
}

#[test]
fn loop_flags_follow_loop_events() {
    let mut tracker = Tracker::from_events("t", conversation(), &slots());
    assert_eq!(tracker.active_loop_name(), Some("booking_form"));
    assert!(tracker.active_loop().unwrap().validate);

    tracker.append(Event::form_validation(false));
    assert!(!tracker.active_loop().unwrap().validate);

    tracker.append(Event::active_loop_rejected(Some("booking_form".into())));
    assert!(tracker.active_loop().unwrap().rejected);

    tracker.append(Event::action("utter_chitchat"));
    let active_loop = tracker.active_loop().unwrap();
    assert!(active_loop.validate);
    assert!(active_loop.rejected);

    tracker.append(Event::action("booking_form"));
    assert!(!tracker.active_loop().unwrap().rejected);

    tracker.append(Event::form_deactivated());
    assert!(tracker.active_loop().is_none());
}

#[test]
fn rejection_for_other_loop_is_ignored() {
    let mut tracker = Tracker::from_events("t", conversation(), &slots());
    tracker.append(Event::active_loop_rejected(Some("survey_form".into())));
    assert!(!tracker.active_loop().unwrap().rejected);
}

#[test]
fn hypothetical_leaves_original_untouched() {
    let tracker = Tracker::from_events("t", conversation(), &slots());
    let extra = [Event::slot_set("people", 4)];
    let copy = tracker.hypothetical(&extra);

    assert_eq!(copy.get_slot("people"), Some(&json!(4)));
    assert_eq!(tracker.get_slot("people"), None);
    assert_eq!(copy.events().len(), tracker.events().len() + 1);
}

#[test]
fn latest_entity_values_filter_by_role_and_group() {
    let tracker = Tracker::from_events(
        "t",
        [Event::user(
            UserMessage::new("from berlin to paris")
                .with_entity(Entity::new("city", "Berlin").with_role("origin"))
                .with_entity(Entity::new("city", "Paris").with_role("destination"))
                .with_entity(Entity::new("city", "Rome")),
        )],
        &slots(),
    );

    let origin: Vec<_> = tracker
        .get_latest_entity_values("city", Some("origin"), None)
        .collect();
    assert_eq!(origin, vec![&json!("Berlin")]);

    let plain: Vec<_> = tracker.get_latest_entity_values("city", None, None).collect();
    assert_eq!(plain, vec![&json!("Rome")]);
}

#[test]
fn snapshot_serialises_state_and_events() {
    let tracker = Tracker::from_events("snap", conversation(), &slots());
    let value = serde_json::to_value(tracker.snapshot()).unwrap();

    assert_eq!(value["sender_id"], "snap");
    assert_eq!(value["slots"]["cuisine"], "thai");
    assert_eq!(value["active_loop"]["name"], "booking_form");
    assert_eq!(value["latest_message"]["parse_data"]["intent"]["name"], "inform");
    assert_eq!(value["events"].as_array().unwrap().len(), conversation().len());
}

#[test]
fn new_conversation_gets_a_fresh_sender_id() {
    let first = Tracker::new_conversation(&slots());
    let second = Tracker::new_conversation(&slots());
    assert_ne!(first.sender_id(), second.sender_id());
}
