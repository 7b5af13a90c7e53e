use convo_core::core::domain::{SlotSpec, SlotType};
use convo_core::core::events::{ACTION_LISTEN_NAME, Entity, Event, UserMessage, deserialise_events, serialise_events};
use convo_core::core::slots::{SlotMapping, SlotResolver};
use convo_core::core::tracker::{DialogueState, SlotSchema, Tracker};
use convo_core::Domain;
use serde_json::json;

fn slots() -> Vec<SlotSpec> {
    vec![
        SlotSpec::new("destination", SlotType::Text),
        SlotSpec::new("people", SlotType::Float),
        SlotSpec::new("requested_slot", SlotType::Any).without_influence(),
    ]
}

fn conversation() -> Vec<Event> {
    vec![
        Event::action_listen(),
        Event::user(
            UserMessage::new("two people to Paris")
                .with_intent("inform")
                .with_entity(Entity::new("city", "Paris")),
        ),
        Event::slot_set("destination", "Paris"),
        Event::action("booking_form"),
        Event::form_activated("booking_form"),
        Event::slot_set("requested_slot", "people"),
        Event::bot("How many people?"),
        Event::action_listen(),
        Event::user(UserMessage::new("oops").with_intent("deny")),
        Event::user_utterance_reverted(),
        Event::action_listen(),
        Event::user(UserMessage::new("two").with_intent("inform")),
        Event::slot_set("people", 2),
        Event::action("utter_confirm"),
        Event::action_reverted(),
    ]
}

#[test]
fn replay_matches_incremental_application() {
    let events = conversation();
    let tracker = Tracker::from_events("replay", events.clone(), &slots());

    let schema = SlotSchema::from_slots(&slots());
    let replayed = DialogueState::replay(&schema, tracker.applied_events());

    assert_eq!(tracker.state(), &replayed);
    assert_eq!(tracker.get_slot("people"), Some(&json!(2)));
    assert_eq!(tracker.latest_intent_name(), Some("inform"));
    // The reverted `utter_confirm` no longer counts.
    assert_eq!(tracker.latest_action_name(), Some(ACTION_LISTEN_NAME));
}

#[test]
fn restart_returns_to_a_fresh_state() {
    let mut tracker = Tracker::from_events("restart", conversation(), &slots());
    tracker.append(Event::restarted());

    let fresh = Tracker::new("restart", &slots());
    assert_eq!(tracker.state(), fresh.state());
    assert_eq!(tracker.events_since_last_restart().count(), 0);
    assert_eq!(tracker.events().len(), conversation().len() + 1);
}

#[test]
fn wire_round_trip_keeps_the_applied_state() {
    let original = Tracker::from_events("wire", conversation(), &slots());

    let wire = serialise_events(original.events());
    let events = deserialise_events(wire).unwrap();
    let rebuilt = Tracker::from_events("wire", events, &slots());

    assert_eq!(rebuilt.state(), original.state());
    assert_eq!(rebuilt.events(), original.events());
}

#[test]
fn destination_is_filled_from_the_city_entity() {
    let domain = Domain::default().with_slot(
        SlotSpec::new("destination", SlotType::Text)
            .with_mappings([SlotMapping::from_entity("city")]),
    );
    let tracker = Tracker::from_events(
        "scenario-a",
        [Event::user(
            UserMessage::new("to Paris")
                .with_intent("inform")
                .with_entity(Entity::new("city", "Paris")),
        )],
        domain.slots(),
    );

    let resolver = SlotResolver::new(&domain);
    assert_eq!(resolver.resolve_slot("destination", &tracker), Some(json!("Paris")));
}

#[test]
fn unmapped_slot_behaves_like_an_entity_mapping_of_its_own_name() {
    let implicit = Domain::default().with_slot(SlotSpec::new("city", SlotType::Text));
    let explicit = Domain::default().with_slot(
        SlotSpec::new("city", SlotType::Text).with_mappings([SlotMapping::from_entity("city")]),
    );

    let messages = [
        UserMessage::new("Paris").with_intent("inform").with_entity(Entity::new("city", "Paris")),
        UserMessage::new("nothing").with_intent("inform"),
        UserMessage::new("two cities")
            .with_intent("inform")
            .with_entity(Entity::new("city", "Paris"))
            .with_entity(Entity::new("city", "Rome")),
        UserMessage::new("role")
            .with_intent("inform")
            .with_entity(Entity::new("city", "Berlin").with_role("from")),
    ];

    for message in messages {
        let tracker = Tracker::from_events("implicit", [Event::user(message)], implicit.slots());
        assert_eq!(
            SlotResolver::new(&implicit).resolve_slot("city", &tracker),
            SlotResolver::new(&explicit).resolve_slot("city", &tracker),
        );
    }
}
