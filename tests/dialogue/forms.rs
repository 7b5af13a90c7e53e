use std::sync::Arc;

use convo_core::core::actions::{ActionOutcome, StubActionExecutor, StubCustomAction, StubRegistry};
use convo_core::core::domain::{FormSpec, SlotSpec, SlotType};
use convo_core::core::events::{Entity, Event, UserMessage};
use convo_core::core::forms::{FormAction, FormPhase, REQUESTED_SLOT};
use convo_core::core::slots::SlotMapping;
use convo_core::core::tracker::Tracker;
use convo_core::{Action, Conversation, Domain};
use serde_json::{Value, json};

const FORM: &str = "book_restaurant";

fn domain() -> Domain {
    Domain::default()
        .with_intents(["request_restaurant", "inform", "chitchat"])
        .with_slot(SlotSpec::new("time", SlotType::Text))
        .with_slot(
            SlotSpec::new("people", SlotType::Float)
                .with_mappings([SlotMapping::from_entity("number")]),
        )
        .with_form(FormSpec::new(FORM, ["time", "people"]))
        .with_actions(["utter_chitchat"])
}

fn user(message: UserMessage) -> [Event; 2] {
    [Event::action_listen(), Event::user(message)]
}

#[test]
fn next_slot_is_the_first_unset_required_slot() {
    let domain = domain();
    let tracker = Tracker::from_events(
        "scenario-b",
        [
            Event::form_activated(FORM),
            Event::slot_set("time", "19:00"),
        ],
        domain.slots(),
    );
    let form = FormAction::new(FORM, Arc::new(StubActionExecutor::default()));

    assert_eq!(
        form.request_next_slot(domain.form(FORM).unwrap(), &tracker),
        Some(Event::slot_set(REQUESTED_SLOT, "people"))
    );
}

#[tokio::test]
async fn form_collects_slots_over_several_turns() {
    let domain = domain();
    let form = FormAction::new(FORM, Arc::new(StubActionExecutor::default()));
    let mut conversation = Conversation::new(Tracker::new("booking", domain.slots()));

    conversation.append(user(UserMessage::new("a table please").with_intent("request_restaurant")));
    conversation.execute(&form, &domain).await.unwrap();
    assert_eq!(conversation.tracker().active_loop_name(), Some(FORM));
    assert_eq!(conversation.tracker().get_slot(REQUESTED_SLOT), Some(&json!("time")));

    conversation.append(user(
        UserMessage::new("at seven")
            .with_intent("inform")
            .with_entity(Entity::new("time", "19:00")),
    ));
    assert_eq!(form.phase(conversation.tracker()), FormPhase::Validating);
    conversation.execute(&form, &domain).await.unwrap();
    assert_eq!(conversation.tracker().get_slot("time"), Some(&json!("19:00")));
    assert_eq!(conversation.tracker().get_slot(REQUESTED_SLOT), Some(&json!("people")));

    // Nothing to extract: the form declines and another action takes over.
    conversation.append(user(UserMessage::new("nice weather").with_intent("chitchat")));
    let outcome = conversation.execute(&form, &domain).await.unwrap();
    assert!(outcome.is_rejected());
    assert!(conversation.tracker().active_loop().is_some_and(|l| l.rejected));
    assert_eq!(
        conversation.tracker().events().last(),
        Some(&Event::active_loop_rejected(Some(FORM.into())))
    );
    conversation.append([Event::action("utter_chitchat"), Event::bot("Indeed!")]);

    conversation.append(user(
        UserMessage::new("four of us")
            .with_intent("inform")
            .with_entity(Entity::new("number", 4)),
    ));
    let outcome = conversation.execute(&form, &domain).await.unwrap();
    assert!(outcome.events().contains(&Event::form_deactivated()));

    let tracker = conversation.tracker();
    assert_eq!(tracker.active_loop_name(), None);
    assert_eq!(tracker.get_slot("people"), Some(&json!(4)));
    assert_eq!(tracker.get_slot(REQUESTED_SLOT), None);
}

#[tokio::test]
async fn custom_validation_can_rewrite_extracted_values() {
    let domain = domain().with_actions(["action_validate_book_restaurant"]);
    let mut registry = StubRegistry::default();
    registry.insert(
        "action_validate_book_restaurant",
        StubCustomAction::from_value(
            "action_validate_book_restaurant",
            json!({"events": [{"event": "slot", "name": "time", "value": "19:30"}]}),
        )
        .unwrap(),
    );
    let form = FormAction::new(FORM, Arc::new(StubActionExecutor::new(registry)));

    let mut tracker = Tracker::new("validated", domain.slots());
    tracker.extend([
        Event::action(FORM),
        Event::form_activated(FORM),
        Event::slot_set(REQUESTED_SLOT, "time"),
    ]);
    tracker.extend(user(
        UserMessage::new("half seven")
            .with_intent("inform")
            .with_entity(Entity::new("time", "19:00")),
    ));

    let ActionOutcome::Completed(events) = form.run(&tracker, &domain).await.unwrap() else {
        panic!("form run was rejected");
    };
    assert_eq!(
        events,
        vec![
            Event::slot_set("time", "19:30"),
            Event::slot_set(REQUESTED_SLOT, "people"),
        ]
    );
    assert_eq!(tracker.get_slot("time"), None::<&Value>);
}
