//! Forms: active loops that collect a list of required slots over several turns.
//!
//! A form run goes through activation, validation of the latest user input,
//! and then either asks for the next missing slot or submits and
//! deactivates itself. A run that cannot extract anything for the slot it
//! asked for is rejected so that another action can be chosen instead.

use std::sync::Arc;

use serde_json::Value;

use crate::core::actions::{
    Action, ActionExecutor, ActionFuture, ActionOutcome, RemoteAction, Rejection,
};
use crate::core::domain::{Domain, FormSpec, validation_action_for};
use crate::core::events::{ACTION_LISTEN_NAME, Event};
use crate::core::slots::SlotResolver;
use crate::core::tracker::Tracker;
use crate::error::ActionError;

/// Slot holding the name of the slot a form is currently asking for.
pub const REQUESTED_SLOT: &str = "requested_slot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FormPhase {
    Inactive,
    Activating,
    Validating,
    RequestingSlot,
    Submitting,
    Deactivating,
}

/// Runs a form declared in the domain.
pub struct FormAction {
    form_name: String,
    executor: Arc<dyn ActionExecutor>,
}

impl FormAction {
    /// `executor` runs the form's custom validation action, if the domain
    /// declares one.
    pub fn new(form_name: impl Into<String>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            form_name: form_name.into(),
            executor,
        }
    }

    /// Where this form stands in `tracker`'s conversation.
    pub fn phase(&self, tracker: &Tracker) -> FormPhase {
        match tracker.active_loop() {
            Some(active_loop) if active_loop.name == self.form_name => {
                if tracker.latest_action_name() == Some(ACTION_LISTEN_NAME) && active_loop.validate
                {
                    FormPhase::Validating
                } else {
                    FormPhase::RequestingSlot
                }
            }
            _ => FormPhase::Inactive,
        }
    }

    fn form<'d>(&self, domain: &'d Domain) -> Result<&'d FormSpec, ActionError> {
        domain
            .form(&self.form_name)
            .ok_or_else(|| ActionError::UnknownForm {
                form_name: self.form_name.clone(),
            })
    }

    async fn run_form(&self, tracker: &Tracker, domain: &Domain) -> Result<ActionOutcome, ActionError> {
        let form = self.form(domain)?;

        // Not returned if the form submits right away.
        let activation_events = match self.activate_if_required(form, tracker, domain).await? {
            ActionOutcome::Completed(events) => events,
            rejected @ ActionOutcome::Rejected(_) => return Ok(rejected),
        };
        let activated = tracker.hypothetical(&activation_events);

        let validation_events = match self.validate(form, &activated, domain, tracker).await? {
            ActionOutcome::Completed(events) => events,
            rejected @ ActionOutcome::Rejected(_) => return Ok(rejected),
        };

        if validation_events.contains(&Event::form_deactivated()) {
            tracing::debug!(form = %self.form_name, "form was deactivated during validation");
            return Ok(ActionOutcome::Completed(validation_events));
        }

        let validated = activated.hypothetical(&validation_events);
        if let Some(next_slot) = self.request_next_slot(form, &validated) {
            let mut events = activation_events;
            events.extend(validation_events);
            events.push(next_slot);
            return Ok(ActionOutcome::Completed(events));
        }

        tracing::debug!(
            form = %self.form_name,
            phase = %FormPhase::Submitting,
            slots = ?form
                .required_slots
                .iter()
                .map(|slot| (slot.as_str(), validated.get_slot(slot)))
                .collect::<Vec<_>>(),
            "no slots left to request, all required slots are filled"
        );
        let mut events = validation_events;
        events.extend(self.deactivate());
        Ok(ActionOutcome::Completed(events))
    }

    /// Activates the form if it is not the active loop yet.
    ///
    /// Required slots that were filled before activation are validated right
    /// away, against the tracker as it would look after activation.
    pub async fn activate_if_required(
        &self,
        form: &FormSpec,
        tracker: &Tracker,
        domain: &Domain,
    ) -> Result<ActionOutcome, ActionError> {
        if tracker.active_loop_name() == Some(self.form_name.as_str()) {
            tracing::debug!(form = %self.form_name, "form is already active");
            return Ok(ActionOutcome::Completed(Vec::new()));
        }

        tracing::debug!(form = %self.form_name, phase = %FormPhase::Activating, "activating form");
        let mut events = vec![Event::form_activated(&self.form_name)];

        let prefilled: Vec<(String, Value)> = form
            .required_slots
            .iter()
            .filter_map(|slot| {
                tracker
                    .get_slot(slot)
                    .map(|value| (slot.clone(), value.clone()))
            })
            .collect();

        if prefilled.is_empty() {
            tracing::debug!(form = %self.form_name, "no pre-filled required slots to validate");
            return Ok(ActionOutcome::Completed(events));
        }

        tracing::debug!(form = %self.form_name, ?prefilled, "validating pre-filled required slots");
        let activated = tracker.hypothetical(&events);
        match self.validate_slots(prefilled, &activated, domain).await? {
            ActionOutcome::Completed(validated) => {
                events.extend(validated);
                Ok(ActionOutcome::Completed(events))
            }
            rejected @ ActionOutcome::Rejected(_) => Ok(rejected),
        }
    }

    /// Extracts slot values from the latest user message and validates them.
    ///
    /// `activated` is the tracker after activation; `original` is the tracker
    /// the run started from and tells whether this run activated the form.
    /// Validation only happens right after the user spoke and while the
    /// loop's validation flag is set.
    pub async fn validate(
        &self,
        form: &FormSpec,
        activated: &Tracker,
        domain: &Domain,
        original: &Tracker,
    ) -> Result<ActionOutcome, ActionError> {
        let validate = activated
            .active_loop()
            .is_some_and(|active_loop| active_loop.validate);
        if activated.latest_action_name() != Some(ACTION_LISTEN_NAME) || !validate {
            tracing::debug!(form = %self.form_name, "skipping validation");
            return Ok(ActionOutcome::Completed(Vec::new()));
        }

        tracing::debug!(form = %self.form_name, phase = %FormPhase::Validating, "validating user input");
        let resolver = SlotResolver::for_form(domain, form);
        let activating = original.active_loop_name() != Some(self.form_name.as_str());
        let requested = activated
            .get_slot(REQUESTED_SLOT)
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut slot_values: Vec<(String, Value)> = form
            .required_slots
            .iter()
            .filter(|slot| requested.as_deref() != Some(slot.as_str()))
            .filter_map(|slot| {
                resolver
                    .resolve_other_slot(slot, activated, activating)
                    .map(|value| (slot.clone(), value))
            })
            .collect();

        if let Some(requested) = requested {
            if let Some(value) = resolver.resolve_slot(&requested, activated) {
                slot_values.push((requested.clone(), value));
            }
            if slot_values.is_empty() {
                return Ok(ActionOutcome::Rejected(Rejection {
                    action_name: self.form_name.clone(),
                    reason: format!(
                        "Failed to extract slot {requested} with action {}",
                        self.form_name
                    ),
                }));
            }
        }

        tracing::debug!(form = %self.form_name, ?slot_values, "validating extracted slots");
        self.validate_slots(slot_values, activated, domain).await
    }

    /// Turns extracted values into `SlotSet` events, passing them through
    /// the form's custom validation action when the domain declares one.
    pub async fn validate_slots(
        &self,
        slot_values: Vec<(String, Value)>,
        tracker: &Tracker,
        domain: &Domain,
    ) -> Result<ActionOutcome, ActionError> {
        let proposed: Vec<Event> = slot_values
            .into_iter()
            .map(|(slot, value)| Event::slot_set(slot, value))
            .collect();

        let validation_action = validation_action_for(&self.form_name);
        let validate = tracker
            .active_loop()
            .is_some_and(|active_loop| active_loop.validate);
        if !domain.has_action(&validation_action) || !validate {
            return Ok(ActionOutcome::Completed(proposed));
        }

        let hypothetical = tracker.hypothetical(&proposed);
        let action = RemoteAction::new(validation_action, Arc::clone(&self.executor));
        match action.run(&hypothetical, domain).await? {
            ActionOutcome::Rejected(rejection) => Ok(ActionOutcome::Rejected(Rejection {
                action_name: self.form_name.clone(),
                reason: rejection.reason,
            })),
            completed @ ActionOutcome::Completed(_) => Ok(completed),
        }
    }

    /// `SlotSet(requested_slot, <slot>)` for the first required slot that is
    /// still unset, or `None` if the form is complete.
    pub fn request_next_slot(&self, form: &FormSpec, tracker: &Tracker) -> Option<Event> {
        let next = form
            .required_slots
            .iter()
            .find(|slot| tracker.get_slot(slot).is_none())?;
        tracing::debug!(form = %self.form_name, slot = %next, phase = %FormPhase::RequestingSlot, "requesting next slot");
        Some(Event::slot_set(REQUESTED_SLOT, next.as_str()))
    }

    pub fn deactivate(&self) -> Vec<Event> {
        tracing::debug!(form = %self.form_name, phase = %FormPhase::Deactivating, "deactivating form");
        vec![
            Event::form_deactivated(),
            Event::slot_set(REQUESTED_SLOT, Value::Null),
        ]
    }
}

impl Action for FormAction {
    fn name(&self) -> &str {
        &self.form_name
    }

    fn run<'a>(
        &'a self,
        tracker: &'a Tracker,
        domain: &'a Domain,
    ) -> ActionFuture<'a, ActionOutcome> {
        Box::pin(self.run_form(tracker, domain))
    }
}
