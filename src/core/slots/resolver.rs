use std::borrow::Cow;

use serde_json::Value;

use crate::core::domain::{Domain, FormSpec};
use crate::core::tracker::Tracker;

use super::SlotMapping;

/// Extracts slot values from the latest user message.
///
/// Form-level mappings take precedence over slot-level ones. A slot with no
/// mappings at all falls back to an entity of the same name.
#[derive(Debug, Clone, Copy)]
pub struct SlotResolver<'a> {
    domain: &'a Domain,
    form: Option<&'a FormSpec>,
}

impl<'a> SlotResolver<'a> {
    pub fn new(domain: &'a Domain) -> Self {
        Self { domain, form: None }
    }

    pub fn for_form(domain: &'a Domain, form: &'a FormSpec) -> Self {
        Self {
            domain,
            form: Some(form),
        }
    }

    pub fn mappings_for(&self, slot: &str) -> Cow<'a, [SlotMapping]> {
        let form_mappings = self
            .form
            .and_then(|form| form.slot_mappings.get(slot))
            .filter(|mappings| !mappings.is_empty());
        if let Some(mappings) = form_mappings {
            return Cow::Borrowed(mappings.as_slice());
        }

        match self.domain.slot(slot) {
            Some(spec) if !spec.mappings.is_empty() => Cow::Borrowed(spec.mappings.as_slice()),
            _ => Cow::Owned(vec![SlotMapping::from_entity(slot)]),
        }
    }

    /// Extracts a value for the slot the form just asked for.
    ///
    /// The first mapping (in declaration order) that yields a value wins.
    pub fn resolve_slot(&self, slot: &str, tracker: &Tracker) -> Option<Value> {
        for mapping in self.mappings_for(slot).iter() {
            if !mapping.intent_is_desired(tracker) {
                continue;
            }
            let value = match mapping {
                SlotMapping::FromEntity {
                    entity, role, group, ..
                } => entity_value(tracker, entity, role.as_deref(), group.as_deref()),
                SlotMapping::FromIntent { value, .. } => Some(value.clone()),
                SlotMapping::FromTriggerIntent { .. } => None,
                SlotMapping::FromText { .. } => tracker
                    .latest_message()
                    .and_then(|message| message.text.clone())
                    .map(Value::String),
            };
            if let Some(value) = value.filter(|value| !value.is_null()) {
                tracing::debug!(slot, mapping = %mapping.mapping_type(), "extracted requested slot");
                return Some(value);
            }
        }
        tracing::debug!(slot, "failed to extract requested slot");
        None
    }

    /// Extracts a value for a slot the user filled without being asked.
    ///
    /// Only entity mappings apply, plus trigger-intent mappings while the
    /// form is activating.
    pub fn resolve_other_slot(
        &self,
        slot: &str,
        tracker: &Tracker,
        activating: bool,
    ) -> Option<Value> {
        for mapping in self.mappings_for(slot).iter() {
            if !mapping.intent_is_desired(tracker) {
                continue;
            }
            let value = match mapping {
                SlotMapping::FromEntity {
                    entity, role, group, ..
                } => entity_value(tracker, entity, role.as_deref(), group.as_deref()),
                SlotMapping::FromTriggerIntent { value, .. } if activating => Some(value.clone()),
                _ => None,
            };
            if let Some(value) = value.filter(|value| !value.is_null()) {
                tracing::debug!(slot, mapping = %mapping.mapping_type(), "extracted other slot");
                return Some(value);
            }
        }
        None
    }
}

/// Value(s) of an entity in the latest user message: a single match is
/// returned as is, several matches as an array.
pub fn entity_value(
    tracker: &Tracker,
    entity: &str,
    role: Option<&str>,
    group: Option<&str>,
) -> Option<Value> {
    let mut values: Vec<Value> = tracker
        .get_latest_entity_values(entity, role, group)
        .cloned()
        .collect();
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::Array(values)),
    }
}
