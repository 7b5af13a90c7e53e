//! The assistant's universe: intents, slots, forms, actions and responses.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::forms::REQUESTED_SLOT;
use crate::core::slots::SlotMapping;
use crate::core::tracker::SlotSchema;
use crate::error::ConfigError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlotType {
    #[default]
    Text,
    Bool,
    Categorical,
    Float,
    List,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub initial_value: Value,
    pub mappings: Vec<SlotMapping>,
    /// Whether the slot is part of the dialogue state used for predictions.
    pub influence_conversation: bool,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            initial_value: Value::Null,
            mappings: Vec::new(),
            influence_conversation: true,
        }
    }

    pub fn with_mappings(mut self, mappings: impl IntoIterator<Item = SlotMapping>) -> Self {
        self.mappings = mappings.into_iter().collect();
        self
    }

    pub fn with_initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = value.into();
        self
    }

    pub fn without_influence(mut self) -> Self {
        self.influence_conversation = false;
        self
    }
}

/// A form: the slots it must fill, in order, plus form-level mapping overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormSpec {
    pub name: String,
    pub required_slots: Vec<String>,
    pub slot_mappings: BTreeMap<String, Vec<SlotMapping>>,
}

impl FormSpec {
    pub fn new(
        name: impl Into<String>,
        required_slots: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            required_slots: required_slots.into_iter().map(Into::into).collect(),
            slot_mappings: BTreeMap::new(),
        }
    }

    pub fn with_slot_mappings(
        mut self,
        slot: impl Into<String>,
        mappings: impl IntoIterator<Item = SlotMapping>,
    ) -> Self {
        self.slot_mappings
            .insert(slot.into(), mappings.into_iter().collect());
        self
    }
}

/// Name of the custom action that validates slots extracted for `form`.
pub fn validation_action_for(form: &str) -> String {
    format!("action_validate_{form}")
}

/// The assistant's domain.
///
/// Built with the `with_*` methods so that derived entries stay consistent:
/// adding a form registers its name as an action and declares the
/// `requested_slot` slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Domain {
    intents: BTreeSet<String>,
    slots: Vec<SlotSpec>,
    forms: BTreeMap<String, FormSpec>,
    action_names: BTreeSet<String>,
    responses: BTreeMap<String, Vec<Value>>,
}

impl Domain {
    pub fn with_intents(mut self, intents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.intents.extend(intents.into_iter().map(Into::into));
        self
    }

    /// Adds (or replaces) a slot declaration.
    pub fn with_slot(mut self, slot: SlotSpec) -> Self {
        match self.slots.iter_mut().find(|existing| existing.name == slot.name) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
        self
    }

    pub fn with_form(mut self, form: FormSpec) -> Self {
        if self.slot(REQUESTED_SLOT).is_none() {
            self.slots
                .push(SlotSpec::new(REQUESTED_SLOT, SlotType::Any).without_influence());
        }
        self.action_names.insert(form.name.clone());
        self.forms.insert(form.name.clone(), form);
        self
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.action_names
            .extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_response(mut self, name: impl Into<String>, variations: Vec<Value>) -> Self {
        let name = name.into();
        self.action_names.insert(name.clone());
        self.responses.insert(name, variations);
        self
    }

    /// Parses a domain from its JSON representation.
    ///
    /// Slot mappings are validated here so that a malformed mapping fails at
    /// load time with the offending slot named.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let raw: RawDomain = serde_json::from_value(value)
            .map_err(|error| ConfigError::Load(format!("invalid domain: {error}")))?;

        let mut domain = Self::default()
            .with_intents(raw.intents)
            .with_actions(raw.actions);

        for (name, slot) in raw.slots {
            let mappings = parse_mappings(&name, slot.mappings)?;
            let mut spec = SlotSpec::new(name, slot.slot_type)
                .with_mappings(mappings)
                .with_initial_value(slot.initial_value);
            spec.influence_conversation = slot.influence_conversation;
            domain = domain.with_slot(spec);
        }

        for (name, form) in raw.forms {
            let mut spec = FormSpec::new(name, form.required_slots);
            for (slot, mappings) in form.slot_mappings {
                let mappings = match mappings {
                    Value::Array(items) => items,
                    single => vec![single],
                };
                spec = spec.with_slot_mappings(slot.clone(), parse_mappings(&slot, mappings)?);
            }
            domain = domain.with_form(spec);
        }

        for (name, variations) in raw.responses {
            domain = domain.with_response(name, variations);
        }

        Ok(domain)
    }

    pub fn intents(&self) -> &BTreeSet<String> {
        &self.intents
    }

    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn forms(&self) -> &BTreeMap<String, FormSpec> {
        &self.forms
    }

    pub fn form(&self, name: &str) -> Option<&FormSpec> {
        self.forms.get(name)
    }

    pub fn action_names(&self) -> &BTreeSet<String> {
        &self.action_names
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.action_names.contains(name)
    }

    pub fn responses(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.responses
    }

    pub fn slot_schema(&self) -> Arc<SlotSchema> {
        Arc::new(SlotSchema::from_slots(&self.slots))
    }
}

fn parse_mappings(slot: &str, raw: Vec<Value>) -> Result<Vec<SlotMapping>, ConfigError> {
    raw.into_iter()
        .map(|value| {
            SlotMapping::try_from(value).map_err(|source| ConfigError::SlotMapping {
                slot: slot.to_string(),
                source,
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct RawDomain {
    #[serde(default)]
    intents: Vec<String>,
    #[serde(default)]
    slots: BTreeMap<String, RawSlot>,
    #[serde(default)]
    forms: BTreeMap<String, RawForm>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    responses: BTreeMap<String, Vec<Value>>,
}

#[derive(Deserialize)]
struct RawSlot {
    #[serde(rename = "type", default)]
    slot_type: SlotType,
    #[serde(default)]
    initial_value: Value,
    #[serde(default)]
    mappings: Vec<Value>,
    #[serde(default = "default_influence")]
    influence_conversation: bool,
}

fn default_influence() -> bool {
    true
}

#[derive(Deserialize)]
struct RawForm {
    #[serde(default)]
    required_slots: Vec<String>,
    #[serde(default)]
    slot_mappings: BTreeMap<String, Value>,
}
