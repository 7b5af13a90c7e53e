use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::tracker::Tracker;
use crate::error::MappingError;

/// Restricts a mapping to certain intents of the latest user message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IntentFilter {
    #[default]
    Any,
    Only(BTreeSet<String>),
    Except(BTreeSet<String>),
}

impl IntentFilter {
    /// Builds a filter from the `intent` / `not_intent` lists of a mapping.
    /// Setting both is ambiguous and rejected.
    pub fn from_lists(intent: Vec<String>, not_intent: Vec<String>) -> Result<Self, MappingError> {
        match (intent.is_empty(), not_intent.is_empty()) {
            (true, true) => Ok(Self::Any),
            (false, true) => Ok(Self::Only(intent.into_iter().collect())),
            (true, false) => Ok(Self::Except(not_intent.into_iter().collect())),
            (false, false) => Err(MappingError::ConflictingIntentFilters { intent, not_intent }),
        }
    }

    pub fn only(intents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Only(intents.into_iter().map(Into::into).collect())
    }

    pub fn except(intents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Except(intents.into_iter().map(Into::into).collect())
    }

    /// A message without an intent only passes the unrestricted filter and
    /// exclusion filters.
    pub fn matches(&self, intent: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(allowed) => intent.is_some_and(|intent| allowed.contains(intent)),
            Self::Except(excluded) => intent.is_none_or(|intent| !excluded.contains(intent)),
        }
    }

    fn write_into(&self, object: &mut Map<String, Value>) {
        let (key, intents) = match self {
            Self::Any => return,
            Self::Only(intents) => ("intent", intents),
            Self::Except(intents) => ("not_intent", intents),
        };
        object.insert(
            key.to_string(),
            Value::Array(intents.iter().cloned().map(Value::String).collect()),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SlotMappingType {
    FromEntity,
    FromIntent,
    FromTriggerIntent,
    FromText,
}

/// A rule describing how a slot is filled from user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum SlotMapping {
    FromEntity {
        entity: String,
        role: Option<String>,
        group: Option<String>,
        intents: IntentFilter,
    },
    FromIntent {
        value: Value,
        intents: IntentFilter,
    },
    /// Only applies while the form is being activated.
    FromTriggerIntent {
        value: Value,
        intents: IntentFilter,
    },
    FromText {
        intents: IntentFilter,
    },
}

impl SlotMapping {
    pub fn from_entity(entity: impl Into<String>) -> Self {
        Self::FromEntity {
            entity: entity.into(),
            role: None,
            group: None,
            intents: IntentFilter::Any,
        }
    }

    pub fn from_intent(value: impl Into<Value>) -> Self {
        Self::FromIntent {
            value: value.into(),
            intents: IntentFilter::Any,
        }
    }

    pub fn from_trigger_intent(value: impl Into<Value>) -> Self {
        Self::FromTriggerIntent {
            value: value.into(),
            intents: IntentFilter::Any,
        }
    }

    pub fn from_text() -> Self {
        Self::FromText {
            intents: IntentFilter::Any,
        }
    }

    pub fn with_intents(mut self, filter: IntentFilter) -> Self {
        match &mut self {
            Self::FromEntity { intents, .. }
            | Self::FromIntent { intents, .. }
            | Self::FromTriggerIntent { intents, .. }
            | Self::FromText { intents } => *intents = filter,
        }
        self
    }

    /// Only meaningful for entity mappings; other mappings are returned unchanged.
    pub fn with_role(mut self, value: impl Into<String>) -> Self {
        if let Self::FromEntity { role, .. } = &mut self {
            *role = Some(value.into());
        }
        self
    }

    /// Only meaningful for entity mappings; other mappings are returned unchanged.
    pub fn with_group(mut self, value: impl Into<String>) -> Self {
        if let Self::FromEntity { group, .. } = &mut self {
            *group = Some(value.into());
        }
        self
    }

    pub fn mapping_type(&self) -> SlotMappingType {
        match self {
            Self::FromEntity { .. } => SlotMappingType::FromEntity,
            Self::FromIntent { .. } => SlotMappingType::FromIntent,
            Self::FromTriggerIntent { .. } => SlotMappingType::FromTriggerIntent,
            Self::FromText { .. } => SlotMappingType::FromText,
        }
    }

    pub fn intents(&self) -> &IntentFilter {
        match self {
            Self::FromEntity { intents, .. }
            | Self::FromIntent { intents, .. }
            | Self::FromTriggerIntent { intents, .. }
            | Self::FromText { intents } => intents,
        }
    }

    /// Whether the latest user intent passes this mapping's intent filter.
    pub fn intent_is_desired(&self, tracker: &Tracker) -> bool {
        self.intents().matches(tracker.latest_intent_name())
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

impl TryFrom<Value> for SlotMapping {
    type Error = MappingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(object) = value else {
            return Err(MappingError::NotAMapping(value.to_string()));
        };

        let mapping_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MappingError::MissingType)?;
        let mapping_type: SlotMappingType = mapping_type
            .parse()
            .map_err(|_| MappingError::UnsupportedType(mapping_type.to_string()))?;

        let intents = IntentFilter::from_lists(
            string_list(object.get("intent")),
            string_list(object.get("not_intent")),
        )?;
        let value = object.get("value").cloned().unwrap_or(Value::Null);

        let mapping = match mapping_type {
            SlotMappingType::FromEntity => Self::FromEntity {
                entity: optional_string(&object, "entity").ok_or(MappingError::MissingField {
                    mapping_type: "from_entity",
                    field: "entity",
                })?,
                role: optional_string(&object, "role"),
                group: optional_string(&object, "group"),
                intents,
            },
            SlotMappingType::FromIntent => Self::FromIntent { value, intents },
            SlotMappingType::FromTriggerIntent => Self::FromTriggerIntent { value, intents },
            SlotMappingType::FromText => Self::FromText { intents },
        };
        Ok(mapping)
    }
}

impl From<SlotMapping> for Value {
    fn from(mapping: SlotMapping) -> Self {
        let mut object = Map::new();
        object.insert(
            "type".into(),
            Value::String(mapping.mapping_type().to_string()),
        );
        mapping.intents().write_into(&mut object);
        match mapping {
            SlotMapping::FromEntity {
                entity,
                role,
                group,
                ..
            } => {
                object.insert("entity".into(), Value::String(entity));
                if let Some(role) = role {
                    object.insert("role".into(), Value::String(role));
                }
                if let Some(group) = group {
                    object.insert("group".into(), Value::String(group));
                }
            }
            SlotMapping::FromIntent { value, .. } | SlotMapping::FromTriggerIntent { value, .. } => {
                object.insert("value".into(), value);
            }
            SlotMapping::FromText { .. } => {}
        }
        Value::Object(object)
    }
}
