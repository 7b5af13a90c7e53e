//! Flows: declarative business processes made of linked steps.

mod step;

pub use step::{END_STEP, FlowStep, FlowStepKind, FlowStepLink, Rejection};

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::core::domain::Domain;
use crate::error::FlowError;

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<FlowStep>,
}

impl Flow {
    /// Parses `{"name"?, "description"?, "steps": [...]}`. The name
    /// defaults to the id.
    pub fn from_value(id: impl Into<String>, value: &Value) -> Result<Self, FlowError> {
        let id = id.into();
        let steps = value
            .get("steps")
            .and_then(Value::as_array)
            .ok_or_else(|| FlowError::Parse(format!("flow '{id}' has no list of steps")))?
            .iter()
            .enumerate()
            .map(|(idx, step)| FlowStep::from_value(idx, step))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: value
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| id.clone(), str::to_string),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            id,
            steps,
        })
    }

    pub fn step_ids(&self) -> HashSet<String> {
        self.steps.iter().map(FlowStep::id).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowsList {
    flows: Vec<Flow>,
}

impl FlowsList {
    pub fn new(flows: Vec<Flow>) -> Self {
        Self { flows }
    }

    /// Parses `{"flows": {id: flow, ...}}` or a bare `{id: flow, ...}` map.
    pub fn from_value(value: &Value) -> Result<Self, FlowError> {
        let flows = value.get("flows").unwrap_or(value);
        let flows = flows
            .as_object()
            .ok_or_else(|| FlowError::Parse("flows must be a mapping of flow ids".into()))?;
        flows
            .iter()
            .map(|(id, flow)| Flow::from_value(id.as_str(), flow))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|flow| flow.id == id)
    }

    /// Checks the flows against each other and against `domain`. The first
    /// problem found is returned.
    pub fn validate(&self, domain: &Domain) -> Result<(), FlowError> {
        self.verify_unique()?;
        for flow in &self.flows {
            self.verify_links(flow)?;
            verify_against_domain(flow, domain)?;
            verify_conditions(flow)?;
        }
        Ok(())
    }

    fn verify_unique(&self) -> Result<(), FlowError> {
        let mut names = HashSet::new();
        let mut descriptions = HashSet::new();
        for flow in &self.flows {
            if let Some(description) = &flow.description
                && !descriptions.insert(strip_punctuation(description))
            {
                return Err(FlowError::DuplicateDescription(flow.name.clone()));
            }
            if !names.insert(flow.name.as_str()) {
                return Err(FlowError::DuplicateName(flow.name.clone()));
            }
        }
        Ok(())
    }

    fn verify_links(&self, flow: &Flow) -> Result<(), FlowError> {
        let step_ids = flow.step_ids();
        for step in &flow.steps {
            for link in &step.next {
                let target = link.target();
                if target != END_STEP && !step_ids.contains(target) {
                    return Err(FlowError::UnknownLinkTarget {
                        target: target.to_string(),
                        step: step.id(),
                        flow: flow.id.clone(),
                    });
                }
            }
            if let FlowStepKind::Link { flow: linked } = &step.kind
                && self.flow(linked).is_none()
            {
                return Err(FlowError::UnknownLinkTarget {
                    target: linked.clone(),
                    step: step.id(),
                    flow: flow.id.clone(),
                });
            }
        }
        Ok(())
    }
}

fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

fn verify_against_domain(flow: &Flow, domain: &Domain) -> Result<(), FlowError> {
    let slots: BTreeSet<&str> = domain.slots().iter().map(|slot| slot.name.as_str()).collect();
    let unknown_slot = |slot: &str, step: &FlowStep| FlowError::UnknownSlot {
        slot: slot.to_string(),
        step: step.id(),
        flow: flow.id.clone(),
    };

    for step in &flow.steps {
        match &step.kind {
            FlowStepKind::Collect { slot, .. } if !slots.contains(slot.as_str()) => {
                return Err(unknown_slot(slot, step));
            }
            FlowStepKind::SetSlots { slots: assigned } => {
                if let Some((slot, _)) = assigned
                    .iter()
                    .find(|(slot, _)| !slots.contains(slot.as_str()))
                {
                    return Err(unknown_slot(slot, step));
                }
            }
            FlowStepKind::Action { action } if !domain.has_action(action) => {
                return Err(FlowError::UnknownAction {
                    action: action.clone(),
                    step: step.id(),
                    flow: flow.id.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Conditions must be non-empty with balanced parentheses.
fn is_valid_condition(condition: &str) -> bool {
    let mut depth = 0_i32;
    for c in condition.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !condition.trim().is_empty()
}

fn verify_conditions(flow: &Flow) -> Result<(), FlowError> {
    for step in &flow.steps {
        let link_conditions = step.next.iter().filter_map(|link| match link {
            FlowStepLink::If { condition, .. } => Some(condition.as_str()),
            _ => None,
        });
        let rejection_conditions: Vec<&str> = match &step.kind {
            FlowStepKind::Collect { rejections, .. } => rejections
                .iter()
                .map(|rejection| rejection.condition.as_str())
                .collect(),
            _ => Vec::new(),
        };

        if let Some(condition) = link_conditions
            .chain(rejection_conditions)
            .find(|condition| !is_valid_condition(condition))
        {
            return Err(FlowError::InvalidCondition {
                condition: condition.to_string(),
                step: step.id(),
                flow: flow.id.clone(),
            });
        }
    }
    Ok(())
}
