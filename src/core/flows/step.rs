use serde_json::{Map, Value};

use crate::error::FlowError;

/// Target name that ends the flow.
pub const END_STEP: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStepLink {
    Static(String),
    If { condition: String, target: String },
    Else(String),
}

impl FlowStepLink {
    pub fn target(&self) -> &str {
        match self {
            Self::Static(target) | Self::If { target, .. } | Self::Else(target) => target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub condition: String,
    pub utter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStepKind {
    Action { action: String },
    UserMessage { intent: String },
    Collect { slot: String, rejections: Vec<Rejection> },
    Link { flow: String },
    SetSlots { slots: Vec<(String, Value)> },
    GenerateResponse { generation_prompt: String },
    Branch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    pub custom_id: Option<String>,
    pub idx: usize,
    pub description: Option<String>,
    pub metadata: Map<String, Value>,
    pub next: Vec<FlowStepLink>,
    pub kind: FlowStepKind,
}

impl FlowStep {
    /// The step's explicit id, or `"{idx}_{postfix}"` derived from its kind.
    pub fn id(&self) -> String {
        self.custom_id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.idx, self.default_id_postfix()))
    }

    fn default_id_postfix(&self) -> String {
        match &self.kind {
            FlowStepKind::Action { action } => action.clone(),
            FlowStepKind::UserMessage { intent } => format!("intent_{intent}"),
            FlowStepKind::Collect { slot, .. } => format!("collect_{slot}"),
            FlowStepKind::Link { flow } => format!("link_{flow}"),
            FlowStepKind::SetSlots { .. } => "set_slots".into(),
            FlowStepKind::GenerateResponse { .. } => "generate".into(),
            FlowStepKind::Branch => "branch".into(),
        }
    }

    /// Parses a step; its kind is detected from the keys present.
    pub fn from_value(idx: usize, value: &Value) -> Result<Self, FlowError> {
        let object = value
            .as_object()
            .ok_or_else(|| FlowError::Parse(format!("step {idx} is not an object")))?;

        let kind = if let Some(action) = object.get("action") {
            FlowStepKind::Action {
                action: required_str(action, "action", idx)?,
            }
        } else if let Some(intent) = object.get("intent") {
            FlowStepKind::UserMessage {
                intent: required_str(intent, "intent", idx)?,
            }
        } else if let Some(slot) = object.get("collect") {
            FlowStepKind::Collect {
                slot: required_str(slot, "collect", idx)?,
                rejections: parse_rejections(object.get("rejections"), idx)?,
            }
        } else if let Some(flow) = object.get("link") {
            FlowStepKind::Link {
                flow: required_str(flow, "link", idx)?,
            }
        } else if let Some(slots) = object.get("set_slots") {
            FlowStepKind::SetSlots {
                slots: parse_set_slots(slots, idx)?,
            }
        } else if let Some(prompt) = object.get("generation_prompt") {
            FlowStepKind::GenerateResponse {
                generation_prompt: required_str(prompt, "generation_prompt", idx)?,
            }
        } else {
            FlowStepKind::Branch
        };

        Ok(Self {
            custom_id: object.get("id").and_then(Value::as_str).map(str::to_string),
            idx,
            description: object
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            metadata: object
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            next: parse_links(object.get("next"), idx)?,
            kind,
        })
    }
}

fn required_str(value: &Value, key: &str, idx: usize) -> Result<String, FlowError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FlowError::Parse(format!("'{key}' of step {idx} must be a string")))
}

fn parse_rejections(value: Option<&Value>, idx: usize) -> Result<Vec<Rejection>, FlowError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| FlowError::Parse(format!("rejections of step {idx} must be a list")))?;
    items
        .iter()
        .map(|item| {
            let condition = item
                .get("if")
                .ok_or_else(|| FlowError::Parse(format!("rejection of step {idx} has no 'if'")))?;
            Ok(Rejection {
                condition: required_str(condition, "if", idx)?,
                utter: item.get("utter").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

fn parse_set_slots(value: &Value, idx: usize) -> Result<Vec<(String, Value)>, FlowError> {
    let items = value
        .as_array()
        .ok_or_else(|| FlowError::Parse(format!("set_slots of step {idx} must be a list")))?;
    let mut slots = Vec::new();
    for item in items {
        let object = item.as_object().ok_or_else(|| {
            FlowError::Parse(format!("set_slots entries of step {idx} must be objects"))
        })?;
        slots.extend(object.iter().map(|(slot, value)| (slot.clone(), value.clone())));
    }
    Ok(slots)
}

fn parse_links(value: Option<&Value>, idx: usize) -> Result<Vec<FlowStepLink>, FlowError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(target)) => Ok(vec![FlowStepLink::Static(target.clone())]),
        Some(Value::Array(items)) => items.iter().map(|item| parse_link(item, idx)).collect(),
        Some(other) => Err(FlowError::Parse(format!(
            "'next' of step {idx} must be a string or a list, got {other}"
        ))),
    }
}

fn parse_link(item: &Value, idx: usize) -> Result<FlowStepLink, FlowError> {
    if let Some(target) = item.get("else") {
        return Ok(FlowStepLink::Else(link_target(target, idx)?));
    }
    let (Some(condition), Some(target)) = (item.get("if"), item.get("then")) else {
        return Err(FlowError::Parse(format!(
            "links of step {idx} need either 'if' and 'then' or 'else'"
        )));
    };
    Ok(FlowStepLink::If {
        condition: condition.as_str().unwrap_or_default().to_string(),
        target: link_target(target, idx)?,
    })
}

fn link_target(value: &Value, idx: usize) -> Result<String, FlowError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        FlowError::Parse(format!(
            "link targets of step {idx} must be step ids; nested steps are not supported"
        ))
    })
}
