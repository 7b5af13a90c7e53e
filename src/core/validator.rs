//! Consistency checks across the domain, the training stories and flows.

use std::collections::BTreeSet;

use crate::core::domain::Domain;
use crate::core::events::{ACTION_LISTEN_NAME, EventKind};
use crate::core::flows::{FlowStepKind, FlowsList};
use crate::core::stories::{StoryGraph, find_story_conflicts};
use crate::error::FlowError;

/// Actions every assistant has without declaring them.
pub const DEFAULT_ACTION_NAMES: &[&str] = &[
    ACTION_LISTEN_NAME,
    "action_restart",
    "action_session_start",
    "action_default_fallback",
    "action_deactivate_loop",
    "action_revert_fallback_events",
    "action_default_ask_affirmation",
    "action_default_ask_rephrase",
    "action_two_stage_fallback",
    "action_unlikely_intent",
    "action_back",
    "action_extract_slots",
];

/// Intents every assistant has without declaring them.
pub const DEFAULT_INTENT_NAMES: &[&str] = &[
    "restart",
    "back",
    "out_of_scope",
    "session_start",
    "nlu_fallback",
];

const UTTER_PREFIX: &str = "utter_";
const UTTER_ASK_PREFIX: &str = "utter_ask_";
/// Separates a response selector key from its sub-intent, as in `utter_faq/hours`.
const RESPONSE_KEY_DELIMITER: char = '/';

pub struct StoryValidator<'a> {
    domain: &'a Domain,
    stories: &'a StoryGraph,
    flows: &'a FlowsList,
}

impl<'a> StoryValidator<'a> {
    pub fn new(domain: &'a Domain, stories: &'a StoryGraph, flows: &'a FlowsList) -> Self {
        Self {
            domain,
            stories,
            flows,
        }
    }

    /// Every story check; `false` when any of them found a problem.
    pub fn verify_all(&self, ignore_warnings: bool, max_history: Option<usize>) -> bool {
        let checks = [
            self.verify_intents_in_stories(ignore_warnings),
            self.verify_actions_in_stories(),
            self.verify_utterances_in_dialogues(ignore_warnings),
            self.verify_forms_in_stories(),
            self.verify_form_slots(),
            self.verify_story_structure(ignore_warnings, max_history),
        ];
        checks.into_iter().all(|passed| passed)
    }

    /// Conflicting stories fail the check unless `ignore_warnings` is set.
    pub fn verify_story_structure(&self, ignore_warnings: bool, max_history: Option<usize>) -> bool {
        let trackers = self.stories.generate_story_trackers(self.domain);
        let conflicts = find_story_conflicts(&trackers, self.domain, max_history);
        if conflicts.is_empty() {
            tracing::debug!(stories = trackers.len(), "no story structure conflicts found");
        }
        ignore_warnings || conflicts.is_empty()
    }

    /// Intents used in stories must be declared; declared intents no story
    /// uses are only reported.
    pub fn verify_intents_in_stories(&self, ignore_warnings: bool) -> bool {
        let mut valid = true;
        let mut used = BTreeSet::new();
        for step in self.stories.steps() {
            for event in &step.events {
                if let EventKind::UserUttered(message) = event.kind()
                    && let Some(intent) = message.intent_name()
                    && used.insert(intent)
                    && !self.domain.intents().contains(intent)
                {
                    tracing::warn!(
                        story = %step.block_name,
                        intent,
                        "story uses an intent that is not in the domain"
                    );
                    valid = false;
                }
            }
        }

        let unused = self.domain.intents().iter().filter(|intent| {
            !used.contains(intent.as_str()) && !DEFAULT_INTENT_NAMES.contains(&intent.as_str())
        });
        for intent in unused {
            tracing::warn!(intent = %intent, "intent is not used in any story");
        }
        ignore_warnings || valid
    }

    pub fn verify_actions_in_stories(&self) -> bool {
        let unknown = self.unknown_story_actions();
        for (story, action) in &unknown {
            tracing::warn!(story, action, "story uses an action that is not in the domain");
        }
        unknown.is_empty()
    }

    pub fn verify_forms_in_stories(&self) -> bool {
        let unknown = self.unknown_story_forms();
        for (story, form) in &unknown {
            tracing::warn!(story, form, "story activates a form that is not in the domain");
        }
        unknown.is_empty()
    }

    /// Undeclared actions paired with the first story using them.
    fn unknown_story_actions(&self) -> Vec<(&str, &str)> {
        let mut visited = BTreeSet::new();
        let mut unknown = Vec::new();
        for step in self.stories.steps() {
            for action in step.events.iter().filter_map(|event| event.action_name()) {
                if visited.insert(action)
                    && !self.domain.has_action(action)
                    && !DEFAULT_ACTION_NAMES.contains(&action)
                {
                    unknown.push((step.block_name.as_str(), action));
                }
            }
        }
        unknown
    }

    /// Undeclared forms paired with the first story activating them.
    fn unknown_story_forms(&self) -> Vec<(&str, &str)> {
        let mut visited = BTreeSet::new();
        let mut unknown = Vec::new();
        for step in self.stories.steps() {
            for event in &step.events {
                if let EventKind::FormActivated { name } = event.kind()
                    && visited.insert(name.as_str())
                    && self.domain.form(name).is_none()
                {
                    unknown.push((step.block_name.as_str(), name.as_str()));
                }
            }
        }
        unknown
    }

    /// `utter_` actions in stories need a response; responses no story or
    /// flow uses are only reported.
    pub fn verify_utterances_in_dialogues(&self, ignore_warnings: bool) -> bool {
        let responses: BTreeSet<&str> = self
            .domain
            .responses()
            .keys()
            .map(|name| {
                name.split_once(RESPONSE_KEY_DELIMITER)
                    .map_or(name.as_str(), |(base, _)| base)
            })
            .collect();

        let story_utterances: BTreeSet<&str> = self
            .stories
            .steps()
            .iter()
            .flat_map(|step| step.events.iter().filter_map(|event| event.action_name()))
            .filter(|action| action.starts_with(UTTER_PREFIX))
            .collect();
        let flow_utterances: BTreeSet<String> = self
            .flows
            .flows()
            .iter()
            .flat_map(|flow| &flow.steps)
            .filter_map(|step| match &step.kind {
                FlowStepKind::Action { action } if action.starts_with(UTTER_PREFIX) => {
                    Some(action.clone())
                }
                FlowStepKind::Collect { slot, .. } => Some(format!("{UTTER_ASK_PREFIX}{slot}")),
                _ => None,
            })
            .collect();

        let mut valid = true;
        for utterance in &story_utterances {
            if !responses.contains(utterance) {
                tracing::warn!(
                    action = %utterance,
                    "story uses an utterance action that has no response"
                );
                valid = false;
            }
        }
        for response in &responses {
            if !story_utterances.contains(response) && !flow_utterances.contains(*response) {
                tracing::warn!(response = %response, "response is not used in any story or flow");
            }
        }
        ignore_warnings || valid
    }

    /// Required slots and form slot mappings must name declared slots.
    pub fn verify_form_slots(&self) -> bool {
        let mut valid = true;
        for form in self.domain.forms().values() {
            let referenced = form
                .required_slots
                .iter()
                .chain(form.slot_mappings.keys());
            for slot in referenced {
                if self.domain.slot(slot).is_none() {
                    tracing::warn!(
                        form = %form.name,
                        slot = %slot,
                        "form references a slot that is not in the domain"
                    );
                    valid = false;
                }
            }
        }
        valid
    }

    pub fn verify_flows_structure(&self) -> Result<(), FlowError> {
        if self.flows.is_empty() {
            tracing::warn!("no flows were found");
            return Ok(());
        }
        self.flows.validate(self.domain)
    }
}
