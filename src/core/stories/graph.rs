use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::domain::Domain;
use crate::core::events::{Event, EventKind};
use crate::core::tracker::Tracker;

/// Checkpoint every story begins at.
pub const STORY_START: &str = "STORY_START";

/// Upper bound on generated trackers; checkpoint graphs can fan out quickly.
const MAX_STORY_TRACKERS: usize = 10_000;

/// A named join point between story steps, optionally guarded by slot values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    #[serde(default)]
    pub conditions: BTreeMap<String, Value>,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, slot: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(slot.into(), value.into());
        self
    }

    /// Every condition must equal the slot's current value; an unset slot
    /// only satisfies a `null` condition.
    pub fn is_satisfied_by(&self, tracker: &Tracker) -> bool {
        self.conditions
            .iter()
            .all(|(slot, expected)| tracker.get_slot(slot).unwrap_or(&Value::Null) == expected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryStep {
    pub block_name: String,
    pub start_checkpoints: Vec<Checkpoint>,
    pub end_checkpoints: Vec<Checkpoint>,
    pub events: Vec<Event>,
}

impl StoryStep {
    /// A step that starts a story and ends it.
    pub fn new(block_name: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            block_name: block_name.into(),
            start_checkpoints: vec![Checkpoint::new(STORY_START)],
            end_checkpoints: Vec::new(),
            events,
        }
    }

    /// Replaces the start checkpoints with `checkpoint`.
    pub fn starting_at(mut self, checkpoint: Checkpoint) -> Self {
        self.start_checkpoints = vec![checkpoint];
        self
    }

    pub fn also_starting_at(mut self, checkpoint: Checkpoint) -> Self {
        self.start_checkpoints.push(checkpoint);
        self
    }

    pub fn ending_at(mut self, checkpoint: Checkpoint) -> Self {
        self.end_checkpoints.push(checkpoint);
        self
    }

    pub fn starts_story(&self) -> bool {
        self.start_checkpoints
            .iter()
            .any(|checkpoint| checkpoint.name == STORY_START)
    }

    /// The step's events with an `action_listen` inserted before every user
    /// utterance that does not already follow one.
    fn explicit_events(&self, previous: Option<&Event>) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.events.len() + 1);
        let mut after_listen = previous.is_some_and(Event::is_action_listen);
        for event in &self.events {
            if matches!(event.kind(), EventKind::UserUttered(_)) && !after_listen {
                events.push(Event::action_listen());
            }
            after_listen = event.is_action_listen();
            events.push(event.clone());
        }
        events
    }
}

/// The story steps of a training corpus, linked through checkpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryGraph {
    steps: Vec<StoryStep>,
}

struct PartialStory {
    tracker: Tracker,
    path: Vec<usize>,
}

impl StoryGraph {
    pub fn new(steps: Vec<StoryStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StoryStep] {
        &self.steps
    }

    /// One tracker per path through the graph, starting at `STORY_START`.
    ///
    /// A path never visits the same step twice. Each tracker is named after
    /// the block names along its path and ends with `action_listen` when its
    /// last event is a bot action.
    pub fn generate_story_trackers(&self, domain: &Domain) -> Vec<Tracker> {
        let schema = domain.slot_schema();
        let mut finished = Vec::new();
        let mut pending: Vec<(PartialStory, usize)> = self
            .steps
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, step)| step.starts_story())
            .map(|(index, _)| {
                let story = PartialStory {
                    tracker: Tracker::with_schema(String::new(), schema.clone()),
                    path: Vec::new(),
                };
                (story, index)
            })
            .collect();

        while let Some((mut story, index)) = pending.pop() {
            if finished.len() >= MAX_STORY_TRACKERS {
                tracing::warn!(
                    limit = MAX_STORY_TRACKERS,
                    "story graph produced too many paths; remaining paths are skipped"
                );
                break;
            }

            let step = &self.steps[index];
            let events = step.explicit_events(story.tracker.events().last());
            story.tracker.extend(events);
            story.path.push(index);

            let continuations = self.continuations(step, &story);
            if continuations.is_empty() {
                finished.push(self.finish(story));
                continue;
            }
            for next in continuations.into_iter().rev() {
                let branch = PartialStory {
                    tracker: story.tracker.clone(),
                    path: story.path.clone(),
                };
                pending.push((branch, next));
            }
        }

        finished
    }

    fn continuations(&self, step: &StoryStep, story: &PartialStory) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(index, _)| !story.path.contains(index))
            .filter(|(_, candidate)| {
                step.end_checkpoints.iter().any(|end| {
                    candidate.start_checkpoints.iter().any(|start| {
                        start.name == end.name
                            && start.is_satisfied_by(&story.tracker)
                            && end.is_satisfied_by(&story.tracker)
                    })
                })
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn finish(&self, story: PartialStory) -> Tracker {
        let mut tracker = story.tracker;
        let ends_with_bot_action = tracker
            .events()
            .last()
            .is_some_and(|event| event.action_name().is_some() && !event.is_action_listen());
        if ends_with_bot_action {
            tracker.append(Event::action_listen());
        }
        let name = story
            .path
            .iter()
            .map(|&index| self.steps[index].block_name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        tracker.with_sender_id(name)
    }
}
