//! Training stories and the detector for contradicting ones.

mod conflict;
mod graph;

pub use conflict::{StoryConflict, TurnState, find_story_conflicts, fingerprint};
pub use graph::{Checkpoint, STORY_START, StoryGraph, StoryStep};
