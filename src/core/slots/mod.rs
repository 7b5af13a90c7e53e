//! Slot mappings and the resolver that applies them to user input.

mod mapping;
mod resolver;

pub use mapping::{IntentFilter, SlotMapping, SlotMappingType};
pub use resolver::{SlotResolver, entity_value};
