use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Turns compared when looking for story conflicts; unset compares
    /// whole stories.
    #[serde(default)]
    pub max_history: Option<usize>,
    /// Report story conflicts without failing validation.
    #[serde(default)]
    pub ignore_warnings: bool,
}
