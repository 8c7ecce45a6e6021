use crate::Millis;
use crate::strategy::DEFAULT_FRAME_BUDGET;
use serde::{Deserialize, Serialize};

/// Settings for [`Scheduler::with_default_queues`](crate::Scheduler::with_default_queues).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time allocated to task ticks per frame, in milliseconds.
    pub frame_budget_ms: Millis,
    pub animation_queue: String,
    pub idle_queue: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: DEFAULT_FRAME_BUDGET,
            animation_queue: "animation".to_string(),
            idle_queue: "idle".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
