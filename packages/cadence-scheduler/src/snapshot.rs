use crate::Millis;
use crate::context::TaskState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub state: TaskState,
    pub tick_count: u64,
    pub avg_tick_duration_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub name: String,
    pub pending_tasks: usize,
    pub tasks: Vec<TaskSnapshot>,
}

/// Point-in-time view of every queue, for inspection tooling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub queues: Vec<QueueSnapshot>,
}

impl SchedulerSnapshot {
    pub fn pending_tasks(&self) -> usize {
        self.queues.iter().map(|queue| queue.pending_tasks).sum()
    }

    pub fn total_ticks(&self) -> u64 {
        self.queues
            .iter()
            .flat_map(|queue| &queue.tasks)
            .map(|task| task.tick_count)
            .sum()
    }

    pub fn export_state(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
