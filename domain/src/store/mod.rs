pub mod memory;
pub mod sqlite_store;

use serde::{Deserialize, Serialize};

use crate::ids::{RobotId, TaskId};
use crate::task::Task;

/// One row of the fleet's performance ledger: when a task was allocated
/// to a robot and, once known, when it finished. Grounded on
/// `session::store::SessionStore`'s persistence shape, generalized from
/// one entity (session) to two (task, performance record) per
/// SPEC_FULL.md §6's "collection per {timetable, task, performance
/// record}".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub experiment: String,
    pub allocated_at: f64,
    pub completed_at: Option<f64>,
}

#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn load_all_tasks(&self) -> anyhow::Result<Vec<Task>>;
    async fn save_task(&self, task: &Task) -> anyhow::Result<()>;
    async fn delete_task(&self, task_id: TaskId) -> anyhow::Result<()>;
    async fn record_performance(&self, record: &PerformanceRecord) -> anyhow::Result<()>;
    async fn load_performance_records(&self) -> anyhow::Result<Vec<PerformanceRecord>>;
}
