use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ids::TaskId;
use crate::store::{PerformanceRecord, TaskStore};
use crate::task::Task;

/// In-process store backing single-machine operation and tests; the
/// durable alternative is `SqliteTaskStore`.
#[derive(Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<Mutex<HashMap<TaskId, Task>>>,
    records: Arc<Mutex<Vec<PerformanceRecord>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn load_all_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.lock().await.values().cloned().collect())
    }

    async fn save_task(&self, task: &Task) -> anyhow::Result<()> {
        self.tasks.lock().await.insert(task.task_id, task.clone());
        Ok(())
    }

    async fn delete_task(&self, task_id: TaskId) -> anyhow::Result<()> {
        self.tasks.lock().await.remove(&task_id);
        Ok(())
    }

    async fn record_performance(&self, record: &PerformanceRecord) -> anyhow::Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn load_performance_records(&self) -> anyhow::Result<Vec<PerformanceRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
