use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::RobotId;
use tokio::sync::Mutex;

use crate::model::Timetable;
use crate::store::TimetableStore;

/// In-process store backing single-machine operation (coordinator and all
/// robots sharing one process) and tests; the durable alternative is
/// `SqliteTimetableStore`.
#[derive(Default, Clone)]
pub struct InMemoryTimetableStore {
    map: Arc<Mutex<HashMap<RobotId, Timetable>>>,
}

impl InMemoryTimetableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimetableStore for InMemoryTimetableStore {
    async fn load_all(&self) -> anyhow::Result<Vec<Timetable>> {
        Ok(self.map.lock().await.values().cloned().collect())
    }

    async fn save(&self, timetable: &Timetable) -> anyhow::Result<()> {
        self.map
            .lock()
            .await
            .insert(timetable.robot_id.clone(), timetable.clone());
        Ok(())
    }

    async fn delete(&self, robot_id: &RobotId) -> anyhow::Result<()> {
        self.map.lock().await.remove(robot_id);
        Ok(())
    }
}
