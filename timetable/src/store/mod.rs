pub mod memory;
pub mod sqlite_store;

use domain::RobotId;

#[async_trait::async_trait]
pub trait TimetableStore: Send + Sync {
    async fn load_all(&self) -> anyhow::Result<Vec<crate::model::Timetable>>;
    async fn save(&self, timetable: &crate::model::Timetable) -> anyhow::Result<()>;
    async fn delete(&self, robot_id: &RobotId) -> anyhow::Result<()>;
}
