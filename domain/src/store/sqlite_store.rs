//! SqliteTaskStore
//! ---------------
//! Durable persistence for tasks and the fleet's performance ledger, the
//! same JSON-column pattern `timetable::SqliteTimetableStore` uses for the
//! temporal network: the task payload has no natural relational shape, so
//! it is stored whole as a JSON column keyed by `task_id`.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::ids::{RobotId, TaskId};
use crate::store::{PerformanceRecord, TaskStore};
use crate::task::Task;

pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS performance_records (
                task_id TEXT NOT NULL,
                robot_id TEXT NOT NULL,
                experiment TEXT NOT NULL,
                allocated_at REAL NOT NULL,
                completed_at REAL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn load_all_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query("SELECT payload_json FROM tasks")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let payload: String = row.get("payload_json");
                serde_json::from_str(&payload)
                    .map_err(|e| anyhow::anyhow!("invalid task payload_json: {e}"))
            })
            .collect()
    }

    async fn save_task(&self, task: &Task) -> anyhow::Result<()> {
        let payload_json = serde_json::to_string(task)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, payload_json)
            VALUES (?, ?)
            ON CONFLICT(task_id) DO UPDATE SET payload_json = excluded.payload_json;
        "#,
        )
        .bind(task.task_id.to_string())
        .bind(payload_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_task(&self, task_id: TaskId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_performance(&self, record: &PerformanceRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO performance_records (task_id, robot_id, experiment, allocated_at, completed_at)
            VALUES (?, ?, ?, ?, ?);
        "#,
        )
        .bind(record.task_id.to_string())
        .bind(record.robot_id.as_str())
        .bind(&record.experiment)
        .bind(record.allocated_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_performance_records(&self) -> anyhow::Result<Vec<PerformanceRecord>> {
        let rows = sqlx::query(
            "SELECT task_id, robot_id, experiment, allocated_at, completed_at FROM performance_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let task_id: String = row.get("task_id");
            let robot_id: String = row.get("robot_id");
            let experiment: String = row.get("experiment");
            let allocated_at: f64 = row.get("allocated_at");
            let completed_at: Option<f64> = row.get("completed_at");

            out.push(PerformanceRecord {
                task_id: uuid::Uuid::parse_str(&task_id)
                    .map_err(|e| anyhow::anyhow!("invalid task_id: {e}"))?
                    .into(),
                robot_id: RobotId::new(robot_id),
                experiment,
                allocated_at,
                completed_at,
            });
        }
        Ok(out)
    }
}
