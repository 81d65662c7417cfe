//! SqliteTimetableStore
//! --------------------
//! Durable persistence for per-robot timetables, so a restarted
//! coordinator process can reconstruct each robot's committed schedule
//! without re-running every round. The temporal network itself has no
//! natural relational shape, so it is stored as a JSON column (the same
//! pattern the teacher uses for `thresholds_json`), keyed by robot id.

use async_trait::async_trait;
use domain::RobotId;
use sqlx::{Row, SqlitePool};
use temporal::{NetworkSnapshot, TemporalNetwork};

use crate::model::Timetable;
use crate::store::TimetableStore;

pub struct SqliteTimetableStore {
    pool: SqlitePool,
}

impl SqliteTimetableStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timetables (
                robot_id TEXT PRIMARY KEY,
                ztp REAL NOT NULL,
                ordering_json TEXT NOT NULL,
                stn_json TEXT NOT NULL,
                dispatchable_json TEXT
            );
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TimetableStore for SqliteTimetableStore {
    async fn load_all(&self) -> anyhow::Result<Vec<Timetable>> {
        let rows = sqlx::query("SELECT * FROM timetables")
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let robot_id: String = row.get("robot_id");
            let ztp: f64 = row.get("ztp");
            let ordering_json: String = row.get("ordering_json");
            let stn_json: String = row.get("stn_json");
            let dispatchable_json: Option<String> = row.get("dispatchable_json");

            let ordering: Vec<domain::TaskId> = serde_json::from_str(&ordering_json)
                .map_err(|e| anyhow::anyhow!("invalid ordering_json: {e}"))?;
            let stn_snapshot: NetworkSnapshot = serde_json::from_str(&stn_json)
                .map_err(|e| anyhow::anyhow!("invalid stn_json: {e}"))?;
            let dispatchable_snapshot: Option<NetworkSnapshot> = dispatchable_json
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| anyhow::anyhow!("invalid dispatchable_json: {e}"))?;

            out.push(Timetable::from_parts(
                RobotId::new(robot_id),
                ztp,
                ordering,
                TemporalNetwork::from(stn_snapshot),
                dispatchable_snapshot.map(TemporalNetwork::from),
            ));
        }
        Ok(out)
    }

    async fn save(&self, timetable: &Timetable) -> anyhow::Result<()> {
        let ordering_json = serde_json::to_string(timetable.ordering())?;
        let stn_json = serde_json::to_string(&NetworkSnapshot::from(timetable.stn()))?;
        let dispatchable_json = timetable
            .dispatchable()
            .map(|g| serde_json::to_string(&NetworkSnapshot::from(g)))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO timetables (robot_id, ztp, ordering_json, stn_json, dispatchable_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(robot_id) DO UPDATE SET
                ztp = excluded.ztp,
                ordering_json = excluded.ordering_json,
                stn_json = excluded.stn_json,
                dispatchable_json = excluded.dispatchable_json;
        "#,
        )
        .bind(timetable.robot_id.as_str())
        .bind(timetable.ztp)
        .bind(ordering_json)
        .bind(stn_json)
        .bind(dispatchable_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, robot_id: &RobotId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM timetables WHERE robot_id = ?")
            .bind(robot_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
