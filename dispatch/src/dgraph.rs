use domain::TaskId;
use serde::{Deserialize, Serialize};
use temporal::NetworkSnapshot;

/// Wire payload for a `DGRAPH-UPDATE` message: the next `horizon` queued
/// tasks plus the dispatchable-graph snapshot they live in. Sent only
/// when it differs from whatever was last sent to that robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DGraphUpdate {
    pub horizon: Vec<TaskId>,
    pub snapshot: NetworkSnapshot,
}
