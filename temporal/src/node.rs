use domain::TaskId;
use serde::{Deserialize, Serialize};

/// A timepoint inside a task: the moment the robot starts moving toward
/// pickup, the moment it reaches pickup, and the moment it completes
/// delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimepointKind {
    Start,
    Pickup,
    Delivery,
}

/// A node in the temporal network: either the fleet's zero-timepoint
/// reference, or one of a task's three timepoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeId {
    Zero,
    Task(TaskId, TimepointKind),
}

impl NodeId {
    pub fn start(task_id: TaskId) -> Self {
        NodeId::Task(task_id, TimepointKind::Start)
    }

    pub fn pickup(task_id: TaskId) -> Self {
        NodeId::Task(task_id, TimepointKind::Pickup)
    }

    pub fn delivery(task_id: TaskId) -> Self {
        NodeId::Task(task_id, TimepointKind::Delivery)
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            NodeId::Zero => None,
            NodeId::Task(id, _) => Some(*id),
        }
    }
}
