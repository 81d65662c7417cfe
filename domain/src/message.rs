//! Payload shapes shared between the bidder, the auctioneer, and the
//! messaging transport. These are not the wire envelope itself (that's
//! `messaging::Envelope`) — just the typed contents every component
//! agrees on, matching SPEC_FULL.md §6.

use serde::{Deserialize, Serialize};

use crate::ids::{RobotId, RoundId, TaskId};
use crate::task::{Task, TaskStatus, WorkEstimate};

/// A robot-to-pickup navigation segment attached to a task once it is
/// frozen for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreTaskAction {
    pub from_location: String,
    pub to_location: String,
    pub estimated_duration: WorkEstimate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnnouncement {
    pub round_id: RoundId,
    pub ztp: f64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub round_id: RoundId,
    pub robot_id: RobotId,
    pub task_id: TaskId,
    pub insertion_point: usize,
    pub temporal_metric: f64,
    pub pre_task_action: PreTaskAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftBid {
    pub round_id: RoundId,
    pub robot_id: RobotId,
    pub task_id: TaskId,
    pub insertion_point: usize,
    pub temporal_metric: f64,
    pub alternative_start_time: f64,
    pub pre_task_action: PreTaskAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoBid {
    pub round_id: RoundId,
    pub robot_id: RobotId,
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContract {
    pub task_id: TaskId,
    pub robot_id: RobotId,
}

impl TaskContract {
    pub fn is_valid(n_before: usize, n_after: usize) -> bool {
        n_after == n_before + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAck {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub accept: bool,
    pub n_tasks: usize,
}

/// The two action legs a monitor can see progress on: the navigation leg
/// to pickup, or the pickup-to-delivery leg itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    GoToPickup,
    PickupToDelivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Ongoing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionProgress {
    pub action_id: uuid::Uuid,
    pub action_kind: ActionKind,
    pub action_status: ActionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub task_status: TaskStatus,
    pub task_progress: Option<ActionProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveTaskFromSchedule {
    pub task_id: TaskId,
    pub status: TaskStatus,
}
