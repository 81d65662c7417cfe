use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::{RobotId, TaskId};

/// Mean/variance pair for a duration that is only known stochastically
/// (travel time, work time) until it is observed during execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkEstimate {
    pub mean: f64,
    pub variance: f64,
}

impl WorkEstimate {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Unallocated,
    Allocated,
    Planned,
    Dispatched,
    Ongoing,
    Completed,
    Canceled,
    Aborted,
    Preempted,
}

impl TaskStatus {
    /// The monotone transition table from SPEC_FULL.md §3: status only
    /// moves forward except for the explicit re-allocation and recovery
    /// edges back to `Unallocated`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Unallocated, Allocated) => true,
            (Allocated, Planned) => true,
            (Planned, Dispatched) => true,
            (Planned, Unallocated) => true, // re-allocation before dispatch
            (Dispatched, Ongoing) => true,
            (Dispatched, Unallocated) => true, // recovery: re-allocate
            (Dispatched, Preempted) => true,
            (Ongoing, Completed) => true,
            (Ongoing, Preempted) => true,
            (Ongoing, Aborted) => true,
            (_, Canceled) => current_is_cancelable(self),
            (same, next) if same == next => true,
            _ => false,
        }
    }
}

fn current_is_cancelable(status: TaskStatus) -> bool {
    !matches!(
        status,
        TaskStatus::Completed | TaskStatus::Aborted | TaskStatus::Canceled
    )
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Unallocated => "UNALLOCATED",
            TaskStatus::Allocated => "ALLOCATED",
            TaskStatus::Planned => "PLANNED",
            TaskStatus::Dispatched => "DISPATCHED",
            TaskStatus::Ongoing => "ONGOING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Aborted => "ABORTED",
            TaskStatus::Preempted => "PREEMPTED",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNALLOCATED" => Ok(TaskStatus::Unallocated),
            "ALLOCATED" => Ok(TaskStatus::Allocated),
            "PLANNED" => Ok(TaskStatus::Planned),
            "DISPATCHED" => Ok(TaskStatus::Dispatched),
            "ONGOING" => Ok(TaskStatus::Ongoing),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELED" => Ok(TaskStatus::Canceled),
            "ABORTED" => Ok(TaskStatus::Aborted),
            "PREEMPTED" => Ok(TaskStatus::Preempted),
            other => Err(anyhow::anyhow!("invalid TaskStatus value: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub pickup_location: String,
    pub delivery_location: String,
    /// Seconds since the fleet's zero-timepoint.
    pub earliest_pickup_time: f64,
    pub latest_pickup_time: f64,
    pub travel_time: WorkEstimate,
    pub work_time: WorkEstimate,
    pub assigned_robots: Vec<RobotId>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(
        pickup_location: impl Into<String>,
        delivery_location: impl Into<String>,
        earliest_pickup_time: f64,
        latest_pickup_time: f64,
        work_time: WorkEstimate,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            pickup_location: pickup_location.into(),
            delivery_location: delivery_location.into(),
            earliest_pickup_time,
            latest_pickup_time,
            travel_time: WorkEstimate::new(0.0, 0.0),
            work_time,
            assigned_robots: Vec::new(),
            status: TaskStatus::Unallocated,
        }
    }

    pub fn set_status(&mut self, next: TaskStatus) -> Result<(), crate::error::AllocationError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::AllocationError::InvalidAllocation(format!(
                "task {} cannot move {} -> {}",
                self.task_id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_allowed() {
        use TaskStatus::*;
        let chain = [
            Unallocated,
            Allocated,
            Planned,
            Dispatched,
            Ongoing,
            Completed,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn backward_transitions_rejected() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Ongoing));
        assert!(!TaskStatus::Ongoing.can_transition_to(TaskStatus::Allocated));
    }

    #[test]
    fn recovery_edges_allowed() {
        assert!(TaskStatus::Planned.can_transition_to(TaskStatus::Unallocated));
        assert!(TaskStatus::Dispatched.can_transition_to(TaskStatus::Unallocated));
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        for status in [
            TaskStatus::Unallocated,
            TaskStatus::Allocated,
            TaskStatus::Planned,
            TaskStatus::Dispatched,
            TaskStatus::Ongoing,
            TaskStatus::Completed,
            TaskStatus::Canceled,
            TaskStatus::Aborted,
            TaskStatus::Preempted,
        ] {
            let s = status.to_string();
            assert_eq!(TaskStatus::from_str(&s).unwrap(), status);
        }
    }
}
