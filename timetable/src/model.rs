use domain::{AllocationError, RobotId, Task, TaskId};
use temporal::{NodeId, TemporalNetwork, TimepointKind};
use tracing::instrument;

/// A robot's own view of its schedule: the sequence of tasks it has
/// committed to, the full constraint network (`stn`) built from those
/// commitments, and the tightened `dispatchable` form used to answer
/// "when can I actually start/finish" questions during execution.
///
/// `dispatchable` is `None` whenever the stn hasn't been closed since the
/// last mutation; callers that need dispatch-time answers must call
/// `recompute_dispatchable` first (mirrors the Python original's split
/// between `update_stn`/`update_ztp` and the dispatchable graph it derives).
#[derive(Debug, Clone)]
pub struct Timetable {
    pub robot_id: RobotId,
    /// Absolute zero-timepoint: all times inside `stn`/`dispatchable` are
    /// offsets from this wall-clock instant, in seconds.
    pub ztp: f64,
    ordering: Vec<TaskId>,
    stn: TemporalNetwork,
    dispatchable: Option<TemporalNetwork>,
}

impl Timetable {
    pub fn new(robot_id: RobotId, ztp: f64) -> Self {
        Self {
            robot_id,
            ztp,
            ordering: Vec::new(),
            stn: TemporalNetwork::new(),
            dispatchable: None,
        }
    }

    /// Rebuilds a `Timetable` from persisted parts (used by
    /// `SqliteTimetableStore::load_all`).
    pub fn from_parts(
        robot_id: RobotId,
        ztp: f64,
        ordering: Vec<TaskId>,
        stn: TemporalNetwork,
        dispatchable: Option<TemporalNetwork>,
    ) -> Self {
        Self {
            robot_id,
            ztp,
            ordering,
            stn,
            dispatchable,
        }
    }

    pub fn ordering(&self) -> &[TaskId] {
        &self.ordering
    }

    pub fn len(&self) -> usize {
        self.ordering.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordering.is_empty()
    }

    pub fn has_task(&self, task_id: TaskId) -> bool {
        self.ordering.contains(&task_id)
    }

    pub fn get_earliest_task(&self) -> Option<TaskId> {
        self.ordering.first().copied()
    }

    pub fn get_previous_task(&self, task_id: TaskId) -> Option<TaskId> {
        let pos = self.ordering.iter().position(|&t| t == task_id)?;
        pos.checked_sub(1).map(|p| self.ordering[p])
    }

    pub fn get_next_task(&self, task_id: TaskId) -> Option<TaskId> {
        let pos = self.ordering.iter().position(|&t| t == task_id)?;
        self.ordering.get(pos + 1).copied()
    }

    /// Absolute start time of `task_id`, using the dispatchable graph
    /// (must be current; see `recompute_dispatchable`).
    pub fn get_start_time(&self, task_id: TaskId) -> Option<f64> {
        let graph = self.dispatchable.as_ref()?;
        graph
            .get_time(task_id, TimepointKind::Start, true)
            .map(|t| self.ztp + t)
    }

    /// Absolute finish (delivery) time of `task_id`, using the
    /// dispatchable graph.
    pub fn get_finish_time(&self, task_id: TaskId) -> Option<f64> {
        let graph = self.dispatchable.as_ref()?;
        graph
            .get_time(task_id, TimepointKind::Delivery, true)
            .map(|t| self.ztp + t)
    }

    /// True if an observed time `r_time` (seconds since ztp) at `kind`
    /// exceeds the dispatchable upper bound for that node.
    pub fn check_is_task_delayed(&self, task_id: TaskId, r_time: f64, kind: TimepointKind) -> bool {
        match self
            .dispatchable
            .as_ref()
            .and_then(|g| g.get_time(task_id, kind, false))
        {
            Some(upper) => r_time > upper,
            None => false,
        }
    }

    /// Inserts `task` at `position` in the ordering, wiring its intra-task
    /// edges and the travel edge from whatever now precedes it. Does not
    /// recompute the dispatchable graph; callers must call
    /// `recompute_dispatchable` afterward (this mirrors the bidder's need
    /// to try several positions cheaply before committing to one).
    #[instrument(skip(self, task), fields(robot_id = %self.robot_id, task_id = %task.task_id, position))]
    pub fn insert_task_at(
        &mut self,
        position: usize,
        task: &Task,
        travel_from_predecessor: (f64, f64),
    ) {
        self.stn
            .insert_task_at(position, &self.ordering, task, travel_from_predecessor);
        self.ordering.insert(position, task.task_id);
        self.dispatchable = None;
    }

    /// Removes a task from the schedule. Per SPEC_FULL.md §4.7.2, removing
    /// the earliest task (position 0) requires propagating its delivery's
    /// earliest time forward onto the new first task's start, since the
    /// robot is already physically at that location; `new_travel` supplies
    /// the caller's updated `(lb, ub)` travel edge for the new
    /// predecessor->successor pair (`None` when there is no successor).
    #[instrument(skip(self, new_travel), fields(robot_id = %self.robot_id, %task_id))]
    pub fn remove_task(
        &mut self,
        task_id: TaskId,
        new_travel: Option<(f64, f64)>,
    ) -> Result<(), AllocationError> {
        let pos = self
            .ordering
            .iter()
            .position(|&t| t == task_id)
            .ok_or(AllocationError::TaskNotFound(task_id))?;

        let predecessor = if pos == 0 {
            None
        } else {
            Some(self.ordering[pos - 1])
        };
        let successor = self.ordering.get(pos + 1).copied();

        self.stn.remove_task(task_id)?;
        self.ordering.remove(pos);
        self.dispatchable = None;

        if let (Some(successor), Some((lb, ub))) = (successor, new_travel) {
            let from = predecessor
                .map(NodeId::delivery)
                .unwrap_or(NodeId::Zero);
            self.stn.add_constraint(from, NodeId::start(successor), lb, ub, false);
        }

        Ok(())
    }

    /// Closes the stn into a dispatchable graph, or reports `NoSTPSolution`
    /// if the network is inconsistent. This is the "hard part" every
    /// insertion and every progress update must pass through.
    #[instrument(skip(self), fields(robot_id = %self.robot_id))]
    pub fn recompute_dispatchable(&mut self) -> Result<(), AllocationError> {
        let graph = self.stn.compute_dispatchable_graph(None)?;
        self.dispatchable = Some(graph);
        Ok(())
    }

    pub fn assign_timepoint(
        &mut self,
        time: f64,
        task_id: TaskId,
        kind: TimepointKind,
        force: bool,
    ) -> Result<(), AllocationError> {
        self.stn.assign_timepoint(time, task_id, kind, force)
    }

    pub fn stn(&self) -> &TemporalNetwork {
        &self.stn
    }

    pub fn dispatchable(&self) -> Option<&TemporalNetwork> {
        self.dispatchable.as_ref()
    }

    /// A prefix of up to `n` queued tasks' dispatchable-graph state, used
    /// to build the `DGRAPH-UPDATE` message sent to the robot. Only the
    /// tasks are windowed; the underlying network stays a single clone
    /// (sub-graph extraction would require re-deriving closure, which is
    /// unnecessary since the full graph is already consistent).
    pub fn get_d_graph_update(&self, n: usize) -> Option<(Vec<TaskId>, TemporalNetwork)> {
        let graph = self.dispatchable.clone()?;
        let horizon = self.ordering.iter().take(n).copied().collect();
        Some((horizon, graph))
    }
}
