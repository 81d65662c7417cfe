//! Progress ingestion and recovery, grounded on `ExecutorWorker`'s
//! commit/Gate-B recheck shape (one pass, fail closed on missing state,
//! recovery branch on the first hard failure) and the original fleet's
//! timetable monitor node-update/removal rules.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    ActionKind, ActionStatus, PathPlanner, RemoveTaskFromSchedule, RobotId, Task, TaskId,
    TaskStatus, TaskStatusUpdate,
};
use messaging::{Envelope, MessageBus, MessageType};
use temporal::TimepointKind;
use timetable::Timetable;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMethod {
    Preempt,
    Reallocate,
}

/// What a monitor call produced that the coordinator must act on: tasks
/// that need to go back through the auctioneer, and tasks preempted out
/// of their robot's schedule entirely.
#[derive(Debug, Default)]
pub struct MonitorOutcome {
    pub requeue: Vec<Task>,
    pub preempted: Vec<TaskId>,
}

pub struct TimetableMonitor<P: PathPlanner> {
    recovery_method: RecoveryMethod,
    planner: P,
    bus: Arc<dyn MessageBus>,
    /// Completed tasks waiting for `finish_time < now` before their nodes
    /// are dropped from the timetable, so an in-flight round isn't
    /// disturbed by a removal mid-resolution.
    pending_removals: Vec<(RobotId, TaskId, f64)>,
}

impl<P: PathPlanner> TimetableMonitor<P> {
    pub fn new(recovery_method: RecoveryMethod, planner: P, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            recovery_method,
            planner,
            bus,
            pending_removals: Vec::new(),
        }
    }

    /// Handles one `TASK-STATUS` message as it arrives.
    #[instrument(skip(self, timetables, tasks), fields(task_id = %msg.task_id, robot_id = %msg.robot_id))]
    pub async fn on_task_status(
        &mut self,
        msg: TaskStatusUpdate,
        now: f64,
        timetables: &mut HashMap<RobotId, Timetable>,
        tasks: &mut HashMap<TaskId, Task>,
    ) -> MonitorOutcome {
        let mut outcome = MonitorOutcome::default();

        if !tasks.contains_key(&msg.task_id) {
            warn!("status update for unknown task");
            return outcome;
        }

        match msg.task_status {
            TaskStatus::Ongoing => {
                if let Some(task) = tasks.get_mut(&msg.task_id) {
                    let _ = task.set_status(TaskStatus::Ongoing);
                }
                let Some(timetable) = timetables.get_mut(&msg.robot_id) else {
                    return outcome;
                };
                self.record_progress(&msg, now, timetable, &mut outcome, tasks)
                    .await;
            }
            TaskStatus::Completed => {
                if let Some(task) = tasks.get_mut(&msg.task_id) {
                    let _ = task.set_status(TaskStatus::Completed);
                }
                let finish_time = timetables
                    .get(&msg.robot_id)
                    .and_then(|t| t.get_finish_time(msg.task_id))
                    .unwrap_or(now);
                self.pending_removals
                    .push((msg.robot_id.clone(), msg.task_id, finish_time));
            }
            TaskStatus::Unallocated => {
                // An UNALLOCATED event for a task already ONGOING is a
                // stale or misrouted message, per SPEC_FULL.md §9: the
                // robot is mid-execution and must not have the task torn
                // out from under it and re-auctioned.
                let already_ongoing = tasks
                    .get(&msg.task_id)
                    .map(|t| t.status == TaskStatus::Ongoing)
                    .unwrap_or(false);
                if already_ongoing {
                    warn!("ignoring UNALLOCATED status for a task already ONGOING");
                    return outcome;
                }

                if let Some(timetable) = timetables.get_mut(&msg.robot_id) {
                    let new_travel =
                        self.reconnect_travel(timetable, tasks, msg.task_id);
                    let _ = timetable.remove_task(msg.task_id, new_travel);
                }
                if let Some(task) = tasks.get_mut(&msg.task_id) {
                    task.assigned_robots.clear();
                    let _ = task.set_status(TaskStatus::Unallocated);
                    outcome.requeue.push(task.clone());
                }
                self.notify_removed(&msg.robot_id, msg.task_id, TaskStatus::Unallocated)
                    .await;
            }
            TaskStatus::Preempted => {
                let already_preempted = tasks
                    .get(&msg.task_id)
                    .map(|t| t.status == TaskStatus::Preempted)
                    .unwrap_or(true);
                if !already_preempted {
                    if let Some(timetable) = timetables.get_mut(&msg.robot_id) {
                        let new_travel =
                            self.reconnect_travel(timetable, tasks, msg.task_id);
                        let _ = timetable.remove_task(msg.task_id, new_travel);
                    }
                    if let Some(task) = tasks.get_mut(&msg.task_id) {
                        let _ = task.set_status(TaskStatus::Preempted);
                    }
                    outcome.preempted.push(msg.task_id);
                    self.notify_removed(&msg.robot_id, msg.task_id, TaskStatus::Preempted)
                        .await;
                }
            }
            _ => {}
        }

        outcome
    }

    /// The `(lb, ub)` travel edge to wire between the tasks that become
    /// adjacent once `removed` drops out of `timetable`'s ordering, per
    /// SPEC_FULL.md §4.7.2. `None` if there is no successor to reconnect
    /// (removing the tail of the schedule needs no new edge). The
    /// predecessor's location falls back to `"depot"` when `removed` is
    /// the first task — the coordinator's mirror doesn't track robot
    /// pose, so this matches the same fallback `Dispatcher` uses.
    fn reconnect_travel(
        &self,
        timetable: &Timetable,
        tasks: &HashMap<TaskId, Task>,
        removed: TaskId,
    ) -> Option<(f64, f64)> {
        let successor_id = timetable.get_next_task(removed)?;
        let successor = tasks.get(&successor_id)?;

        let from_location = match timetable.get_previous_task(removed) {
            Some(predecessor_id) => tasks.get(&predecessor_id)?.delivery_location.clone(),
            None => "depot".to_string(),
        };

        let travel = self
            .planner
            .estimate_travel(&from_location, &successor.pickup_location);
        Some((0.0, travel.mean + travel.std_dev()))
    }

    async fn notify_removed(&self, robot_id: &RobotId, task_id: TaskId, status: TaskStatus) {
        let notice = RemoveTaskFromSchedule { task_id, status };
        if let Ok(envelope) = Envelope::new(MessageType::RemoveTaskFromSchedule, &notice) {
            self.bus.whisper(robot_id.as_str(), envelope).await;
        }
    }

    async fn record_progress(
        &mut self,
        msg: &TaskStatusUpdate,
        now: f64,
        timetable: &mut Timetable,
        outcome: &mut MonitorOutcome,
        tasks: &mut HashMap<TaskId, Task>,
    ) {
        let Some(progress) = &msg.task_progress else {
            return;
        };

        let node = match (progress.action_kind, progress.action_status) {
            (ActionKind::GoToPickup, ActionStatus::Ongoing) => TimepointKind::Start,
            (ActionKind::PickupToDelivery, ActionStatus::Ongoing) => TimepointKind::Pickup,
            (ActionKind::PickupToDelivery, ActionStatus::Completed) => TimepointKind::Delivery,
            _ => return,
        };

        let r_time = now - timetable.ztp;
        if let Err(e) = timetable.assign_timepoint(r_time, msg.task_id, node, true) {
            warn!(error = %e, "failed to assign observed timepoint");
            return;
        }

        if timetable.recompute_dispatchable().is_err() {
            self.recover(&msg.robot_id, msg.task_id, timetable, tasks, outcome)
                .await;
        }
    }

    /// Recovers from a dispatchable graph that lost consistency after an
    /// observed timepoint tightened a bound: the task immediately
    /// following the one whose progress just came in is either preempted
    /// out of the schedule or handed back to the auctioneer, per the
    /// configured `RecoveryMethod`.
    async fn recover(
        &mut self,
        robot_id: &RobotId,
        task_id: TaskId,
        timetable: &mut Timetable,
        tasks: &mut HashMap<TaskId, Task>,
        outcome: &mut MonitorOutcome,
    ) {
        let Some(next_id) = timetable.get_next_task(task_id) else {
            return;
        };
        let new_travel = self.reconnect_travel(timetable, tasks, next_id);

        match self.recovery_method {
            RecoveryMethod::Preempt => {
                if let Some(next) = tasks.get_mut(&next_id) {
                    let _ = next.set_status(TaskStatus::Preempted);
                }
                let _ = timetable.remove_task(next_id, new_travel);
                outcome.preempted.push(next_id);
                self.notify_removed(robot_id, next_id, TaskStatus::Preempted)
                    .await;
            }
            RecoveryMethod::Reallocate => {
                if let Some(next) = tasks.get_mut(&next_id) {
                    next.assigned_robots.clear();
                    let _ = next.set_status(TaskStatus::Unallocated);
                    let _ = timetable.remove_task(next_id, new_travel);
                    outcome.requeue.push(next.clone());
                }
                self.notify_removed(robot_id, next_id, TaskStatus::Unallocated)
                    .await;
            }
        }
    }

    /// Drains completed tasks whose finish time has passed, dropping
    /// their nodes from the owning robot's timetable.
    #[instrument(skip(self, timetables, tasks))]
    pub async fn run(
        &mut self,
        now: f64,
        timetables: &mut HashMap<RobotId, Timetable>,
        tasks: &mut HashMap<TaskId, Task>,
    ) {
        let due: Vec<_> = self
            .pending_removals
            .iter()
            .filter(|(_, _, finish_time)| *finish_time < now)
            .cloned()
            .collect();

        self.pending_removals
            .retain(|(_, _, finish_time)| *finish_time >= now);

        for (robot_id, task_id, _) in due {
            if let Some(timetable) = timetables.get_mut(&robot_id) {
                let new_travel = self.reconnect_travel(timetable, tasks, task_id);
                let _ = timetable.remove_task(task_id, new_travel);
            }
            tasks.remove(&task_id);
            self.notify_removed(&robot_id, task_id, TaskStatus::Completed)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{StubPlanner, WorkEstimate};
    use messaging::InProcessBus;

    fn setup() -> (RobotId, Task, HashMap<RobotId, Timetable>, HashMap<TaskId, Task>) {
        let robot_id = RobotId::new("r1");
        let mut task = Task::new("a", "b", 10.0, 100.0, WorkEstimate::new(5.0, 0.0));
        task.status = TaskStatus::Dispatched;
        let task_id = task.task_id;

        let mut timetable = Timetable::new(robot_id.clone(), 0.0);
        timetable.insert_task_at(0, &task, (0.0, 5.0));
        timetable.recompute_dispatchable().unwrap();

        let timetables = HashMap::from([(robot_id.clone(), timetable)]);
        let tasks = HashMap::from([(task_id, task.clone())]);
        (robot_id, task, timetables, tasks)
    }

    fn monitor(recovery_method: RecoveryMethod) -> TimetableMonitor<StubPlanner> {
        TimetableMonitor::new(recovery_method, StubPlanner::new(1.0), InProcessBus::new())
    }

    #[tokio::test]
    async fn ongoing_go_to_pickup_updates_start_node() {
        let (robot_id, task, mut timetables, mut tasks) = setup();

        let mut monitor = monitor(RecoveryMethod::Reallocate);
        let outcome = monitor
            .on_task_status(
                TaskStatusUpdate {
                    task_id: task.task_id,
                    robot_id: robot_id.clone(),
                    task_status: TaskStatus::Ongoing,
                    task_progress: Some(domain::ActionProgress {
                        action_id: uuid::Uuid::new_v4(),
                        action_kind: ActionKind::GoToPickup,
                        action_status: ActionStatus::Ongoing,
                    }),
                },
                2.0,
                &mut timetables,
                &mut tasks,
            )
            .await;

        assert!(outcome.requeue.is_empty());
        assert_eq!(tasks[&task.task_id].status, TaskStatus::Ongoing);
        let start = timetables[&robot_id]
            .dispatchable()
            .unwrap()
            .get_time(task.task_id, TimepointKind::Start, true)
            .unwrap();
        assert_eq!(start, 2.0);
    }

    #[tokio::test]
    async fn unallocated_status_requeues_and_clears_schedule() {
        let (robot_id, task, mut timetables, mut tasks) = setup();

        let mut monitor = monitor(RecoveryMethod::Reallocate);
        let outcome = monitor
            .on_task_status(
                TaskStatusUpdate {
                    task_id: task.task_id,
                    robot_id: robot_id.clone(),
                    task_status: TaskStatus::Unallocated,
                    task_progress: None,
                },
                1.0,
                &mut timetables,
                &mut tasks,
            )
            .await;

        assert_eq!(outcome.requeue.len(), 1);
        assert!(!timetables[&robot_id].has_task(task.task_id));
    }

    #[tokio::test]
    async fn unallocated_status_ignored_for_ongoing_task() {
        let (robot_id, mut task, mut timetables, mut tasks) = setup();
        task.status = TaskStatus::Ongoing;
        tasks.insert(task.task_id, task.clone());

        let mut monitor = monitor(RecoveryMethod::Reallocate);
        let outcome = monitor
            .on_task_status(
                TaskStatusUpdate {
                    task_id: task.task_id,
                    robot_id: robot_id.clone(),
                    task_status: TaskStatus::Unallocated,
                    task_progress: None,
                },
                1.0,
                &mut timetables,
                &mut tasks,
            )
            .await;

        assert!(outcome.requeue.is_empty());
        assert_eq!(tasks[&task.task_id].status, TaskStatus::Ongoing);
        assert!(timetables[&robot_id].has_task(task.task_id));
    }

    #[tokio::test]
    async fn completed_task_removed_only_after_finish_time() {
        let (robot_id, task, mut timetables, mut tasks) = setup();

        let mut monitor = monitor(RecoveryMethod::Reallocate);
        monitor
            .on_task_status(
                TaskStatusUpdate {
                    task_id: task.task_id,
                    robot_id: robot_id.clone(),
                    task_status: TaskStatus::Completed,
                    task_progress: None,
                },
                1.0,
                &mut timetables,
                &mut tasks,
            )
            .await;
        assert!(tasks.contains_key(&task.task_id));

        monitor.run(0.0, &mut timetables, &mut tasks).await;
        assert!(tasks.contains_key(&task.task_id), "too early to remove");

        monitor.run(1_000.0, &mut timetables, &mut tasks).await;
        assert!(!tasks.contains_key(&task.task_id));
    }
}
