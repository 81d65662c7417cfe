//! Per-tick freeze/dispatch pass over every robot's timetable.
//!
//! Structurally this is the same shape as `ExecutorWorker::execute_batch`
//! in the teacher — one pass over a per-key collection, fail-closed on
//! missing state, single externally-visible side effect per item — but
//! keyed by robot instead of by trading pair, and driven by a freeze
//! window instead of a reserved batch.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{PreTaskAction, RobotId, Task, TaskId, TaskStatus};
use messaging::{Envelope, MessageBus, MessageType};
use timetable::Timetable;
use tracing::{debug, instrument, warn};

use crate::dgraph::DGraphUpdate;
use crate::message::DispatchedTask;

pub struct DispatcherConfig {
    /// How far ahead of a task's start time dispatch fires, in seconds.
    pub freeze_window_s: f64,
    /// Number of queued tasks included in a `DGRAPH-UPDATE` snapshot.
    pub horizon: usize,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    bus: Arc<dyn MessageBus>,
    last_sent: HashMap<RobotId, DGraphUpdate>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            config,
            bus,
            last_sent: HashMap::new(),
        }
    }

    /// One tick: freezes any robot's earliest planned task that has
    /// entered its freeze window, and republishes a dispatchable-graph
    /// snapshot to robots whose graph changed since the last tick.
    #[instrument(skip(self, timetables, tasks))]
    pub async fn run(
        &mut self,
        now: f64,
        timetables: &mut HashMap<RobotId, Timetable>,
        tasks: &mut HashMap<TaskId, Task>,
    ) {
        for (robot_id, timetable) in timetables.iter_mut() {
            self.dispatch_if_due(now, robot_id, timetable, tasks).await;
            self.publish_dgraph_if_changed(robot_id, timetable).await;
        }
    }

    async fn dispatch_if_due(
        &mut self,
        now: f64,
        robot_id: &RobotId,
        timetable: &mut Timetable,
        tasks: &mut HashMap<TaskId, Task>,
    ) {
        let Some(task_id) = timetable.get_earliest_task() else {
            return;
        };
        let Some(task) = tasks.get(&task_id) else {
            warn!(%robot_id, %task_id, "earliest task missing from task table");
            return;
        };
        if task.status != TaskStatus::Planned {
            return;
        }
        let Some(start) = timetable.get_start_time(task_id) else {
            return;
        };
        if start - now > self.config.freeze_window_s {
            return;
        }

        // No robot-pose feed is wired into the coordinator yet; every robot
        // is assumed parked at its depot between tasks.
        let pre_task_action = PreTaskAction {
            from_location: "depot".to_string(),
            to_location: task.pickup_location.clone(),
            estimated_duration: task.travel_time,
        };

        let task = tasks.get_mut(&task_id).expect("checked above");
        if let Err(e) = task.set_status(TaskStatus::Dispatched) {
            warn!(%robot_id, %task_id, error = %e, "cannot dispatch task");
            return;
        }

        debug!(%robot_id, %task_id, start, "dispatching task");
        let payload = DispatchedTask {
            task: task.clone(),
            pre_task_action,
        };
        if let Ok(envelope) = Envelope::new(MessageType::Task, &payload) {
            self.bus.whisper(robot_id.as_str(), envelope).await;
        }
    }

    async fn publish_dgraph_if_changed(&mut self, robot_id: &RobotId, timetable: &Timetable) {
        let Some((horizon, graph)) = timetable.get_d_graph_update(self.config.horizon) else {
            return;
        };
        let update = DGraphUpdate {
            horizon,
            snapshot: (&graph).into(),
        };

        if self.last_sent.get(robot_id) == Some(&update) {
            return;
        }

        if let Ok(envelope) = Envelope::new(MessageType::DgraphUpdate, &update) {
            self.bus.whisper(robot_id.as_str(), envelope).await;
        }
        self.last_sent.insert(robot_id.clone(), update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::WorkEstimate;
    use messaging::InProcessBus;

    fn sample_task() -> Task {
        Task::new("a", "b", 10.0, 100.0, WorkEstimate::new(5.0, 0.0))
    }

    #[tokio::test]
    async fn dispatches_planned_task_inside_freeze_window() {
        let robot_id = RobotId::new("r1");
        let mut task = sample_task();
        task.status = TaskStatus::Planned;
        let task_id = task.task_id;

        let mut timetable = Timetable::new(robot_id.clone(), 0.0);
        timetable.insert_task_at(0, &task, (0.0, 5.0));
        timetable.recompute_dispatchable().unwrap();

        let mut timetables = HashMap::from([(robot_id.clone(), timetable)]);
        let mut tasks = HashMap::from([(task_id, task)]);

        let bus = InProcessBus::new();
        let mut rx = bus.register_peer(robot_id.as_str()).await;
        let mut dispatcher = Dispatcher::new(
            DispatcherConfig {
                freeze_window_s: 20.0,
                horizon: 4,
            },
            bus,
        );

        dispatcher.run(0.0, &mut timetables, &mut tasks).await;

        assert_eq!(tasks[&task_id].status, TaskStatus::Dispatched);
        assert!(rx.try_recv().is_ok(), "expected a dispatch envelope");
    }

    #[tokio::test]
    async fn leaves_task_untouched_before_freeze_window() {
        let robot_id = RobotId::new("r1");
        let mut task = sample_task();
        task.status = TaskStatus::Planned;
        let task_id = task.task_id;

        let mut timetable = Timetable::new(robot_id.clone(), 0.0);
        timetable.insert_task_at(0, &task, (20.0, 30.0));
        timetable.recompute_dispatchable().unwrap();

        let mut timetables = HashMap::from([(robot_id.clone(), timetable)]);
        let mut tasks = HashMap::from([(task_id, task)]);

        let bus = InProcessBus::new();
        let mut dispatcher = Dispatcher::new(
            DispatcherConfig {
                freeze_window_s: 1.0,
                horizon: 4,
            },
            bus,
        );

        dispatcher.run(0.0, &mut timetables, &mut tasks).await;

        assert_eq!(tasks[&task_id].status, TaskStatus::Planned);
    }
}
