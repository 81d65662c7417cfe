use domain::{PreTaskAction, Task};
use serde::{Deserialize, Serialize};

/// Payload for the `TASK` message: a frozen task plus the navigation leg
/// the robot must run before it can start the task itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchedTask {
    pub task: Task,
    pub pre_task_action: PreTaskAction,
}
