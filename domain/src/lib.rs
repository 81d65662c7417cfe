pub mod error;
pub mod ids;
pub mod message;
pub mod planner;
pub mod store;
pub mod task;

pub use error::AllocationError;
pub use ids::{RobotId, RoundId, TaskId};
pub use message::{
    ActionKind, ActionProgress, ActionStatus, Bid, ContractAck, NoBid, PreTaskAction,
    RemoveTaskFromSchedule, SoftBid, TaskAnnouncement, TaskContract, TaskStatusUpdate,
};
pub use planner::{PathPlanner, StubPlanner};
pub use store::memory::InMemoryTaskStore;
pub use store::sqlite_store::SqliteTaskStore;
pub use store::{PerformanceRecord, TaskStore};
pub use task::{Task, TaskStatus, WorkEstimate};
