use thiserror::Error;

use crate::ids::{RoundId, TaskId};

/// Domain-level error kinds, each with its own local recovery per
/// SPEC_FULL.md §7. Distinct from `anyhow::Error`, which is reserved for
/// fatal configuration/messaging failures that callers never branch on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("temporal network has no consistent solution")]
    NoSTPSolution,

    #[error("round {0} produced no allocation")]
    NoAllocation(RoundId),

    #[error("only soft bids available for round {0}, alternative start {1:.1}s")]
    AlternativeTimeSlot(RoundId, f64),

    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("{0} does not exist")]
    DoesNotExist(String),
}
