use domain::TaskId;
use temporal::{TemporalNetwork, TimepointKind};

/// The bidding rule selects which scalar metric wins an auction. Only
/// `CompletionTime` is fully worked out in the source material this was
/// distilled from; the others are straightforward generalizations kept
/// behind the same trait so a fleet can be configured with any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiddingRule {
    CompletionTime,
    CompletionTimeDistance,
    Makespan,
    MakespanDistance,
    IdleTime,
}

impl Default for BiddingRule {
    fn default() -> Self {
        BiddingRule::CompletionTime
    }
}

/// `alpha` weights the temporal term against the distance term for the
/// two "...Distance" rules; ignored by the others.
pub fn score(
    rule: BiddingRule,
    alpha: f64,
    ordering: &[TaskId],
    graph: &TemporalNetwork,
    inserted_distance: f64,
) -> Option<f64> {
    match rule {
        BiddingRule::CompletionTime => completion_time(ordering, graph),
        BiddingRule::Makespan => makespan(ordering, graph),
        BiddingRule::CompletionTimeDistance => {
            completion_time(ordering, graph).map(|t| alpha * t + (1.0 - alpha) * inserted_distance)
        }
        BiddingRule::MakespanDistance => {
            makespan(ordering, graph).map(|t| alpha * t + (1.0 - alpha) * inserted_distance)
        }
        BiddingRule::IdleTime => idle_time(ordering, graph),
    }
}

fn completion_time(ordering: &[TaskId], graph: &TemporalNetwork) -> Option<f64> {
    let first = *ordering.first()?;
    let last = *ordering.last()?;
    let start = graph.get_time(first, TimepointKind::Start, true)?;
    let finish = graph.get_time(last, TimepointKind::Delivery, false)?;
    Some(finish - start)
}

fn makespan(ordering: &[TaskId], graph: &TemporalNetwork) -> Option<f64> {
    let last = *ordering.last()?;
    graph.get_time(last, TimepointKind::Delivery, false)
}

/// Per-robot incremental idle time: the sum of gaps between one task's
/// delivery and the next task's start, in the candidate schedule produced
/// by this insertion. Deliberately local to the bidding robot's own
/// dispatchable graph (see SPEC_FULL.md §9's resolution of this rule).
fn idle_time(ordering: &[TaskId], graph: &TemporalNetwork) -> Option<f64> {
    if ordering.len() < 2 {
        return Some(0.0);
    }
    let mut idle = 0.0;
    for pair in ordering.windows(2) {
        let delivery = graph.get_time(pair[0], TimepointKind::Delivery, false)?;
        let next_start = graph.get_time(pair[1], TimepointKind::Start, true)?;
        idle += (next_start - delivery).max(0.0);
    }
    Some(idle)
}
