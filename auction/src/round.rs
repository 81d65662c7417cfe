//! Single-task sealed-bid auction round. Control flow grounded on the
//! original fleet's `Auctioneer`/round bookkeeping: open, collect bids
//! until closure time (or every robot has answered), resolve to a
//! winner, or fail with `NoAllocation`/`AlternativeTimeSlot`.

use std::collections::HashMap;

use domain::{AllocationError, Bid, RobotId, RoundId, SoftBid, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Open,
    Closing,
    Finished,
}

pub struct Round {
    pub round_id: RoundId,
    pub task: Task,
    pub state: RoundState,
    pub closure_time: f64,
    n_robots: usize,
    bids: HashMap<RobotId, Bid>,
    soft_bids: HashMap<RobotId, SoftBid>,
    responded: std::collections::HashSet<RobotId>,
}

impl Round {
    pub fn open(task: Task, n_robots: usize, closure_window: f64) -> Self {
        Self {
            round_id: RoundId::new(),
            closure_time: task.earliest_pickup_time - closure_window,
            task,
            state: RoundState::Open,
            n_robots,
            bids: HashMap::new(),
            soft_bids: HashMap::new(),
            responded: std::collections::HashSet::new(),
        }
    }

    pub fn process_bid(&mut self, bid: Bid) {
        self.responded.insert(bid.robot_id.clone());
        self.bids.insert(bid.robot_id.clone(), bid);
    }

    pub fn process_soft_bid(&mut self, bid: SoftBid) {
        self.responded.insert(bid.robot_id.clone());
        self.soft_bids.insert(bid.robot_id.clone(), bid);
    }

    pub fn process_no_bid(&mut self, robot_id: RobotId) {
        self.responded.insert(robot_id);
    }

    /// True once `now` has reached the closure time or every robot in the
    /// fleet has responded (bid, soft bid, or no-bid) to this round.
    pub fn time_to_close(&self, now: f64) -> bool {
        self.state == RoundState::Open
            && (now >= self.closure_time || self.responded.len() >= self.n_robots)
    }

    /// Transitions `Open -> Closing`. Idempotent: calling this again while
    /// already `Closing` or `Finished` is a no-op, so a second concurrent
    /// `time_to_close` true doesn't re-enter closure mid-resolution.
    pub fn begin_closing(&mut self) {
        if self.state == RoundState::Open {
            self.state = RoundState::Closing;
        }
    }

    /// Resolves the round. Hard bids are evaluated first; soft bids are a
    /// fallback considered only when no hard bid exists, per
    /// SPEC_FULL.md §9. Ties break by lowest task id then lowest robot id
    /// (both already fixed for this round, so in practice this just
    /// selects the lowest `temporal_metric`, with robot id as the final
    /// tiebreaker).
    pub fn get_result(&mut self) -> Result<Bid, AllocationError> {
        debug_assert_eq!(
            self.state,
            RoundState::Closing,
            "get_result called outside Closing state"
        );

        if let Some(winner) = Self::smallest_bid(self.bids.values()) {
            return Ok(winner.clone());
        }

        if let Some(soft_winner) = Self::smallest_soft_bid(self.soft_bids.values()) {
            return Err(AllocationError::AlternativeTimeSlot(
                self.round_id,
                soft_winner.alternative_start_time,
            ));
        }

        Err(AllocationError::NoAllocation(self.round_id))
    }

    /// Retrieves the soft bid that `get_result` selected as the
    /// alternative-timeslot winner, for callers that want to build a
    /// `TaskContract` from it after auto-accepting.
    pub fn soft_winner(&self) -> Option<&SoftBid> {
        Self::smallest_soft_bid(self.soft_bids.values())
    }

    fn smallest_bid<'a, I: Iterator<Item = &'a Bid>>(bids: I) -> Option<&'a Bid> {
        bids.min_by(|a, b| {
            a.temporal_metric
                .partial_cmp(&b.temporal_metric)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.robot_id.as_str().cmp(b.robot_id.as_str()))
        })
    }

    fn smallest_soft_bid<'a, I: Iterator<Item = &'a SoftBid>>(bids: I) -> Option<&'a SoftBid> {
        bids.min_by(|a, b| {
            a.temporal_metric
                .partial_cmp(&b.temporal_metric)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.robot_id.as_str().cmp(b.robot_id.as_str()))
        })
    }

    pub fn finish(&mut self) {
        self.state = RoundState::Finished;
    }

    pub fn finished(&self) -> bool {
        self.state == RoundState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PreTaskAction, WorkEstimate};

    fn sample_task() -> Task {
        Task::new("a", "b", 100.0, 200.0, WorkEstimate::new(30.0, 1.0))
    }

    fn action() -> PreTaskAction {
        PreTaskAction {
            from_location: "depot".into(),
            to_location: "a".into(),
            estimated_duration: WorkEstimate::new(10.0, 1.0),
        }
    }

    #[test]
    fn lowest_metric_wins() {
        let task = sample_task();
        let mut round = Round::open(task.clone(), 2, 10.0);
        round.begin_closing();
        round.process_bid(Bid {
            round_id: round.round_id,
            robot_id: RobotId::new("r1"),
            task_id: task.task_id,
            insertion_point: 0,
            temporal_metric: 50.0,
            pre_task_action: action(),
        });
        round.process_bid(Bid {
            round_id: round.round_id,
            robot_id: RobotId::new("r2"),
            task_id: task.task_id,
            insertion_point: 0,
            temporal_metric: 20.0,
            pre_task_action: action(),
        });

        let winner = round.get_result().unwrap();
        assert_eq!(winner.robot_id, RobotId::new("r2"));
    }

    #[test]
    fn no_bids_yields_no_allocation() {
        let task = sample_task();
        let mut round = Round::open(task, 2, 10.0);
        round.begin_closing();

        let err = round.get_result().unwrap_err();
        assert!(matches!(err, AllocationError::NoAllocation(_)));
    }

    #[test]
    fn soft_bid_only_used_as_fallback() {
        let task = sample_task();
        let mut round = Round::open(task.clone(), 1, 10.0);
        round.begin_closing();
        round.process_soft_bid(SoftBid {
            round_id: round.round_id,
            robot_id: RobotId::new("r1"),
            task_id: task.task_id,
            insertion_point: 0,
            temporal_metric: 50.0,
            alternative_start_time: 300.0,
            pre_task_action: action(),
        });

        let err = round.get_result().unwrap_err();
        match err {
            AllocationError::AlternativeTimeSlot(_, start) => assert_eq!(start, 300.0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn responses_from_entire_fleet_close_early() {
        let task = sample_task();
        let mut round = Round::open(task, 1, 10.0);
        assert!(!round.time_to_close(0.0));
        round.process_no_bid(RobotId::new("r1"));
        assert!(round.time_to_close(0.0));
    }
}
