//! Per-robot bid computation: try every insertion position, keep the
//! cheapest consistent one. Grounded on the original fleet's
//! `Robot.insert_task` (try each position, build the candidate network,
//! check consistency, compute the bid, keep the best, restore state for
//! the next try) generalized over the configured bidding rule.

use domain::{Bid, NoBid, PathPlanner, PreTaskAction, RobotId, RoundId, SoftBid, Task};
use timetable::Timetable;
use tracing::instrument;

use crate::rules::{self, BiddingRule};

#[derive(Debug, Clone, Copy)]
pub struct BidderConfig {
    pub rule: BiddingRule,
    pub alpha: f64,
    pub alternative_timeslots: bool,
}

impl Default for BidderConfig {
    fn default() -> Self {
        Self {
            rule: BiddingRule::default(),
            alpha: 0.1,
            alternative_timeslots: false,
        }
    }
}

pub enum BidOutcome {
    Bid(Bid),
    SoftBid(SoftBid),
    NoBid(NoBid),
}

struct Candidate {
    position: usize,
    metric: f64,
    alternative_start_time: Option<f64>,
    pre_task_action: PreTaskAction,
}

pub struct Bidder<P: PathPlanner> {
    pub robot_id: RobotId,
    pub config: BidderConfig,
    planner: P,
}

impl<P: PathPlanner> Bidder<P> {
    pub fn new(robot_id: RobotId, config: BidderConfig, planner: P) -> Self {
        Self {
            robot_id,
            config,
            planner,
        }
    }

    /// Evaluates `task` against every insertion point of `timetable` and
    /// returns the cheapest feasible bid, or a soft bid / no-bid per
    /// SPEC_FULL.md §4.3. `scheduled` must contain every task currently in
    /// `timetable`'s ordering, keyed by id, so the predecessor's delivery
    /// location is known at each insertion point; the robot process keeps
    /// this map in step with its own timetable as tasks are won.
    #[instrument(skip(self, timetable, task, scheduled), fields(robot_id = %self.robot_id, task_id = %task.task_id))]
    pub fn compute_bid(
        &self,
        timetable: &Timetable,
        round_id: RoundId,
        task: &Task,
        robot_pose: &str,
        scheduled: &std::collections::HashMap<domain::TaskId, Task>,
    ) -> BidOutcome {
        let mut best: Option<Candidate> = None;
        let mut best_soft: Option<Candidate> = None;

        for position in 0..=timetable.len() {
            let predecessor_location = if position == 0 {
                robot_pose.to_string()
            } else {
                let predecessor_id = timetable.ordering()[position - 1];
                scheduled
                    .get(&predecessor_id)
                    .map(|t| t.delivery_location.clone())
                    .unwrap_or_else(|| robot_pose.to_string())
            };

            let travel = self
                .planner
                .estimate_travel(&predecessor_location, &task.pickup_location);

            let mut candidate_tt = timetable.clone();
            candidate_tt.insert_task_at(position, task, (0.0, travel.mean + travel.std_dev()));

            if candidate_tt.recompute_dispatchable().is_err() {
                continue;
            }
            let graph = match candidate_tt.dispatchable() {
                Some(g) => g,
                None => continue,
            };

            let metric = match rules::score(
                self.config.rule,
                self.config.alpha,
                candidate_tt.ordering(),
                graph,
                travel.mean,
            ) {
                Some(m) => m,
                None => continue,
            };

            let start_time = graph
                .get_time(task.task_id, temporal::TimepointKind::Pickup, true)
                .unwrap_or(task.earliest_pickup_time);

            let action = PreTaskAction {
                from_location: predecessor_location,
                to_location: task.pickup_location.clone(),
                estimated_duration: travel,
            };

            let is_soft = start_time > task.latest_pickup_time;

            let slot = Candidate {
                position,
                metric,
                alternative_start_time: is_soft.then_some(start_time),
                pre_task_action: action,
            };

            if is_soft {
                if best_soft.as_ref().map_or(true, |b| slot.metric < b.metric) {
                    best_soft = Some(slot);
                }
            } else if best.as_ref().map_or(true, |b| slot.metric < b.metric) {
                best = Some(slot);
            }
        }

        if let Some(c) = best {
            return BidOutcome::Bid(Bid {
                round_id,
                robot_id: self.robot_id.clone(),
                task_id: task.task_id,
                insertion_point: c.position,
                temporal_metric: c.metric,
                pre_task_action: c.pre_task_action,
            });
        }

        if self.config.alternative_timeslots {
            if let Some(c) = best_soft {
                return BidOutcome::SoftBid(SoftBid {
                    round_id,
                    robot_id: self.robot_id.clone(),
                    task_id: task.task_id,
                    insertion_point: c.position,
                    temporal_metric: c.metric,
                    alternative_start_time: c.alternative_start_time.unwrap_or(task.earliest_pickup_time),
                    pre_task_action: c.pre_task_action,
                });
            }
        }

        BidOutcome::NoBid(NoBid {
            round_id,
            robot_id: self.robot_id.clone(),
            task_ids: vec![task.task_id],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{RobotId, StubPlanner, Task, WorkEstimate};

    fn task(earliest: f64, latest: f64) -> Task {
        Task::new("dock-a", "dock-b", earliest, latest, WorkEstimate::new(30.0, 1.0))
    }

    #[test]
    fn empty_timetable_yields_a_hard_bid() {
        let timetable = Timetable::new(RobotId::new("r1"), 0.0);
        let bidder = Bidder::new(
            RobotId::new("r1"),
            BidderConfig::default(),
            StubPlanner::new(1.0),
        );
        let t = task(100.0, 500.0);
        let outcome = bidder.compute_bid(&timetable, RoundId::new(), &t, "depot", &std::collections::HashMap::new());

        assert!(matches!(outcome, BidOutcome::Bid(_)));
    }

    #[test]
    fn impossible_window_without_alternative_timeslots_yields_no_bid() {
        let timetable = Timetable::new(RobotId::new("r1"), 0.0);
        let config = BidderConfig {
            alternative_timeslots: false,
            ..Default::default()
        };
        let bidder = Bidder::new(RobotId::new("r1"), config, StubPlanner::new(1.0));
        let t = task(-1000.0, -999.0);
        let outcome = bidder.compute_bid(&timetable, RoundId::new(), &t, "depot", &std::collections::HashMap::new());

        assert!(matches!(outcome, BidOutcome::NoBid(_)));
    }

    #[test]
    fn impossible_window_with_alternative_timeslots_yields_soft_bid() {
        let timetable = Timetable::new(RobotId::new("r1"), 0.0);
        let config = BidderConfig {
            alternative_timeslots: true,
            ..Default::default()
        };
        let bidder = Bidder::new(RobotId::new("r1"), config, StubPlanner::new(1.0));
        let t = task(-1000.0, -999.0);
        let outcome = bidder.compute_bid(&timetable, RoundId::new(), &t, "depot", &std::collections::HashMap::new());

        assert!(matches!(outcome, BidOutcome::SoftBid(_)));
    }
}
