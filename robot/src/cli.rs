use bidder::BiddingRule;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BiddingRuleArg {
    CompletionTime,
    CompletionTimeDistance,
    Makespan,
    MakespanDistance,
    IdleTime,
}

impl From<BiddingRuleArg> for BiddingRule {
    fn from(value: BiddingRuleArg) -> Self {
        match value {
            BiddingRuleArg::CompletionTime => BiddingRule::CompletionTime,
            BiddingRuleArg::CompletionTimeDistance => BiddingRule::CompletionTimeDistance,
            BiddingRuleArg::Makespan => BiddingRule::Makespan,
            BiddingRuleArg::MakespanDistance => BiddingRule::MakespanDistance,
            BiddingRuleArg::IdleTime => BiddingRule::IdleTime,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "robot", version)]
pub struct Cli {
    /// This robot's fleet id, e.g. "ropod_001".
    pub robot_id: String,

    /// Seconds per stub-planner distance unit; only meaningful until a
    /// real path planner is wired in (SPEC_FULL.md §1 leaves it external).
    #[clap(long, default_value = "1.0")]
    pub seconds_per_unit: f64,

    /// Starting pose reported on the robot's first bid.
    #[clap(long, default_value = "depot")]
    pub start_pose: String,

    #[clap(long, value_enum, default_value = "completion-time")]
    pub bidding_rule: BiddingRuleArg,

    #[clap(long)]
    pub alternative_timeslots: bool,
}
