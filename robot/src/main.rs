//! Robot-proxy binary: one process per fleet robot. Mirrors its own
//! timetable, bids into every auction it's announced, and acknowledges
//! contracts it wins. Grounded on `cli/src/main.rs`'s shape (parse CLI,
//! spawn one long-running task, wait on it) adapted from a single
//! dispatcher task to a bid/contract-ack loop driven by the message bus.

mod cli;

use std::collections::HashMap;
use std::sync::Arc;

use bidder::{BidOutcome, Bidder, BidderConfig};
use clap::Parser;
use domain::{
    ContractAck, PathPlanner, PreTaskAction, RemoveTaskFromSchedule, RobotId, StubPlanner, Task,
    TaskContract, TaskId,
};
use messaging::{AUCTIONEER_PEER, Envelope, GROUP_TASK_ALLOCATION, InProcessBus, MessageBus, MessageType};
use timetable::Timetable;
use tracing::{info, warn};

use crate::cli::Cli;

/// A bid this robot has outstanding, kept so the task can actually be
/// inserted into the local timetable once (and if) the contract arrives.
struct PendingBid {
    task: Task,
    insertion_point: usize,
    pre_task_action: PreTaskAction,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    common::init_tracing("robot", false);

    let bus: Arc<dyn MessageBus> = InProcessBus::new();
    let robot_id = RobotId::new(cli.robot_id.clone());
    let mut group_rx = bus.subscribe(GROUP_TASK_ALLOCATION).await;
    let mut peer_rx = bus.register_peer(robot_id.as_str()).await;

    let planner = StubPlanner::new(cli.seconds_per_unit);
    let bidder = Bidder::new(
        robot_id.clone(),
        BidderConfig {
            rule: cli.bidding_rule.into(),
            alternative_timeslots: cli.alternative_timeslots,
            ..BidderConfig::default()
        },
        planner,
    );

    let mut timetable = Timetable::new(robot_id.clone(), 0.0);
    let mut scheduled: HashMap<TaskId, Task> = HashMap::new();
    let mut pending: HashMap<TaskId, PendingBid> = HashMap::new();

    info!(robot_id = %robot_id, "robot online");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(robot_id = %robot_id, "shutting down");
                return Ok(());
            }
            Some(envelope) = group_rx.recv() => {
                handle_group_message(envelope, &bidder, &bus, &cli.start_pose, &timetable, &scheduled, &mut pending).await;
            }
            Some(envelope) = peer_rx.recv() => {
                handle_peer_message(envelope, &bus, &robot_id, &mut timetable, &mut scheduled, &mut pending, &planner, &cli.start_pose).await;
            }
        }
    }
}

async fn handle_group_message(
    envelope: Envelope,
    bidder: &Bidder<StubPlanner>,
    bus: &Arc<dyn MessageBus>,
    pose: &str,
    timetable: &Timetable,
    scheduled: &HashMap<TaskId, Task>,
    pending: &mut HashMap<TaskId, PendingBid>,
) {
    if envelope.header.msg_type != MessageType::TaskAnnouncement {
        return;
    }
    let Ok(announcement) = envelope.decode::<domain::TaskAnnouncement>() else {
        return;
    };

    for task in announcement.tasks {
        let outcome = bidder.compute_bid(timetable, announcement.round_id, &task, pose, scheduled);
        match outcome {
            BidOutcome::Bid(bid) => {
                pending.insert(
                    bid.task_id,
                    PendingBid {
                        task: task.clone(),
                        insertion_point: bid.insertion_point,
                        pre_task_action: bid.pre_task_action.clone(),
                    },
                );
                if let Ok(envelope) = Envelope::new(MessageType::Bid, &bid) {
                    bus.whisper(AUCTIONEER_PEER, envelope).await;
                }
            }
            BidOutcome::SoftBid(soft) => {
                pending.insert(
                    soft.task_id,
                    PendingBid {
                        task: task.clone(),
                        insertion_point: soft.insertion_point,
                        pre_task_action: soft.pre_task_action.clone(),
                    },
                );
                if let Ok(envelope) = Envelope::new(MessageType::SoftBid, &soft) {
                    bus.whisper(AUCTIONEER_PEER, envelope).await;
                }
            }
            BidOutcome::NoBid(no_bid) => {
                if let Ok(envelope) = Envelope::new(MessageType::NoBid, &no_bid) {
                    bus.whisper(AUCTIONEER_PEER, envelope).await;
                }
            }
        }
    }
}

async fn handle_peer_message(
    envelope: Envelope,
    bus: &Arc<dyn MessageBus>,
    robot_id: &RobotId,
    timetable: &mut Timetable,
    scheduled: &mut HashMap<TaskId, Task>,
    pending: &mut HashMap<TaskId, PendingBid>,
    planner: &StubPlanner,
    start_pose: &str,
) {
    match envelope.header.msg_type {
        MessageType::TaskContract => {
            handle_task_contract(envelope, bus, robot_id, timetable, scheduled, pending, planner, start_pose).await;
        }
        MessageType::RemoveTaskFromSchedule => {
            let Ok(notice) = envelope.decode::<RemoveTaskFromSchedule>() else {
                return;
            };
            let new_travel = reconnect_travel(planner, timetable, scheduled, start_pose, notice.task_id);
            let _ = timetable.remove_task(notice.task_id, new_travel);
            let _ = timetable.recompute_dispatchable();
            scheduled.remove(&notice.task_id);
            info!(task_id = %notice.task_id, status = %notice.status, "removed task from local schedule");
        }
        _ => {}
    }
}

async fn handle_task_contract(
    envelope: Envelope,
    bus: &Arc<dyn MessageBus>,
    robot_id: &RobotId,
    timetable: &mut Timetable,
    scheduled: &mut HashMap<TaskId, Task>,
    pending: &mut HashMap<TaskId, PendingBid>,
    planner: &StubPlanner,
    start_pose: &str,
) {
    let Ok(contract) = envelope.decode::<TaskContract>() else {
        return;
    };
    if contract.robot_id != *robot_id {
        return;
    }

    let Some(won) = pending.remove(&contract.task_id) else {
        warn!(task_id = %contract.task_id, "contract for a bid this robot never placed");
        return;
    };

    let travel = won.pre_task_action.estimated_duration;
    timetable.insert_task_at(won.insertion_point, &won.task, (0.0, travel.mean + travel.std_dev()));
    let accept = timetable.recompute_dispatchable().is_ok();
    if accept {
        scheduled.insert(won.task.task_id, won.task.clone());
    } else {
        let new_travel = reconnect_travel(planner, timetable, scheduled, start_pose, won.task.task_id);
        let _ = timetable.remove_task(won.task.task_id, new_travel);
    }

    let ack = ContractAck {
        task_id: contract.task_id,
        robot_id: robot_id.clone(),
        accept,
        n_tasks: timetable.len(),
    };
    info!(task_id = %ack.task_id, accept, "acknowledging contract");
    if let Ok(envelope) = Envelope::new(MessageType::TaskContractAcknowledgement, &ack) {
        bus.whisper(AUCTIONEER_PEER, envelope).await;
    }
}

/// The `(lb, ub)` travel edge to wire between the tasks that become
/// adjacent once `removed` drops out of `timetable`'s ordering. `None` if
/// there is no successor to reconnect.
fn reconnect_travel(
    planner: &StubPlanner,
    timetable: &Timetable,
    scheduled: &HashMap<TaskId, Task>,
    start_pose: &str,
    removed: TaskId,
) -> Option<(f64, f64)> {
    let successor_id = timetable.get_next_task(removed)?;
    let successor = scheduled.get(&successor_id)?;

    let from_location = match timetable.get_previous_task(removed) {
        Some(predecessor_id) => scheduled.get(&predecessor_id)?.delivery_location.clone(),
        None => start_pose.to_string(),
    };

    let travel = planner.estimate_travel(&from_location, &successor.pickup_location);
    Some((0.0, travel.mean + travel.std_dev()))
}
