//! Coordinator-side auction driver. The tick/announce/resolve flow below
//! is grounded on `Scheduler::on_tick` (bounded, single responsibility
//! per call, `#[instrument]`-annotated, tracing on every branch) and its
//! control flow matches the original fleet's `Auctioneer.run`: announce
//! when idle with pending work, resolve once the open round reaches its
//! closure time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use domain::{AllocationError, Bid, ContractAck, PreTaskAction, RobotId, Task, TaskAnnouncement, TaskContract, TaskId};
use messaging::{Envelope, GROUP_TASK_ALLOCATION, MessageBus, MessageType};
use tracing::{debug, field, info, instrument, warn};

use crate::round::Round;

pub struct AuctioneerConfig {
    pub closure_window_s: f64,
    pub alternative_timeslots: bool,
}

/// A resolved round waiting on the robot's acknowledgement, carrying
/// enough of the winning bid for the coordinator to insert the task into
/// its mirrored timetable once the robot accepts.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub task_id: TaskId,
    pub robot_id: RobotId,
    pub insertion_point: usize,
    pub pre_task_action: PreTaskAction,
}

/// Drives repeated single-item auctions over a shared task queue.
///
/// Owns `tasks_to_allocate` and the live `Round` exclusively, per
/// SPEC_FULL.md §3's ownership rule; the coordinator only ever reads
/// `allocations` after draining them.
pub struct Auctioneer {
    robot_ids: Vec<RobotId>,
    tasks_to_allocate: VecDeque<Task>,
    round: Option<Round>,
    pre_task_actions: HashMap<TaskId, PreTaskAction>,
    pub allocations: Vec<Allocation>,
    awaiting_ack: Option<Allocation>,
    config: AuctioneerConfig,
    bus: Arc<dyn MessageBus>,
    ztp: f64,
}

impl Auctioneer {
    pub fn new(robot_ids: Vec<RobotId>, config: AuctioneerConfig, bus: Arc<dyn MessageBus>, ztp: f64) -> Self {
        Self {
            robot_ids,
            tasks_to_allocate: VecDeque::new(),
            round: None,
            pre_task_actions: HashMap::new(),
            allocations: Vec::new(),
            awaiting_ack: None,
            config,
            bus,
            ztp,
        }
    }

    pub fn enqueue_task(&mut self, task: Task) {
        self.tasks_to_allocate.push_back(task);
    }

    pub fn pending_count(&self) -> usize {
        self.tasks_to_allocate.len()
    }

    /// One tick of the auction driver.
    #[instrument(skip(self), fields(round_id = field::Empty))]
    pub async fn run(&mut self, now: f64) {
        let round_finished = self.round.as_ref().map_or(true, Round::finished);

        if !self.tasks_to_allocate.is_empty() && round_finished {
            self.announce_task(now).await;
        }

        if let Some(round) = self.round.as_mut() {
            tracing::Span::current().record("round_id", field::display(round.round_id));
            if round.time_to_close(now) {
                round.begin_closing();
                self.resolve_round().await;
            }
        }
    }

    /// Opens a round for the earliest queued task. Drops the task (per
    /// the "closure edge case" in SPEC_FULL.md §4.5) if its closure time
    /// has already passed and alternative timeslots are disabled.
    #[instrument(skip(self))]
    async fn announce_task(&mut self, _now: f64) {
        let task = self.tasks_to_allocate.front().cloned().unwrap();
        let closure_time = task.earliest_pickup_time - self.config.closure_window_s;

        if closure_time < 0.0 && !self.config.alternative_timeslots {
            warn!(task_id = %task.task_id, "dropping task: closure time already elapsed");
            self.tasks_to_allocate.pop_front();
            return;
        }

        self.tasks_to_allocate.pop_front();
        let round = Round::open(task.clone(), self.robot_ids.len(), self.config.closure_window_s);
        info!(round_id = %round.round_id, task_id = %task.task_id, "announcing task");

        let announcement = TaskAnnouncement {
            round_id: round.round_id,
            ztp: self.ztp,
            tasks: vec![task],
        };
        if let Ok(envelope) = Envelope::new(MessageType::TaskAnnouncement, &announcement) {
            self.bus.publish(GROUP_TASK_ALLOCATION, envelope).await;
        }

        self.round = Some(round);
    }

    pub fn process_bid(&mut self, bid: Bid) {
        if let Some(round) = self.round.as_mut() {
            self.pre_task_actions
                .insert(bid.task_id, bid.pre_task_action.clone());
            round.process_bid(bid);
        }
    }

    pub fn process_soft_bid(&mut self, bid: domain::SoftBid) {
        if let Some(round) = self.round.as_mut() {
            self.pre_task_actions
                .insert(bid.task_id, bid.pre_task_action.clone());
            round.process_soft_bid(bid);
        }
    }

    pub fn process_no_bid(&mut self, robot_id: RobotId) {
        if let Some(round) = self.round.as_mut() {
            round.process_no_bid(robot_id);
        }
    }

    #[instrument(skip(self))]
    async fn resolve_round(&mut self) {
        let Some(round) = self.round.as_mut() else {
            return;
        };

        match round.get_result() {
            Ok(winner) => {
                let contract = TaskContract {
                    task_id: winner.task_id,
                    robot_id: winner.robot_id.clone(),
                };
                debug!(robot_id = %contract.robot_id, task_id = %contract.task_id, "sending task contract");
                self.awaiting_ack = Some(Allocation {
                    task_id: winner.task_id,
                    robot_id: winner.robot_id.clone(),
                    insertion_point: winner.insertion_point,
                    pre_task_action: winner.pre_task_action.clone(),
                });
                if let Ok(envelope) = Envelope::new(MessageType::TaskContract, &contract) {
                    self.bus.whisper(contract.robot_id.as_str(), envelope).await;
                }
            }
            Err(AllocationError::AlternativeTimeSlot(_, _)) => {
                if let Some(soft) = round.soft_winner().cloned() {
                    info!(robot_id = %soft.robot_id, task_id = %soft.task_id, alt_start = soft.alternative_start_time, "auto-accepting alternative timeslot");
                    let contract = TaskContract {
                        task_id: soft.task_id,
                        robot_id: soft.robot_id.clone(),
                    };
                    self.awaiting_ack = Some(Allocation {
                        task_id: soft.task_id,
                        robot_id: soft.robot_id.clone(),
                        insertion_point: soft.insertion_point,
                        pre_task_action: soft.pre_task_action.clone(),
                    });
                    if let Ok(envelope) = Envelope::new(MessageType::TaskContract, &contract) {
                        self.bus.whisper(contract.robot_id.as_str(), envelope).await;
                    }
                } else {
                    round.finish();
                }
            }
            Err(AllocationError::NoAllocation(round_id)) => {
                warn!(%round_id, "round produced no allocation; re-queuing task");
                let task = round.task.clone();
                self.tasks_to_allocate.push_front(task);
                round.finish();
            }
            Err(other) => {
                warn!(error = %other, "unexpected error resolving round");
                round.finish();
            }
        }
    }

    /// Handles the robot's acknowledgement of a contract. Valid
    /// acceptance merges the task into the coordinator's mirror of the
    /// allocation; rejection or an invalid claimed schedule size re-queues
    /// the task and finishes the round without allocation.
    #[instrument(skip(self, ack))]
    pub fn task_contract_acknowledgement(&mut self, ack: ContractAck, n_before: usize) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if round.task.task_id != ack.task_id {
            return;
        }

        if ack.accept && TaskContract::is_valid(n_before, ack.n_tasks) {
            info!(robot_id = %ack.robot_id, task_id = %ack.task_id, "contract accepted");
            if let Some(allocation) = self.awaiting_ack.take() {
                self.allocations.push(allocation);
            }
            round.finish();
        } else {
            warn!(robot_id = %ack.robot_id, task_id = %ack.task_id, "contract rejected or invalid; re-queuing");
            let mut task = round.task.clone();
            task.assigned_robots.clear();
            self.tasks_to_allocate.push_front(task);
            round.finish();
        }
    }

    pub fn take_pre_task_action(&mut self, task_id: TaskId) -> Option<PreTaskAction> {
        self.pre_task_actions.remove(&task_id)
    }

    pub fn drain_allocations(&mut self) -> Vec<Allocation> {
        std::mem::take(&mut self.allocations)
    }
}
