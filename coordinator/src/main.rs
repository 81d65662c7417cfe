//! Coordinator (CCU) binary: owns the auctioneer, dispatcher, and
//! timetable monitor, and runs the cooperative tick loop described in
//! SPEC_FULL.md §4.9. Wiring follows `backend/src/main.rs`'s shape —
//! build shared state, spin up the loop, wait on `ctrl_c()` — adapted
//! from a router+feed pair of background tasks to one synchronous
//! per-tick pass, since every component here is already non-blocking.

mod cli;
mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use auction::{Auctioneer, AuctioneerConfig};
use clap::Parser;
use dispatch::{Dispatcher, DispatcherConfig};
use domain::{
    ContractAck, InMemoryTaskStore, NoBid, PerformanceRecord, RobotId, StubPlanner, Task, TaskId,
    TaskStatus, TaskStatusUpdate, TaskStore,
};
use messaging::{AUCTIONEER_PEER, Envelope, InProcessBus, MessageBus, MessageType};
use monitor::TimetableMonitor;
use timetable::{InMemoryTimetableStore, Timetable, TimetableStore};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::Config;

const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    common::init_tracing("coordinator", is_production);

    let config = Config::load(&cli.file)?;
    info!(experiment = %cli.experiment, approach = %cli.approach, fleet_size = config.fleet.len(), "coordinator starting");

    let bus = InProcessBus::new();
    let mut inbox = bus.register_peer(AUCTIONEER_PEER).await;

    let robot_ids: Vec<RobotId> = config.fleet.iter().map(|id| RobotId::new(id.as_str())).collect();

    let timetable_store: Arc<dyn TimetableStore> = Arc::new(InMemoryTimetableStore::new());
    let task_store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());

    let mut timetables: HashMap<RobotId, Timetable> = timetable_store
        .load_all()
        .await?
        .into_iter()
        .map(|t| (t.robot_id.clone(), t))
        .collect();
    for id in &robot_ids {
        timetables
            .entry(id.clone())
            .or_insert_with(|| Timetable::new(id.clone(), 0.0));
    }
    let mut tasks: HashMap<TaskId, Task> = task_store
        .load_all_tasks()
        .await?
        .into_iter()
        .map(|t| (t.task_id, t))
        .collect();

    let mut auctioneer = Auctioneer::new(
        robot_ids.clone(),
        AuctioneerConfig {
            closure_window_s: config.closure_window_s,
            alternative_timeslots: config.alternative_timeslots,
        },
        bus.clone() as Arc<dyn MessageBus>,
        0.0,
    );
    let mut dispatcher = Dispatcher::new(
        DispatcherConfig {
            freeze_window_s: config.freeze_window_minutes * 60.0,
            horizon: config.n_queued_tasks,
        },
        bus.clone() as Arc<dyn MessageBus>,
    );
    let mut timetable_monitor = TimetableMonitor::new(
        config.recovery_method.into(),
        StubPlanner::new(1.0),
        bus.clone() as Arc<dyn MessageBus>,
    );

    let start = Instant::now();
    loop {
        while let Ok(envelope) = inbox.try_recv() {
            handle_message(
                envelope,
                &mut auctioneer,
                &mut timetable_monitor,
                &mut timetables,
                &mut tasks,
                start.elapsed().as_secs_f64(),
            )
            .await;
        }

        let now = start.elapsed().as_secs_f64();
        auctioneer.run(now).await;
        dispatcher.run(now, &mut timetables, &mut tasks).await;
        timetable_monitor.run(now, &mut timetables, &mut tasks).await;

        for allocation in auctioneer.drain_allocations() {
            apply_allocation(allocation, &mut timetables, &mut tasks, &task_store, &cli.experiment, now).await;
        }

        for timetable in timetables.values() {
            if let Err(e) = timetable_store.save(timetable).await {
                warn!(robot_id = %timetable.robot_id, error = %e, "failed to persist timetable");
            }
        }
        for task in tasks.values() {
            if let Err(e) = task_store.save_task(task).await {
                warn!(task_id = %task.task_id, error = %e, "failed to persist task");
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
            _ = tokio::time::sleep(TICK_INTERVAL) => {}
        }
    }
}

async fn apply_allocation(
    allocation: auction::Allocation,
    timetables: &mut HashMap<RobotId, Timetable>,
    tasks: &mut HashMap<TaskId, Task>,
    task_store: &Arc<dyn TaskStore>,
    experiment: &str,
    now: f64,
) {
    let Some(timetable) = timetables.get_mut(&allocation.robot_id) else {
        warn!(robot_id = %allocation.robot_id, "allocation for unknown robot");
        return;
    };
    let Some(task) = tasks.get_mut(&allocation.task_id) else {
        warn!(task_id = %allocation.task_id, "allocation for unknown task");
        return;
    };

    let travel = allocation.pre_task_action.estimated_duration;
    timetable.insert_task_at(
        allocation.insertion_point,
        task,
        (0.0, travel.mean + travel.std_dev()),
    );
    if let Err(e) = timetable.recompute_dispatchable() {
        warn!(robot_id = %allocation.robot_id, error = %e, "allocation left the timetable inconsistent");
    }

    task.assigned_robots.push(allocation.robot_id.clone());
    let _ = task.set_status(TaskStatus::Allocated);
    let _ = task.set_status(TaskStatus::Planned);

    let record = PerformanceRecord {
        task_id: task.task_id,
        robot_id: allocation.robot_id.clone(),
        experiment: experiment.to_string(),
        allocated_at: now,
        completed_at: None,
    };
    if let Err(e) = task_store.record_performance(&record).await {
        warn!(task_id = %task.task_id, error = %e, "failed to record performance");
    }
}

async fn handle_message(
    envelope: Envelope,
    auctioneer: &mut Auctioneer,
    timetable_monitor: &mut TimetableMonitor<StubPlanner>,
    timetables: &mut HashMap<RobotId, Timetable>,
    tasks: &mut HashMap<TaskId, Task>,
    now: f64,
) {
    match envelope.header.msg_type {
        MessageType::Bid => {
            if let Ok(bid) = envelope.decode() {
                auctioneer.process_bid(bid);
            }
        }
        MessageType::SoftBid => {
            if let Ok(bid) = envelope.decode() {
                auctioneer.process_soft_bid(bid);
            }
        }
        MessageType::NoBid => {
            if let Ok(no_bid) = envelope.decode::<NoBid>() {
                auctioneer.process_no_bid(no_bid.robot_id);
            }
        }
        MessageType::TaskContractAcknowledgement => {
            if let Ok(ack) = envelope.decode::<ContractAck>() {
                let n_before = timetables
                    .get(&ack.robot_id)
                    .map(Timetable::len)
                    .unwrap_or(0);
                auctioneer.task_contract_acknowledgement(ack, n_before);
            }
        }
        MessageType::TaskStatus => {
            if let Ok(update) = envelope.decode::<TaskStatusUpdate>() {
                let outcome = timetable_monitor
                    .on_task_status(update, now, timetables, tasks)
                    .await;
                for task in outcome.requeue {
                    auctioneer.enqueue_task(task);
                }
            }
        }
        other => {
            warn!(?other, "unhandled message type at coordinator");
        }
    }
}
