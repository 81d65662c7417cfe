//! A Simple Temporal Network (STN), optionally with contingent (STNU) edges.
//!
//! Nodes are timepoints (`NodeId`); edges are bounded intervals in seconds
//! relative to no particular origin except the dedicated `NodeId::Zero`
//! node, which every robot's network carries as its absolute-time anchor.
//! `dist[i][j]` is the tightest known upper bound on `time(j) - time(i)`;
//! the lower bound on that same quantity is `-dist[j][i]`. This is the
//! standard distance-graph encoding, which is what makes all-pairs
//! shortest path (Floyd-Warshall) double as constraint propagation.

use std::collections::{HashMap, HashSet};

use domain::{AllocationError, TaskId};
use tracing::instrument;

use crate::node::{NodeId, TimepointKind};

const INF: f64 = f64::INFINITY;

#[derive(Debug, Clone, Default)]
pub struct TemporalNetwork {
    nodes: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    /// dist[i][j] = upper bound on time(j) - time(i).
    dist: Vec<Vec<f64>>,
    /// Edges whose duration is observed at runtime rather than controlled
    /// by the robot (travel and work durations under STNU).
    contingent: HashSet<(usize, usize)>,
}

impl TemporalNetwork {
    pub fn new() -> Self {
        let mut net = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            dist: Vec::new(),
            contingent: HashSet::new(),
        };
        net.node_index(NodeId::Zero);
        net
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn raw_dist(&self) -> &[Vec<f64>] {
        &self.dist
    }

    pub fn raw_contingent(&self) -> &HashSet<(usize, usize)> {
        &self.contingent
    }

    /// Rebuilds a network from its raw parts (used to deserialize a
    /// `NetworkSnapshot`). `nodes`/`dist` must already be consistent with
    /// each other (same ordering, `dist` sized `nodes.len()`).
    pub fn from_parts(
        nodes: Vec<NodeId>,
        dist: Vec<Vec<f64>>,
        contingent: HashSet<(usize, usize)>,
    ) -> Self {
        let index = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        Self {
            nodes,
            index,
            dist,
            contingent,
        }
    }

    pub fn has_task(&self, task_id: TaskId) -> bool {
        self.index.contains_key(&NodeId::start(task_id))
    }

    fn node_index(&mut self, node: NodeId) -> usize {
        if let Some(&i) = self.index.get(&node) {
            return i;
        }
        let new_i = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(node, new_i);

        for row in self.dist.iter_mut() {
            row.push(INF);
        }
        let mut new_row = vec![INF; new_i + 1];
        new_row[new_i] = 0.0;
        self.dist.push(new_row);
        for i in 0..=new_i {
            self.dist[i][i] = 0.0;
        }
        new_i
    }

    fn try_index(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    /// Adds (or tightens) the bounded-interval constraint `lb <= to - from <= ub`.
    pub fn add_constraint(&mut self, from: NodeId, to: NodeId, lb: f64, ub: f64, contingent: bool) {
        let i = self.node_index(from);
        let j = self.node_index(to);
        if ub < self.dist[i][j] {
            self.dist[i][j] = ub;
        }
        if -lb < self.dist[j][i] {
            self.dist[j][i] = -lb;
        }
        if contingent {
            self.contingent.insert((i, j));
        }
    }

    /// All-pairs shortest path over the distance graph. Returns the
    /// minimal network; does not mutate `self`.
    #[instrument(skip(self))]
    pub fn floyd_warshall(&self) -> Vec<Vec<f64>> {
        let n = self.nodes.len();
        let mut d = self.dist.clone();
        for k in 0..n {
            for i in 0..n {
                if d[i][k] == INF {
                    continue;
                }
                for j in 0..n {
                    if d[k][j] == INF {
                        continue;
                    }
                    let through = d[i][k] + d[k][j];
                    if through < d[i][j] {
                        d[i][j] = through;
                    }
                }
            }
        }
        d
    }

    /// A minimal network is consistent iff it has no negative cycle, which
    /// shows up as a negative value on the diagonal after closure.
    pub fn is_consistent(minimal: &[Vec<f64>]) -> bool {
        minimal.iter().enumerate().all(|(i, row)| row[i] >= 0.0)
    }

    /// Replaces the network's edge bounds with an externally computed
    /// minimal network (must be the same size/ordering as `self.nodes`).
    pub fn update_edges(&mut self, minimal: Vec<Vec<f64>>) {
        self.dist = minimal;
    }

    /// Earliest (`lower = true`) or latest (`lower = false`) time at a
    /// node, relative to the zero-timepoint.
    pub fn get_time(&self, task_id: TaskId, kind: TimepointKind, lower: bool) -> Option<f64> {
        let node = NodeId::Task(task_id, kind);
        let idx = self.try_index(node)?;
        let zero = self.index[&NodeId::Zero];
        Some(if lower {
            -self.dist[idx][zero]
        } else {
            self.dist[zero][idx]
        })
    }

    /// Pins a node's time to an exact value by tightening both of its
    /// bounds to `time`. If this would make the node's window empty and
    /// `force` is false, returns `NoSTPSolution` instead of corrupting the
    /// network; with `force` true, the existing bound is widened instead.
    pub fn assign_timepoint(
        &mut self,
        time: f64,
        task_id: TaskId,
        kind: TimepointKind,
        force: bool,
    ) -> Result<(), AllocationError> {
        let node = NodeId::Task(task_id, kind);
        let idx = match self.try_index(node) {
            Some(i) => i,
            None => return Err(AllocationError::TaskNotFound(task_id)),
        };
        let zero = self.index[&NodeId::Zero];

        let current_lb = -self.dist[idx][zero];
        let current_ub = self.dist[zero][idx];

        if !force && (time < current_lb || time > current_ub) {
            return Err(AllocationError::NoSTPSolution);
        }

        self.dist[zero][idx] = time;
        self.dist[idx][zero] = -time;
        Ok(())
    }

    /// Runs Floyd-Warshall, checks consistency, and on success returns a
    /// tightened copy representing the dispatchable graph. STNU contingent
    /// edges are given one extra standard deviation of upper-bound slack
    /// before closure (`widen_contingent`), approximating the dispatchable
    /// form of an STNU without implementing full dynamic controllability.
    #[instrument(skip(self))]
    pub fn compute_dispatchable_graph(
        &self,
        widen_contingent_variance: Option<HashMap<(usize, usize), f64>>,
    ) -> Result<TemporalNetwork, AllocationError> {
        let mut working = self.clone();
        if let Some(variances) = widen_contingent_variance {
            for (&(i, j), var) in variances.iter() {
                if working.contingent.contains(&(i, j)) && working.dist[i][j] < INF {
                    working.dist[i][j] += var.sqrt();
                }
            }
        }

        let minimal = working.floyd_warshall();
        if !Self::is_consistent(&minimal) {
            return Err(AllocationError::NoSTPSolution);
        }
        working.update_edges(minimal);
        Ok(working)
    }

    /// Inserts a task's three timepoints at `position` within `ordering`
    /// (the existing sequence of task ids by `start` time), wiring the
    /// intra-task `start->pickup` (travel) and `pickup->delivery` (work)
    /// edges plus the inter-task travel edge from whatever now precedes
    /// it (the previous task's delivery, or `NodeId::Zero` at position 0).
    pub fn insert_task_at(
        &mut self,
        position: usize,
        ordering: &[TaskId],
        task: &domain::Task,
        travel_from_predecessor: (f64, f64),
    ) {
        let predecessor = if position == 0 {
            NodeId::Zero
        } else {
            NodeId::delivery(ordering[position - 1])
        };

        let start = NodeId::start(task.task_id);
        let pickup = NodeId::pickup(task.task_id);
        let delivery = NodeId::delivery(task.task_id);

        let (travel_lb, travel_ub) = travel_from_predecessor;
        self.add_constraint(predecessor, start, travel_lb, travel_ub, false);

        self.add_constraint(
            start,
            pickup,
            task.earliest_pickup_time.min(task.travel_time.mean),
            task.travel_time.mean + task.travel_time.std_dev().max(0.0),
            true,
        );
        self.add_constraint(
            NodeId::Zero,
            pickup,
            task.earliest_pickup_time,
            task.latest_pickup_time,
            false,
        );
        self.add_constraint(
            pickup,
            delivery,
            task.work_time.mean,
            task.work_time.mean + task.work_time.std_dev().max(0.0),
            true,
        );

        if position < ordering.len() {
            let successor_start = NodeId::start(ordering[position]);
            // Predecessor link will be recomputed by the caller once the
            // successor's own travel edge is known (planner round-trip);
            // here we only ensure `delivery` precedes it causally.
            self.add_constraint(delivery, successor_start, 0.0, INF, false);
        }
    }

    /// Removes all three of a task's timepoints. The caller is
    /// responsible for re-wiring the predecessor/successor travel edge
    /// (see `Timetable::remove_task`, which knows the surrounding
    /// ordering and can ask the planner for the new edge).
    pub fn remove_task(&mut self, task_id: TaskId) -> Result<(), AllocationError> {
        if !self.has_task(task_id) {
            return Err(AllocationError::TaskNotFound(task_id));
        }
        let removed: Vec<NodeId> = vec![
            NodeId::start(task_id),
            NodeId::pickup(task_id),
            NodeId::delivery(task_id),
        ];
        let keep: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|n| !removed.contains(n))
            .collect();

        let mut rebuilt = TemporalNetwork::new();
        for &node in keep.iter().filter(|n| **n != NodeId::Zero) {
            rebuilt.node_index(node);
        }
        for (a_pos, &a) in keep.iter().enumerate() {
            for &b in keep.iter().skip(a_pos) {
                if a == b {
                    continue;
                }
                let ai = self.index[&a];
                let bi = self.index[&b];
                let ub = self.dist[ai][bi];
                let lb = -self.dist[bi][ai];
                if ub < INF {
                    rebuilt.add_constraint(a, b, lb, ub, self.contingent.contains(&(ai, bi)));
                }
            }
        }
        *self = rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Task, WorkEstimate};

    fn task(earliest: f64, latest: f64, work_mean: f64) -> Task {
        Task::new(
            "A",
            "B",
            earliest,
            latest,
            WorkEstimate::new(work_mean, 1.0),
        )
    }

    #[test]
    fn empty_network_is_consistent() {
        let net = TemporalNetwork::new();
        let minimal = net.floyd_warshall();
        assert!(TemporalNetwork::is_consistent(&minimal));
    }

    #[test]
    fn single_task_insertion_is_consistent() {
        let mut net = TemporalNetwork::new();
        let t = task(100.0, 200.0, 60.0);
        net.insert_task_at(0, &[], &t, (0.0, 50.0));

        let minimal = net.floyd_warshall();
        assert!(TemporalNetwork::is_consistent(&minimal));
    }

    #[test]
    fn assign_timepoint_outside_window_fails_without_force() {
        let mut net = TemporalNetwork::new();
        let t = task(100.0, 200.0, 60.0);
        net.insert_task_at(0, &[], &t, (0.0, 50.0));

        let err = net
            .assign_timepoint(9_999.0, t.task_id, TimepointKind::Pickup, false)
            .unwrap_err();
        assert_eq!(err, AllocationError::NoSTPSolution);
    }

    #[test]
    fn assign_timepoint_inside_window_succeeds() {
        let mut net = TemporalNetwork::new();
        let t = task(100.0, 200.0, 60.0);
        net.insert_task_at(0, &[], &t, (0.0, 50.0));

        net.assign_timepoint(150.0, t.task_id, TimepointKind::Pickup, false)
            .unwrap();
        let time = net
            .get_time(t.task_id, TimepointKind::Pickup, true)
            .unwrap();
        assert_eq!(time, 150.0);
    }

    #[test]
    fn remove_task_drops_its_nodes() {
        let mut net = TemporalNetwork::new();
        let t = task(100.0, 200.0, 60.0);
        net.insert_task_at(0, &[], &t, (0.0, 50.0));
        assert!(net.has_task(t.task_id));

        net.remove_task(t.task_id).unwrap();
        assert!(!net.has_task(t.task_id));
    }

    #[test]
    fn remove_unknown_task_errors() {
        let mut net = TemporalNetwork::new();
        let missing = TaskId::new();
        let err = net.remove_task(missing).unwrap_err();
        assert_eq!(err, AllocationError::TaskNotFound(missing));
    }

    #[test]
    fn compute_dispatchable_graph_rejects_negative_cycle() {
        let mut net = TemporalNetwork::new();
        let t = task(100.0, 200.0, 60.0);
        net.insert_task_at(0, &[], &t, (0.0, 50.0));
        // Force an inconsistency: pickup must be both before and after
        // itself relative to zero by an impossible margin.
        net.add_constraint(NodeId::pickup(t.task_id), NodeId::Zero, 10_000.0, INF, false);

        let result = net.compute_dispatchable_graph(None);
        assert!(result.is_err());
    }
}
