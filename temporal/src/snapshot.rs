//! `TemporalNetwork` keys its internal index by `NodeId`, which does not
//! serialize as a JSON object key. `NetworkSnapshot` is the wire/storage
//! form: plain vectors that round-trip through `serde_json` for the
//! `DGRAPH-UPDATE` message payload and for the sqlite-backed timetable
//! store.

use serde::{Deserialize, Serialize};

use crate::network::TemporalNetwork;
use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeId>,
    pub dist: Vec<Vec<f64>>,
    pub contingent: Vec<(usize, usize)>,
}

impl From<&TemporalNetwork> for NetworkSnapshot {
    fn from(net: &TemporalNetwork) -> Self {
        Self {
            nodes: net.nodes().to_vec(),
            dist: net.raw_dist().to_vec(),
            contingent: net.raw_contingent().iter().copied().collect(),
        }
    }
}

impl From<NetworkSnapshot> for TemporalNetwork {
    fn from(snap: NetworkSnapshot) -> Self {
        TemporalNetwork::from_parts(snap.nodes, snap.dist, snap.contingent.into_iter().collect())
    }
}
