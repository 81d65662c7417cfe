pub mod network;
pub mod node;
pub mod snapshot;

pub use network::TemporalNetwork;
pub use node::{NodeId, TimepointKind};
pub use snapshot::NetworkSnapshot;
