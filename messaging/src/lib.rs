pub mod bus;
pub mod envelope;

pub use bus::{InProcessBus, MessageBus};
pub use envelope::{AUCTIONEER_PEER, Envelope, GROUP_TASK_ALLOCATION, Header, MessageType};
