use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The named groups and message types defined in SPEC_FULL.md §4.8. A
/// bare `String` would also work, but the fixed set gives subscribers a
/// table-driven dispatch point instead of string matching scattered
/// through the coordinator and robot binaries.
pub const GROUP_TASK_ALLOCATION: &str = "TASK-ALLOCATION";

/// Peer name the coordinator registers under for robots to whisper their
/// bids, no-bids, and contract acknowledgements to directly, instead of
/// broadcasting them to the whole `TASK-ALLOCATION` group.
pub const AUCTIONEER_PEER: &str = "auctioneer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum MessageType {
    TaskAnnouncement,
    Bid,
    NoBid,
    SoftBid,
    TaskContract,
    TaskContractAcknowledgement,
    Task,
    DgraphUpdate,
    TaskStatus,
    AssignmentUpdate,
    RemoveTaskFromSchedule,
    StartTest,
    FinishTest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub msg_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metamodel: String,
}

impl Header {
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            msg_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            metamodel: "ropod-msg-schema.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(msg_type: MessageType, payload: &T) -> anyhow::Result<Self> {
        Ok(Self {
            header: Header::new(msg_type),
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
