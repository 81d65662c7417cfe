//! In-process pub/sub + direct whisper transport.
//!
//! Grounded on `MarketManager`'s `HashMap<Pair, Vec<Sender<MarketMetrics>>>`
//! subscriber map, generalized from one key type (`Pair`) to two concerns
//! (named groups for broadcast, peer ids for direct delivery). The real
//! cross-process transport middleware named in SPEC_FULL.md §1 is out of
//! scope; this is the one concrete implementation sufficient to run a
//! coordinator and its fleet of robot-proxy tasks in a single process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, warn};

use crate::envelope::Envelope;

const CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, group: &str, envelope: Envelope);
    async fn whisper(&self, peer: &str, envelope: Envelope);
    async fn subscribe(&self, group: &str) -> Receiver<Envelope>;
    async fn register_peer(&self, peer: &str) -> Receiver<Envelope>;
}

#[derive(Default)]
pub struct InProcessBus {
    groups: Arc<Mutex<HashMap<String, Vec<Sender<Envelope>>>>>,
    peers: Arc<Mutex<HashMap<String, Sender<Envelope>>>>,
}

impl InProcessBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish(&self, group: &str, envelope: Envelope) {
        let mut subs = self.groups.lock().await;
        let Some(senders) = subs.get_mut(group) else {
            debug!(group, "publish with no subscribers");
            return;
        };

        senders.retain(|tx| {
            match tx.try_send(envelope.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(group, "subscriber queue full; dropping message");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    async fn whisper(&self, peer: &str, envelope: Envelope) {
        let peers = self.peers.lock().await;
        match peers.get(peer) {
            Some(tx) => {
                if tx.send(envelope).await.is_err() {
                    warn!(peer, "whisper target channel closed");
                }
            }
            None => warn!(peer, "whisper target not registered"),
        }
    }

    async fn subscribe(&self, group: &str) -> Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.groups
            .lock()
            .await
            .entry(group.to_string())
            .or_default()
            .push(tx);
        rx
    }

    async fn register_peer(&self, peer: &str) -> Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.peers.lock().await.insert(peer.to_string(), tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::MessageType;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = InProcessBus::new();
        let mut a = bus.subscribe("g").await;
        let mut b = bus.subscribe("g").await;

        let env = Envelope::new(MessageType::StartTest, &serde_json::json!({"x": 1})).unwrap();
        bus.publish("g", env).await;

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn whisper_reaches_only_registered_peer() {
        let bus = InProcessBus::new();
        let mut r1 = bus.register_peer("r1").await;
        let _r2 = bus.register_peer("r2").await;

        let env = Envelope::new(MessageType::Task, &serde_json::json!({})).unwrap();
        bus.whisper("r1", env).await;

        assert!(r1.recv().await.is_some());
    }
}
