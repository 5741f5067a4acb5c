use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::RwLock;
use warp::ws::Message;

use crate::message::ServerEvent;

/// Outbound queue capacity per subscriber. A subscriber whose queue is full
/// is disconnected rather than allowed to stall or buffer without bound.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// What the registry holds per subscriber: the outbound frame queue, plus a
/// trigger that tells the owning connection task to tear the transport down.
/// The trigger fires on eviction and resolves (as a drop) on ordinary leave,
/// so a removed subscriber never lingers half-open.
pub struct Subscriber {
    queue: mpsc::Sender<Message>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Subscriber {
    #[must_use]
    pub fn new(queue: mpsc::Sender<Message>, shutdown: Option<oneshot::Sender<()>>) -> Self {
        Subscriber { queue, shutdown }
    }

    fn disconnect(mut self) {
        if let Some(trigger) = self.shutdown.take() {
            let _ = trigger.send(());
        }
    }
}

type Subscribers = HashMap<String, Subscriber>;

/// Maps a room identifier to its current subscriber set. Rooms are created
/// lazily on first join and removed when the last subscriber leaves.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Subscribers>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        RoomRegistry {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a connection's subscriber handle under the room. No
    /// admission control: any connection may join any room identifier.
    pub async fn join(&self, room_id: &str, conn_id: &str, subscriber: Subscriber) {
        let mut rooms = self.rooms.write().await;
        let subscribers = rooms.entry(room_id.to_string()).or_default();
        subscribers.insert(conn_id.to_string(), subscriber);
        debug!("{conn_id} joined room {room_id} ({} subscribers)", subscribers.len());
    }

    /// Removes a connection from the room. Leaving a room the connection was
    /// never in is a no-op. The room entry itself is dropped once empty.
    pub async fn leave(&self, room_id: &str, conn_id: &str) {
        self.remove(room_id, conn_id).await;
    }

    async fn remove(&self, room_id: &str, conn_id: &str) -> Option<Subscriber> {
        let mut rooms = self.rooms.write().await;
        let (removed, emptied) = match rooms.get_mut(room_id) {
            Some(subscribers) => {
                let removed = subscribers.remove(conn_id);
                (removed, subscribers.is_empty())
            }
            None => (None, false),
        };
        if emptied {
            rooms.remove(room_id);
            debug!("room {room_id} removed (empty)");
        }
        removed
    }

    /// Delivers the event to every current subscriber of the room, skipping
    /// `exclude`. Each delivery is an independent non-blocking push into that
    /// subscriber's queue; a full or closed queue evicts the subscriber and
    /// fires its shutdown trigger, so a slow consumer is disconnected instead
    /// of stalling the rest of the room.
    pub async fn broadcast(&self, room_id: &str, event: &ServerEvent, exclude: Option<&str>) {
        let Ok(text) = serde_json::to_string(event) else {
            return;
        };

        let mut evicted = Vec::new();
        {
            let rooms = self.rooms.read().await;
            let Some(subscribers) = rooms.get(room_id) else {
                return;
            };

            for (conn_id, subscriber) in subscribers {
                if exclude == Some(conn_id.as_str()) {
                    continue;
                }
                match subscriber.queue.try_send(Message::text(text.clone())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("outbound queue full for {conn_id}, disconnecting");
                        evicted.push(conn_id.clone());
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        evicted.push(conn_id.clone());
                    }
                }
            }
        }

        for conn_id in evicted {
            if let Some(subscriber) = self.remove(room_id, &conn_id).await {
                subscriber.disconnect();
            }
        }
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map_or(0, HashMap::len)
    }
}
