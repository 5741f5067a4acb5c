use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use warp::ws::Message;

use crate::message::{ChatMessage, ClientEvent, Sender, ServerEvent};
use crate::registry::{RoomRegistry, Subscriber};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Joining,
    Active,
    Leaving,
    Disconnected,
}

/// Drives one connection through join, active chat, and leave. A session
/// binds to exactly one room at join time and keeps that binding until it
/// disconnects; there is no rejoin or resume.
pub struct Session {
    conn_id: String,
    state: SessionState,
    registry: RoomRegistry,
    queue: mpsc::Sender<Message>,
    shutdown: Option<oneshot::Sender<()>>,
    sender: Option<Sender>,
    room: Option<String>,
}

impl Session {
    pub fn new(
        conn_id: String,
        registry: RoomRegistry,
        queue: mpsc::Sender<Message>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Session {
            conn_id,
            state: SessionState::Joining,
            registry,
            queue,
            shutdown: Some(shutdown),
            sender: None,
            room: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        match (self.state, event) {
            (SessionState::Joining, ClientEvent::JoinRoom(msg)) => self.join(msg).await,
            (SessionState::Active, ClientEvent::Message(msg) | ClientEvent::ImageMessage(msg)) => {
                self.forward(msg).await;
            }
            (SessionState::Active, ClientEvent::LeaveRoom(msg)) => self.leave(Some(msg)).await,
            (state, event) => {
                warn!(
                    "{}: ignoring {} event in {state:?} state",
                    self.conn_id,
                    event_name(&event)
                );
            }
        }
    }

    /// Transport teardown without an explicit leave-room. Synthesizes the
    /// departure announcement from the join context so the rest of the room
    /// still observes the leave.
    pub async fn disconnected(&mut self) {
        if self.state == SessionState::Active {
            self.leave(None).await;
        }
        self.state = SessionState::Disconnected;
    }

    async fn join(&mut self, msg: ChatMessage) {
        let room = msg.room.clone();
        self.sender = Some(Sender {
            id: msg.from.clone(),
            username: msg.username.clone(),
            avatar: msg.avatar.clone(),
        });
        self.room = Some(room.clone());

        let subscriber = Subscriber::new(self.queue.clone(), self.shutdown.take());
        self.registry.join(&room, &self.conn_id, subscriber).await;
        self.registry
            .broadcast(&room, &ServerEvent::ReceiveMsg(msg), Some(&self.conn_id))
            .await;

        self.state = SessionState::Active;
        info!("{}: joined room {room}", self.conn_id);
    }

    async fn forward(&mut self, msg: ChatMessage) {
        // Delivery always targets the bound room, whatever the payload says.
        let Some(room) = self.room.as_deref() else {
            return;
        };
        if msg.room != room {
            debug!("{}: payload room {} differs from bound room {room}", self.conn_id, msg.room);
        }
        self.registry
            .broadcast(room, &ServerEvent::ReceiveMsg(msg), Some(&self.conn_id))
            .await;
    }

    async fn leave(&mut self, announcement: Option<ChatMessage>) {
        self.state = SessionState::Leaving;

        if let (Some(room), Some(sender)) = (self.room.clone(), self.sender.clone()) {
            let msg = announcement.unwrap_or_else(|| ChatMessage::left(&sender, &room));
            self.registry
                .broadcast(&room, &ServerEvent::ReceiveMsg(msg), Some(&self.conn_id))
                .await;
            self.registry.leave(&room, &self.conn_id).await;
            info!("{}: left room {room}", self.conn_id);
        }

        self.state = SessionState::Disconnected;
    }
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::JoinRoom(_) => "join-room",
        ClientEvent::LeaveRoom(_) => "leave-room",
        ClientEvent::Message(_) => "message",
        ClientEvent::ImageMessage(_) => "imageMessage",
    }
}
