use chrono::{Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Identity a session sends messages as. Resolved by the directory before
/// the socket opens; the chat core never looks inside the strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Status,
    Message,
    Image,
}

/// One chat event on the wire. Field names match what the browser client
/// serializes; changing them breaks deployed clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub time: String,
    pub from: String,
    pub username: String,
    pub room: String,
    pub avatar: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Builds a message stamped with the current local wall-clock time.
    /// Content is taken as-is; empty-text rejection happens at compose time,
    /// not here.
    pub fn build(content: impl Into<String>, kind: MessageKind, sender: &Sender, room: &str) -> Self {
        ChatMessage {
            content: content.into(),
            time: clock_label(Local::now().time()),
            from: sender.id.clone(),
            username: sender.username.clone(),
            room: room.to_string(),
            avatar: sender.avatar.clone(),
            kind,
        }
    }

    pub fn joined(sender: &Sender, room: &str) -> Self {
        Self::build(
            format!("UPDATE: {} joined the channel", sender.username),
            MessageKind::Status,
            sender,
            room,
        )
    }

    pub fn left(sender: &Sender, room: &str) -> Self {
        Self::build(
            format!("UPDATE: {} left the channel", sender.username),
            MessageKind::Status,
            sender,
            room,
        )
    }
}

/// `HH:MM`, zero-padded, 24-hour.
pub fn clock_label(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join-room")]
    JoinRoom(ChatMessage),
    #[serde(rename = "leave-room")]
    LeaveRoom(ChatMessage),
    #[serde(rename = "message")]
    Message(ChatMessage),
    #[serde(rename = "imageMessage")]
    ImageMessage(ChatMessage),
}

impl ClientEvent {
    pub fn message(&self) -> &ChatMessage {
        match self {
            ClientEvent::JoinRoom(m)
            | ClientEvent::LeaveRoom(m)
            | ClientEvent::Message(m)
            | ClientEvent::ImageMessage(m) => m,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receive-msg")]
    ReceiveMsg(ChatMessage),
}
