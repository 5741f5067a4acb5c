use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::message::{ChatMessage, ClientEvent, MessageKind, Sender, ServerEvent};
use crate::presence::Roster;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ComposeError {
    #[error("please enter some text to send")]
    EmptyMessage,
    #[error("no image staged")]
    NothingStaged,
}

/// Delivery state of a log entry. Outgoing messages are appended
/// speculatively as `Pending` and resolved once the transport send settles;
/// incoming ones are `Received`. An `Undelivered` entry stays in the log —
/// at-most-once, no retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Sent,
    Undelivered,
    Received,
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub message: ChatMessage,
    pub delivery: Delivery,
}

/// Client-side mirror of one channel: the local message log (append-only,
/// never trimmed), the local presence list, and the outgoing-image staging
/// slot. Produces [`ClientEvent`]s for the transport and consumes
/// [`ServerEvent`]s from it; it never touches the socket itself.
pub struct ChannelView {
    sender: Sender,
    room: String,
    log: Vec<LogEntry>,
    roster: Roster,
    staged_image: Option<String>,
}

impl ChannelView {
    /// The room identifier is the group name and channel name concatenated,
    /// exactly as the routing layer builds it.
    #[must_use]
    pub fn new(sender: Sender, group_name: &str, channel_name: &str) -> Self {
        ChannelView {
            sender,
            room: format!("{group_name}{channel_name}"),
            log: Vec::new(),
            roster: Roster::new(),
            staged_image: None,
        }
    }

    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Emitted on transport connect, before any user action. Adds the local
    /// user to the presence list optimistically; the announcement itself is
    /// not logged, matching what the other members see about themselves.
    pub fn join_event(&mut self) -> ClientEvent {
        self.roster.insert(&self.sender.username);
        ClientEvent::JoinRoom(ChatMessage::joined(&self.sender, &self.room))
    }

    /// Emitted on navigation away or teardown, right before disconnecting.
    pub fn leave_event(&mut self) -> ClientEvent {
        self.roster.remove(&self.sender.username);
        ClientEvent::LeaveRoom(ChatMessage::left(&self.sender, &self.room))
    }

    /// Builds a text message, appending it to the log as pending. Empty or
    /// whitespace-only text is rejected before any message is constructed.
    pub fn compose_text(&mut self, text: &str) -> Result<ClientEvent, ComposeError> {
        if text.trim().is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        let msg = ChatMessage::build(text, MessageKind::Message, &self.sender, &self.room);
        self.log.push(LogEntry {
            message: msg.clone(),
            delivery: Delivery::Pending,
        });
        Ok(ClientEvent::Message(msg))
    }

    /// Stages an image read fully into memory, encoded as a data URI. At
    /// most one image is held between selection and send; restaging
    /// replaces the previous selection.
    pub fn stage_image(&mut self, mime_type: &str, bytes: &[u8]) {
        self.staged_image = Some(format!("data:{mime_type};base64,{}", BASE64.encode(bytes)));
    }

    #[must_use]
    pub fn staged_image(&self) -> Option<&str> {
        self.staged_image.as_deref()
    }

    /// Builds an image message from the staging slot and clears it. The log
    /// entry is appended pending, like text.
    pub fn send_staged_image(&mut self) -> Result<ClientEvent, ComposeError> {
        let data_uri = self.staged_image.take().ok_or(ComposeError::NothingStaged)?;
        let msg = ChatMessage::build(data_uri, MessageKind::Image, &self.sender, &self.room);
        self.log.push(LogEntry {
            message: msg.clone(),
            delivery: Delivery::Pending,
        });
        Ok(ClientEvent::ImageMessage(msg))
    }

    /// Resolves the oldest pending entry after the transport send settles.
    /// Sends resolve in emission order, so oldest-first matches the wire.
    pub fn resolve_pending(&mut self, delivery: Delivery) {
        if let Some(entry) = self
            .log
            .iter_mut()
            .find(|e| e.delivery == Delivery::Pending)
        {
            entry.delivery = delivery;
        }
    }

    /// Applies one received event: append to the log and update the local
    /// presence list from the message itself.
    pub fn receive(&mut self, event: ServerEvent) {
        let ServerEvent::ReceiveMsg(msg) = event;
        self.roster.observe(&msg);
        self.log.push(LogEntry {
            message: msg,
            delivery: Delivery::Received,
        });
    }

    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    #[must_use]
    pub fn active_users(&self) -> &[String] {
        self.roster.users()
    }
}
