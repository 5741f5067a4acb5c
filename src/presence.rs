use crate::message::{ChatMessage, MessageKind};

/// Per-room list of usernames currently considered active, in first-seen
/// order. Membership is inferred from traffic, not pushed authoritatively:
/// any message adds its sender, a status message whose text contains the
/// token "left" removes them. Fragile on purpose (a status that merely
/// mentions "left" evicts the sender) — the deployed clients depend on this
/// exact rule.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    users: Vec<String>,
}

impl Roster {
    pub fn new() -> Self {
        Roster { users: Vec::new() }
    }

    /// Updates the roster from one observed message. Idempotent for
    /// already-present senders; removing an absent username is a no-op.
    pub fn observe(&mut self, msg: &ChatMessage) {
        if !self.users.iter().any(|u| u == &msg.username) {
            self.users.push(msg.username.clone());
        }

        if msg.kind == MessageKind::Status
            && msg.content.split_whitespace().any(|token| token == "left")
        {
            self.users.retain(|u| u != &msg.username);
        }
    }

    pub fn insert(&mut self, username: &str) {
        if !self.users.iter().any(|u| u == username) {
            self.users.push(username.to_string());
        }
    }

    pub fn remove(&mut self, username: &str) {
        self.users.retain(|u| u != username);
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|u| u == username)
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, Sender};

    fn msg(username: &str, kind: MessageKind, content: &str) -> ChatMessage {
        let sender = Sender {
            id: "1".to_string(),
            username: username.to_string(),
            avatar: String::new(),
        };
        ChatMessage::build(content, kind, &sender, "generalmain")
    }

    #[test]
    fn any_message_registers_first_contact() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Message, "hi"));
        assert_eq!(roster.users(), ["ada"]);

        roster.observe(&msg("bob", MessageKind::Image, "data:image/png;base64,"));
        assert_eq!(roster.users(), ["ada", "bob"]);
    }

    #[test]
    fn repeated_messages_do_not_duplicate() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Message, "one"));
        roster.observe(&msg("ada", MessageKind::Message, "two"));
        roster.observe(&msg("ada", MessageKind::Status, "UPDATE: ada joined the channel"));
        assert_eq!(roster.users(), ["ada"]);
    }

    #[test]
    fn left_status_removes_the_sender() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Message, "hi"));
        roster.observe(&msg("bob", MessageKind::Message, "hey"));
        roster.observe(&msg("bob", MessageKind::Status, "UPDATE: bob left the channel"));
        assert_eq!(roster.users(), ["ada"]);
    }

    #[test]
    fn left_from_unknown_sender_leaves_no_residue() {
        let mut roster = Roster::new();
        roster.observe(&msg("ghost", MessageKind::Status, "UPDATE: ghost left the channel"));
        assert!(roster.is_empty());
    }

    #[test]
    fn left_token_in_plain_messages_is_ignored() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Message, "I left my keys at home"));
        assert_eq!(roster.users(), ["ada"]);
    }

    #[test]
    fn left_matches_whole_tokens_only() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Status, "UPDATE: ada leftish nonsense"));
        assert_eq!(roster.users(), ["ada"]);
    }

    #[test]
    fn join_then_leave_restores_prior_state() {
        let mut roster = Roster::new();
        roster.observe(&msg("ada", MessageKind::Message, "hi"));
        let before = roster.users().to_vec();

        roster.observe(&msg("bob", MessageKind::Status, "UPDATE: bob joined the channel"));
        roster.observe(&msg("bob", MessageKind::Status, "UPDATE: bob left the channel"));
        assert_eq!(roster.users(), before.as_slice());
    }
}
