//! Transcript: an ordered, append-only list of messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, MessageKind, PromptMessage};

/// An ordered sequence of conversation turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique transcript ID
    pub id: String,

    messages: Vec<Message>,

    /// When this transcript was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// A snapshot of every message, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages of one kind, in order.
    pub fn of_kind(&self, kind: MessageKind) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.kind() == kind).collect()
    }

    /// The last `n` messages (all of them if there are fewer).
    pub fn last(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Drop the oldest turns so at most `max` non-system messages remain.
    ///
    /// The first system message, if any, is always kept in front.
    pub fn keep_last(&mut self, max: usize) {
        let system = self
            .messages
            .iter()
            .position(|m| m.kind() == MessageKind::System)
            .map(|idx| self.messages.remove(idx));

        let excess = self.messages.len().saturating_sub(max);
        self.messages.drain(..excess);

        if let Some(system) = system {
            self.messages.insert(0, system);
        }
    }

    /// Project every message to its wire form.
    pub fn to_prompt_format(&self) -> Vec<PromptMessage> {
        crate::message::to_prompt_format(&self.messages)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        let mut transcript = Self::new();
        transcript.messages = messages;
        transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_tracks_updates() {
        let mut t = Transcript::new();
        let created = t.created_at;

        t.push(Message::human("First message"));
        assert_eq!(t.len(), 1);
        assert!(t.updated_at >= created);
    }

    #[test]
    fn filter_by_kind() {
        let t = Transcript::from(vec![
            Message::system("sys"),
            Message::human("a"),
            Message::assistant("b"),
            Message::human("c"),
        ]);
        let humans: Vec<_> = t.of_kind(MessageKind::Human).iter().map(|m| m.content()).collect();
        assert_eq!(humans, ["a", "c"]);
    }

    #[test]
    fn last_n_window() {
        let t = Transcript::from(vec![Message::human("1"), Message::assistant("2"), Message::human("3")]);
        assert_eq!(t.last(2).len(), 2);
        assert_eq!(t.last(2)[0].content(), "2");
        assert_eq!(t.last(10).len(), 3);
    }

    #[test]
    fn keep_last_preserves_system() {
        let mut t = Transcript::new();
        t.push(Message::system("System msg (always kept)"));
        for i in 1..=5 {
            t.push(Message::human(format!("Message {i}")));
        }
        t.keep_last(3);

        let contents: Vec<_> = t.messages().iter().map(|m| m.content()).collect();
        assert_eq!(
            contents,
            ["System msg (always kept)", "Message 3", "Message 4", "Message 5"]
        );
    }

    #[test]
    fn keep_last_without_system() {
        let mut t = Transcript::from(vec![Message::human("a"), Message::human("b")]);
        t.keep_last(1);
        assert_eq!(t.messages()[0].content(), "b");
    }
}
