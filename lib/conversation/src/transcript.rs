//! The chat history of a run.

use odin_ai::{ChatMessage, MessageRole};
use serde::Serialize;

/// Append-only list of role-tagged turns.
///
/// The first turn is always the resolved system context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Starts a transcript with the given system context.
    #[must_use]
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system)],
        }
    }

    /// Appends a turn.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Returns all turns in order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Counts the turns with the given role.
    #[must_use]
    pub fn count_role(&self, role: MessageRole) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Returns the number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false; a transcript holds at least its system turn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consumes the transcript, returning its turns.
    #[must_use]
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_system_turn() {
        let transcript = Transcript::new("Be brief.");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, MessageRole::System);
        assert_eq!(
            transcript.messages()[0].content.as_deref(),
            Some("Be brief.")
        );
    }

    #[test]
    fn push_appends_in_order() {
        let mut transcript = Transcript::new("sys");
        transcript.push(ChatMessage::user("one"));
        transcript.push(ChatMessage::assistant("two"));

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.count_role(MessageRole::User), 1);
        assert_eq!(
            transcript.last().and_then(|m| m.content.as_deref()),
            Some("two")
        );
    }

    #[test]
    fn serializes_as_message_list() {
        let json = serde_json::to_value(Transcript::new("sys")).expect("serialize");
        assert_eq!(json, serde_json::json!([{ "role": "system", "content": "sys" }]));
    }
}
