use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of the copilot conversation. The timestamp is informational;
/// insertion order is the ordering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only conversation transcript.
///
/// The user turn is pushed optimistically before the external call resolves;
/// the model turn (or its failure placeholder) is pushed after settlement.
/// Turns are never edited or reordered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn::user(text));
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn::model(text));
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_appends_in_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("¿Dosis de paracetamol?");
        transcript.push_model("500 mg cada 8 horas.");
        transcript.push_user("¿Y en niños?");
        transcript.push_model("Ajustar por peso.");

        assert_eq!(transcript.len(), 4);
        let roles: Vec<ChatRole> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Model, ChatRole::User, ChatRole::Model]
        );
    }

    #[test]
    fn roles_serialize_lowercase() {
        let turn = ChatTurn::model("hola");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "model");
    }
}
