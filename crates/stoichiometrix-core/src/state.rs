//! UI-agnostic conversation state types
//!
//! This module contains data structures that are shared between the session
//! logic and any UI that renders it, and don't depend on a specific UI framework.

use serde::{Deserialize, Serialize};

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Who sent a turn, using the wire names the Gemini API expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Append-only conversation history, in send order
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}

/// Case-insensitive check for any turn whose text contains `phrase`
pub fn mentions(turns: &[ConversationTurn], phrase: &str) -> bool {
    let needle = phrase.to_lowercase();
    turns
        .iter()
        .any(|turn| turn.text.to_lowercase().contains(&needle))
}

/// Like [`mentions`], restricted to turns sent by the learner
pub fn learner_sent(turns: &[ConversationTurn], phrase: &str) -> bool {
    let needle = phrase.to_lowercase();
    turns
        .iter()
        .filter(|turn| turn.role == Role::User)
        .any(|turn| turn.text.to_lowercase().contains(&needle))
}

/// Learner details collected by the welcome form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub nickname: String,
    pub age: String,
}

impl UserProfile {
    /// Build a profile from raw form input. Both fields are trimmed and must be non-empty.
    pub fn from_form(nickname: &str, age: &str) -> Option<Self> {
        let nickname = nickname.trim();
        let age = age.trim();
        if nickname.is_empty() || age.is_empty() {
            return None;
        }
        Some(Self {
            nickname: nickname.to_string(),
            age: age.to_string(),
        })
    }
}
