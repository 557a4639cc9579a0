pub mod gemini;

pub use gemini::{GeminiClient, GeminiSettings};

use async_trait::async_trait;

use crate::state::ConversationTurn;

/// Which apology the learner sees when a reply can't be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The API answered but gave us nothing to show
    EmptyResponse,
    /// The call or its decoding blew up
    Exception,
}

pub const EMPTY_RESPONSE_APOLOGY: &str = "Oh dear! It seems I'm having trouble connecting right now. Please check your API key and try again, or come back a bit later!";
pub const EXCEPTION_APOLOGY: &str = "Oops! My apologies, something went wrong while I was thinking. Could you please try asking again?";

/// Errors produced while asking the model for a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No API key was configured.
    #[error("no API key configured (set GOOGLE_API_KEY)")]
    MissingApiKey,

    /// The HTTP request failed before a body was read.
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body was not valid JSON.
    #[error("response parse failed: {0}")]
    Decode(String),

    /// The response was well formed but held no candidates.
    #[error("response contained no candidates")]
    NoCandidates { body: String },

    /// The first candidate had no text part.
    #[error("first candidate has no text part")]
    MalformedCandidate,
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingApiKey | Self::NoCandidates { .. } => FailureKind::EmptyResponse,
            Self::Transport(_) | Self::Decode(_) | Self::MalformedCandidate => FailureKind::Exception,
        }
    }

    /// The fixed message shown in place of a reply
    pub fn apology(&self) -> &'static str {
        match self.kind() {
            FailureKind::EmptyResponse => EMPTY_RESPONSE_APOLOGY,
            FailureKind::Exception => EXCEPTION_APOLOGY,
        }
    }
}

/// Something that turns a conversation into the model's next reply.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate a reply for `contents`, which already carries the system
    /// instruction, prior history and the new message.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the request fails or the response holds no usable text.
    async fn generate(&self, contents: &[ConversationTurn]) -> Result<String, DispatchError>;

    /// Model name, for display
    fn model(&self) -> &str;
}
