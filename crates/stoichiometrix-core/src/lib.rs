pub mod ai;
pub mod config;
pub mod dispatch;
pub mod prompt;
pub mod script;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::{DispatchError, FailureKind, GeminiClient, GeminiSettings, ModelBackend};
pub use config::Config;
pub use session::{Button, MessageBody, RemoteRequest, RenderCommand, Sender, Session, SessionEvent, Step};
pub use state::{ConversationTurn, History, Role, UserProfile};
