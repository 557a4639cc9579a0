//! Remote dispatch: run a session's outstanding request against a model backend.

use crate::ai::{FailureKind, ModelBackend};
use crate::session::{RemoteRequest, RenderCommand, Session, SessionEvent};

/// Ask the backend for a reply and turn the outcome into the event the session expects.
///
/// Exactly one attempt is made. Failures are logged here and handed back as
/// [`SessionEvent::RemoteFailed`]; nothing propagates past this call.
pub async fn dispatch(backend: &dyn ModelBackend, request: RemoteRequest) -> SessionEvent {
    match backend.generate(&request.contents).await {
        Ok(reply) => SessionEvent::RemoteReplyReceived(reply),
        Err(err) => {
            match err.kind() {
                FailureKind::EmptyResponse => {
                    tracing::error!(error = %err, model = backend.model(), "AI response error");
                }
                FailureKind::Exception => {
                    tracing::error!(error = %err, model = backend.model(), "error connecting to Gemini API");
                }
            }
            SessionEvent::RemoteFailed(err)
        }
    }
}

/// Handle `event` and, if it starts a request, wait for the reply and handle that too.
///
/// Returns every render command produced, in order.
pub async fn run(
    session: &mut Session,
    backend: &dyn ModelBackend,
    event: SessionEvent,
) -> Vec<RenderCommand> {
    let step = session.handle(event);
    let mut commands = step.commands;

    if let Some(request) = step.request {
        let outcome = dispatch(backend, request).await;
        commands.extend(session.handle(outcome).commands);
    }

    commands
}
