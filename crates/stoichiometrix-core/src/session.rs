//! Message-driven chat session.
//!
//! A [`Session`] owns everything one open widget needs: the learner profile, the
//! conversation history, widget visibility and the outstanding request. UIs feed
//! it [`SessionEvent`]s and draw the [`RenderCommand`]s it hands back; when a step
//! carries a [`RemoteRequest`], the caller runs it (see [`crate::dispatch`]) and
//! feeds the outcome back in as another event.

use crate::ai::DispatchError;
use crate::prompt;
use crate::script;
use crate::state::{ConversationTurn, History, UserProfile};

pub const PROFILE_ALERT: &str = "Please enter your nickname and age.";

const STARTER_BUTTONS: [&str; 2] = ["Let's get started!", "What is stoichiometry?"];

pub fn greeting(nickname: &str) -> String {
    format!("Hello {nickname}, your Stoichiometry Buddy is ready! How can I help you today?")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub value: String,
}

impl Button {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Buttons(Vec<Button>),
}

/// Something the UI should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCommand {
    /// Show the chat container and hide the bubble
    OpenContainer,
    /// Hide the chat container and show the bubble
    CloseContainer,
    ClearWelcomeInputs,
    HideWelcome,
    /// Blocking notice the learner must dismiss
    Alert(String),
    Append { sender: Sender, body: MessageBody },
    ShowTyping,
    RemoveTyping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    BubbleClicked,
    CloseClicked,
    StartLearning { nickname: String, age: String },
    UserSent(String),
    ButtonPressed(String),
    RemoteReplyReceived(String),
    RemoteFailed(DispatchError),
}

/// Contents to send to the model for the outstanding user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub contents: Vec<ConversationTurn>,
}

/// Result of handling one event
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub commands: Vec<RenderCommand>,
    pub request: Option<RemoteRequest>,
}

impl Step {
    fn commands(commands: Vec<RenderCommand>) -> Self {
        Self {
            commands,
            request: None,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    profile: Option<UserProfile>,
    history: History,
    container_open: bool,
    welcome_visible: bool,
    // index into history of the user turn awaiting a reply
    in_flight: Option<usize>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            profile: None,
            history: History::new(),
            container_open: false,
            welcome_visible: true,
            in_flight: None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_open(&self) -> bool {
        self.container_open
    }

    pub fn welcome_visible(&self) -> bool {
        self.welcome_visible
    }

    /// A request is outstanding; new sends are rejected until it resolves
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Step {
        match event {
            SessionEvent::BubbleClicked => self.open(),
            SessionEvent::CloseClicked => {
                self.container_open = false;
                Step::commands(vec![RenderCommand::CloseContainer])
            }
            SessionEvent::StartLearning { nickname, age } => self.start_learning(&nickname, &age),
            SessionEvent::UserSent(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Step::default();
                }
                self.send(text)
            }
            SessionEvent::ButtonPressed(value) => self.send(&value),
            SessionEvent::RemoteReplyReceived(reply) => self.reply_received(reply),
            SessionEvent::RemoteFailed(err) => self.failed(&err),
        }
    }

    fn open(&mut self) -> Step {
        self.container_open = true;
        let mut commands = vec![RenderCommand::OpenContainer];
        if self.welcome_visible {
            commands.push(RenderCommand::ClearWelcomeInputs);
        }
        Step::commands(commands)
    }

    fn start_learning(&mut self, nickname: &str, age: &str) -> Step {
        let Some(profile) = UserProfile::from_form(nickname, age) else {
            return Step::commands(vec![RenderCommand::Alert(PROFILE_ALERT.to_string())]);
        };

        tracing::info!(nickname = %profile.nickname, age = %profile.age, "learner started a session");

        let hello = greeting(&profile.nickname);
        self.profile = Some(profile);
        self.welcome_visible = false;

        let mut commands = vec![RenderCommand::HideWelcome];
        self.push_bot_text(&mut commands, hello);
        commands.push(bot_buttons(
            STARTER_BUTTONS.iter().map(|&text| Button::new(text, text)).collect(),
        ));
        Step::commands(commands)
    }

    fn send(&mut self, text: &str) -> Step {
        if self.in_flight.is_some() {
            tracing::debug!(message = %text, "send rejected while a reply is pending");
            return Step::default();
        }

        let contents = prompt::build_contents(self.profile.as_ref(), self.history.turns(), text);

        self.in_flight = Some(self.history.len());
        self.history.push(ConversationTurn::user(text));

        Step {
            commands: vec![
                RenderCommand::Append {
                    sender: Sender::User,
                    body: MessageBody::Text(text.to_string()),
                },
                RenderCommand::ShowTyping,
            ],
            request: Some(RemoteRequest { contents }),
        }
    }

    fn reply_received(&mut self, reply: String) -> Step {
        let Some(idx) = self.in_flight.take() else {
            tracing::debug!("dropping reply with no pending request");
            return Step::default();
        };

        let mut commands = vec![RenderCommand::RemoveTyping];

        let rule = {
            let turns = self.history.turns();
            script::match_rule(&turns[idx].text, &turns[..idx])
        };
        match rule {
            Some(rule) => {
                self.push_bot_text(&mut commands, rule.reply.to_string());
                if !rule.buttons.is_empty() {
                    commands.push(bot_buttons(
                        rule.buttons
                            .iter()
                            .map(|b| Button::new(b.label, b.value))
                            .collect(),
                    ));
                }
            }
            None => self.push_bot_text(&mut commands, reply),
        }

        Step::commands(commands)
    }

    fn failed(&mut self, err: &DispatchError) -> Step {
        if self.in_flight.take().is_none() {
            tracing::debug!(error = %err, "dropping failure with no pending request");
            return Step::default();
        }

        let mut commands = vec![RenderCommand::RemoveTyping];
        self.push_bot_text(&mut commands, err.apology().to_string());
        Step::commands(commands)
    }

    fn push_bot_text(&mut self, commands: &mut Vec<RenderCommand>, text: String) {
        self.history.push(ConversationTurn::model(text.clone()));
        commands.push(RenderCommand::Append {
            sender: Sender::Bot,
            body: MessageBody::Text(text),
        });
    }
}

// Button groups are shown but never recorded in history
fn bot_buttons(buttons: Vec<Button>) -> RenderCommand {
    RenderCommand::Append {
        sender: Sender::Bot,
        body: MessageBody::Buttons(buttons),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{EMPTY_RESPONSE_APOLOGY, EXCEPTION_APOLOGY};
    use crate::state::Role;

    fn started() -> Session {
        let mut session = Session::new();
        session.handle(SessionEvent::StartLearning {
            nickname: "Ana".into(),
            age: "15".into(),
        });
        session
    }

    fn bot_text(text: &str) -> RenderCommand {
        RenderCommand::Append {
            sender: Sender::Bot,
            body: MessageBody::Text(text.to_string()),
        }
    }

    #[test]
    fn opening_clears_welcome_inputs_only_while_welcome_shows() {
        let mut session = Session::new();
        assert!(!session.is_open());
        let step = session.handle(SessionEvent::BubbleClicked);
        assert_eq!(
            step.commands,
            vec![RenderCommand::OpenContainer, RenderCommand::ClearWelcomeInputs]
        );
        assert!(session.is_open());

        session.handle(SessionEvent::StartLearning {
            nickname: "Ana".into(),
            age: "15".into(),
        });
        session.handle(SessionEvent::CloseClicked);
        assert!(!session.is_open());

        let step = session.handle(SessionEvent::BubbleClicked);
        assert_eq!(step.commands, vec![RenderCommand::OpenContainer]);
    }

    #[test]
    fn start_learning_rejects_blank_fields() {
        let mut session = Session::new();
        for (nickname, age) in [("", "15"), ("Ana", ""), ("  ", "  ")] {
            let step = session.handle(SessionEvent::StartLearning {
                nickname: nickname.into(),
                age: age.into(),
            });
            assert_eq!(step.commands, vec![RenderCommand::Alert(PROFILE_ALERT.into())]);
            assert!(session.welcome_visible());
            assert!(session.profile().is_none());
        }
        assert!(session.history().is_empty());
    }

    #[test]
    fn start_learning_greets_with_two_messages() {
        let mut session = Session::new();
        let step = session.handle(SessionEvent::StartLearning {
            nickname: " Ana ".into(),
            age: "15".into(),
        });

        assert!(!session.welcome_visible());
        assert_eq!(step.commands[0], RenderCommand::HideWelcome);

        let appended: Vec<&RenderCommand> = step
            .commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Append { .. }))
            .collect();
        assert_eq!(appended.len(), 2);
        assert_eq!(
            appended[0],
            &bot_text("Hello Ana, your Stoichiometry Buddy is ready! How can I help you today?")
        );
        assert_eq!(
            appended[1],
            &RenderCommand::Append {
                sender: Sender::Bot,
                body: MessageBody::Buttons(vec![
                    Button::new("Let's get started!", "Let's get started!"),
                    Button::new("What is stoichiometry?", "What is stoichiometry?"),
                ]),
            }
        );

        // Only the greeting text is kept as context
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn send_builds_request_from_prior_history() {
        let mut session = started();
        let step = session.handle(SessionEvent::UserSent("  What is a mole? ".into()));

        assert_eq!(
            step.commands,
            vec![
                RenderCommand::Append {
                    sender: Sender::User,
                    body: MessageBody::Text("What is a mole?".into()),
                },
                RenderCommand::ShowTyping,
            ]
        );

        let request = step.request.unwrap();
        // instruction, ack, greeting, new message
        assert_eq!(request.contents.len(), 4);
        assert!(request.contents[0].text.contains("nickname is Ana and age is 15"));
        assert_eq!(request.contents[3], ConversationTurn::user("What is a mole?"));

        assert!(session.is_busy());
        assert_eq!(session.history().last().unwrap().role, Role::User);
    }

    #[test]
    fn empty_send_is_ignored() {
        let mut session = started();
        let step = session.handle(SessionEvent::UserSent("   ".into()));
        assert_eq!(step, Step::default());
        assert!(!session.is_busy());
    }

    #[test]
    fn second_send_while_busy_is_rejected() {
        let mut session = started();
        session.handle(SessionEvent::UserSent("first".into()));
        let before = session.history().len();

        let step = session.handle(SessionEvent::UserSent("second".into()));
        assert_eq!(step, Step::default());
        let step = session.handle(SessionEvent::ButtonPressed("Mole conversions".into()));
        assert_eq!(step, Step::default());
        assert_eq!(session.history().len(), before);
    }

    #[test]
    fn model_reply_is_shown_verbatim() {
        let mut session = started();
        session.handle(SessionEvent::UserSent("What is a mole?".into()));
        let step = session.handle(SessionEvent::RemoteReplyReceived("6.022e23 things.".into()));

        assert_eq!(
            step.commands,
            vec![RenderCommand::RemoveTyping, bot_text("6.022e23 things.")]
        );
        assert!(!session.is_busy());
        assert_eq!(session.history().last(), Some(&ConversationTurn::model("6.022e23 things.")));
    }

    #[test]
    fn scripted_reply_overrides_model_once() {
        let mut session = started();
        session.handle(SessionEvent::ButtonPressed("What is stoichiometry?".into()));
        let step = session.handle(SessionEvent::RemoteReplyReceived("model says hi".into()));

        assert_eq!(step.commands.len(), 3);
        assert_eq!(step.commands[0], RenderCommand::RemoveTyping);
        assert_eq!(step.commands[1], bot_text(script::RULES[0].reply));
        match &step.commands[2] {
            RenderCommand::Append {
                body: MessageBody::Buttons(buttons),
                ..
            } => {
                let labels: Vec<&str> = buttons.iter().map(|b| b.label.as_str()).collect();
                assert_eq!(labels, vec!["Show me the basics", "I want to solve a problem"]);
            }
            other => panic!("expected buttons, got {other:?}"),
        }

        session.handle(SessionEvent::UserSent("What is stoichiometry?".into()));
        let step = session.handle(SessionEvent::RemoteReplyReceived("model says hi".into()));
        assert_eq!(
            step.commands,
            vec![RenderCommand::RemoveTyping, bot_text("model says hi")]
        );
    }

    #[test]
    fn failures_use_fixed_apologies() {
        let mut session = started();
        session.handle(SessionEvent::UserSent("hi".into()));
        let step = session.handle(SessionEvent::RemoteFailed(DispatchError::NoCandidates {
            body: "{}".into(),
        }));
        assert_eq!(
            step.commands,
            vec![RenderCommand::RemoveTyping, bot_text(EMPTY_RESPONSE_APOLOGY)]
        );

        session.handle(SessionEvent::UserSent("hi again".into()));
        let step = session.handle(SessionEvent::RemoteFailed(DispatchError::Transport(
            "connection reset".into(),
        )));
        assert_eq!(
            step.commands,
            vec![RenderCommand::RemoveTyping, bot_text(EXCEPTION_APOLOGY)]
        );
        assert!(!session.is_busy());
    }

    #[test]
    fn stray_outcomes_are_ignored() {
        let mut session = started();
        let len = session.history().len();
        assert_eq!(
            session.handle(SessionEvent::RemoteReplyReceived("late".into())),
            Step::default()
        );
        assert_eq!(
            session.handle(SessionEvent::RemoteFailed(DispatchError::MalformedCandidate)),
            Step::default()
        );
        assert_eq!(session.history().len(), len);
    }
}
