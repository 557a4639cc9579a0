use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use stoichiometrix_core::ai::{EMPTY_RESPONSE_APOLOGY, EXCEPTION_APOLOGY};
use stoichiometrix_core::ai::gemini::parse_generate_response;
use stoichiometrix_core::dispatch::run;
use stoichiometrix_core::script::RULES;
use stoichiometrix_core::{
    ConversationTurn, DispatchError, MessageBody, ModelBackend, RenderCommand, Role, Sender,
    Session, SessionEvent,
};

/// Backend that replays canned outcomes and records what it was asked.
struct ScriptedBackend {
    outcomes: Mutex<VecDeque<Result<String, DispatchError>>>,
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl ScriptedBackend {
    fn new(outcomes: Vec<Result<String, DispatchError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn replying(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(text.to_string())).collect())
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, contents: &[ConversationTurn]) -> Result<String, DispatchError> {
        self.requests.lock().unwrap().push(contents.to_vec());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("default reply".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

async fn started_session(backend: &ScriptedBackend) -> Session {
    let mut session = Session::new();
    run(&mut session, backend, SessionEvent::BubbleClicked).await;
    run(
        &mut session,
        backend,
        SessionEvent::StartLearning {
            nickname: "Ana".into(),
            age: "15".into(),
        },
    )
    .await;
    session
}

fn appended_texts(commands: &[RenderCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::Append {
                sender: Sender::Bot,
                body: MessageBody::Text(text),
            } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn button_labels(commands: &[RenderCommand]) -> Vec<Vec<String>> {
    commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::Append {
                body: MessageBody::Buttons(buttons),
                ..
            } => Some(buttons.iter().map(|b| b.label.clone()).collect()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn history_interleaves_user_and_bot_turns() {
    let backend = ScriptedBackend::replying("ok", 5);
    let mut session = started_session(&backend).await;
    let greeting_turns = session.history().len();

    for i in 0..5 {
        run(&mut session, &backend, SessionEvent::UserSent(format!("question {i}"))).await;
    }

    let turns = &session.history().turns()[greeting_turns..];
    assert_eq!(turns.len(), 10);
    let users: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(
        users,
        vec!["question 0", "question 1", "question 2", "question 3", "question 4"]
    );
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Model);
    }
}

#[tokio::test]
async fn each_request_carries_the_whole_conversation() {
    let backend = ScriptedBackend::replying("ok", 2);
    let mut session = started_session(&backend).await;

    run(&mut session, &backend, SessionEvent::UserSent("first".into())).await;
    run(&mut session, &backend, SessionEvent::UserSent("second".into())).await;

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    // instruction, ack, greeting, first
    assert_eq!(requests[0].len(), 4);
    // plus the first reply and the second message
    assert_eq!(requests[1].len(), 6);
    assert_eq!(requests[1][3], ConversationTurn::user("first"));
    assert_eq!(requests[1][4], ConversationTurn::model("ok"));
    assert_eq!(requests[1][5], ConversationTurn::user("second"));
}

#[tokio::test]
async fn stoichiometry_definition_triggers_once() {
    let backend = ScriptedBackend::replying("raw model reply", 2);
    let mut session = started_session(&backend).await;

    let commands = run(
        &mut session,
        &backend,
        SessionEvent::UserSent("What is stoichiometry?".into()),
    )
    .await;
    let texts = appended_texts(&commands);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Stoichiometry is the branch of chemistry"));
    assert_eq!(
        button_labels(&commands),
        vec![vec![
            "Show me the basics".to_string(),
            "I want to solve a problem".to_string()
        ]]
    );

    let commands = run(
        &mut session,
        &backend,
        SessionEvent::UserSent("What is stoichiometry?".into()),
    )
    .await;
    assert_eq!(appended_texts(&commands), vec!["raw model reply".to_string()]);
    assert!(button_labels(&commands).is_empty());
}

#[tokio::test]
async fn guided_lesson_through_buttons() {
    let backend = ScriptedBackend::replying("raw", 5);
    let mut session = started_session(&backend).await;

    let commands = run(&mut session, &backend, SessionEvent::ButtonPressed("I want to solve a problem".into())).await;
    assert_eq!(button_labels(&commands)[0], vec!["Mole conversions", "Balancing equations"]);

    let commands = run(&mut session, &backend, SessionEvent::ButtonPressed("Mole conversions".into())).await;
    assert_eq!(button_labels(&commands)[0], vec!["Tell me how to convert grams to moles"]);

    let commands = run(
        &mut session,
        &backend,
        SessionEvent::ButtonPressed("Tell me how to convert grams to moles".into()),
    )
    .await;
    assert!(appended_texts(&commands)[0].contains("44 grams of CO2"));
    assert_eq!(button_labels(&commands)[0], vec!["1 mole", "2 moles"]);

    let commands = run(&mut session, &backend, SessionEvent::ButtonPressed("1 mole".into())).await;
    assert!(appended_texts(&commands)[0].starts_with("Exactly!"));
    assert_eq!(button_labels(&commands)[0], vec!["Try another problem", "Go back to main topics"]);

    let commands = run(&mut session, &backend, SessionEvent::ButtonPressed("2 moles".into())).await;
    assert_eq!(appended_texts(&commands), vec!["raw".to_string()]);
}

#[tokio::test]
async fn every_rule_is_reachable_from_the_button_before_it() {
    // (message, sent by pressing an offered button?, index of the rule it should fire)
    let walk: [(&str, bool, usize); 8] = [
        ("What is stoichiometry?", true, 0),
        ("Show me the basics", true, 1),
        ("I want to solve a problem", true, 2),
        ("Mole conversions", true, 3),
        ("Tell me how to convert grams to moles", true, 4),
        ("1 mole", true, 5),
        ("Can I change the language?", false, 6),
        ("Filipino", true, 7),
    ];

    let backend = ScriptedBackend::replying("raw", walk.len());
    let mut session = Session::new();
    run(&mut session, &backend, SessionEvent::BubbleClicked).await;
    let mut offered = button_labels(
        &run(
            &mut session,
            &backend,
            SessionEvent::StartLearning {
                nickname: "Ana".into(),
                age: "15".into(),
            },
        )
        .await,
    )
    .concat();

    for (message, pressed, rule) in walk {
        let event = if pressed {
            assert!(
                offered.iter().any(|label| label == message),
                "{message:?} was not offered, buttons on screen: {offered:?}"
            );
            SessionEvent::ButtonPressed(message.into())
        } else {
            SessionEvent::UserSent(message.into())
        };

        let commands = run(&mut session, &backend, event).await;
        assert_eq!(
            appended_texts(&commands),
            vec![RULES[rule].reply.to_string()],
            "{message:?} should fire rule {rule}"
        );

        let labels: Vec<String> = RULES[rule].buttons.iter().map(|b| b.label.to_string()).collect();
        let shown = button_labels(&commands).concat();
        assert_eq!(shown, labels);
        offered.extend(shown);
    }
}

#[tokio::test]
async fn language_switch_flow() {
    let backend = ScriptedBackend::replying("raw", 2);
    let mut session = started_session(&backend).await;

    let commands = run(&mut session, &backend, SessionEvent::UserSent("Can I change the language?".into())).await;
    assert_eq!(
        button_labels(&commands),
        vec![vec!["English", "Tagalog", "Filipino", "Spanish"]]
    );

    let commands = run(&mut session, &backend, SessionEvent::ButtonPressed("Filipino".into())).await;
    assert_eq!(
        appended_texts(&commands),
        vec!["Napakagaling! Simula ngayon, mag-aaral tayo ng stoichiometry sa Filipino.".to_string()]
    );
    assert!(button_labels(&commands).is_empty());
}

#[tokio::test]
async fn response_without_candidates_shows_connectivity_apology() {
    let malformed = parse_generate_response(r#"{"promptFeedback":{}}"#).unwrap_err();
    let backend = ScriptedBackend::new(vec![Err(malformed)]);
    let mut session = started_session(&backend).await;

    let commands = run(&mut session, &backend, SessionEvent::UserSent("hello".into())).await;
    assert_eq!(appended_texts(&commands), vec![EMPTY_RESPONSE_APOLOGY.to_string()]);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn network_failure_shows_thinking_apology() {
    let backend = ScriptedBackend::new(vec![Err(DispatchError::Transport("connection refused".into()))]);
    let mut session = started_session(&backend).await;

    let commands = run(&mut session, &backend, SessionEvent::UserSent("hello".into())).await;
    assert_eq!(appended_texts(&commands), vec![EXCEPTION_APOLOGY.to_string()]);
    assert_eq!(
        session.history().last(),
        Some(&ConversationTurn::model(EXCEPTION_APOLOGY))
    );
}

#[tokio::test]
async fn typing_placeholder_never_overlaps_final_message() {
    let backend = ScriptedBackend::new(vec![
        Ok("plain".into()),
        Ok("ignored".into()),
        Err(DispatchError::MalformedCandidate),
        Err(DispatchError::MissingApiKey),
    ]);
    let mut session = started_session(&backend).await;

    for message in ["a question", "What is stoichiometry?", "another", "last"] {
        let commands = run(&mut session, &backend, SessionEvent::UserSent(message.into())).await;

        let mut typing = false;
        for command in &commands {
            match command {
                RenderCommand::ShowTyping => typing = true,
                RenderCommand::RemoveTyping => typing = false,
                RenderCommand::Append { sender: Sender::Bot, .. } => {
                    assert!(!typing, "bot message appended while typing indicator shown");
                }
                _ => {}
            }
        }
        assert!(!typing);
        assert_eq!(
            commands.iter().filter(|c| **c == RenderCommand::ShowTyping).count(),
            1
        );
        assert_eq!(
            commands.iter().filter(|c| **c == RenderCommand::RemoveTyping).count(),
            1
        );
    }
}

#[tokio::test]
async fn start_flow_requires_profile() {
    let backend = ScriptedBackend::new(Vec::new());
    let mut session = Session::new();

    let commands = run(
        &mut session,
        &backend,
        SessionEvent::StartLearning {
            nickname: "Ana".into(),
            age: "".into(),
        },
    )
    .await;
    assert!(matches!(commands.as_slice(), [RenderCommand::Alert(_)]));
    assert!(session.welcome_visible());

    let commands = run(
        &mut session,
        &backend,
        SessionEvent::StartLearning {
            nickname: "Ana".into(),
            age: "15".into(),
        },
    )
    .await;
    assert!(!session.welcome_visible());
    assert!(commands.contains(&RenderCommand::HideWelcome));
    let appended = commands
        .iter()
        .filter(|c| matches!(c, RenderCommand::Append { sender: Sender::Bot, .. }))
        .count();
    assert_eq!(appended, 2);
    assert!(backend.requests.lock().unwrap().is_empty());
}
