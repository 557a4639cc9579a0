//! Request contents sent to the model on every turn.

use crate::state::{ConversationTurn, UserProfile};

/// Acknowledgement placed after the system instruction so the model sees a
/// user/model pair before the real conversation starts.
pub const PRIMING_ACK: &str = "Got it! I'm ready to help students master stoichiometry.";

pub fn system_instruction(profile: Option<&UserProfile>) -> String {
    let (nickname, age) = profile
        .map(|p| (p.nickname.as_str(), p.age.as_str()))
        .unwrap_or(("", ""));

    format!(
        "You are Stoichiometrix, a friendly and casual AI-powered learning assistant focused exclusively on stoichiometry concepts in chemistry, from basic to complex. \
         Your goal is to help students achieve concept mastery. \
         If a question is outside the scope of stoichiometry or general chemistry fundamentals, politely decline and gently guide the user back to relevant topics, maintaining a friendly and encouraging tone. \
         Do not directly answer non-stoichiometry questions. \
         Do not trigger the out-of-scope response easily for greetings or simple conversational remarks. \
         Always reply in the requested language (English, Tagalog, Filipino, Spanish). \
         The user's nickname is {nickname} and age is {age}."
    )
}

/// System instruction, its acknowledgement, the prior history, then the new message.
pub fn build_contents(
    profile: Option<&UserProfile>,
    history: &[ConversationTurn],
    message: &str,
) -> Vec<ConversationTurn> {
    let mut contents = Vec::with_capacity(history.len() + 3);
    contents.push(ConversationTurn::user(system_instruction(profile)));
    contents.push(ConversationTurn::model(PRIMING_ACK));
    contents.extend(history.iter().cloned());
    contents.push(ConversationTurn::user(message));
    contents
}
