//! Scripted replies for the guided stoichiometry lessons.
//!
//! Each rule overrides the model's reply when the learner's message matches its
//! trigger and the guard holds against the earlier conversation. Rules are
//! checked in table order and the first match wins.

use crate::state::{learner_sent, mentions, ConversationTurn};

/// How a rule recognizes the learner's message. Comparison is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Contains(&'static str),
    Exact(&'static str),
}

impl Trigger {
    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        match self {
            Trigger::Contains(phrase) => message.contains(&phrase.to_lowercase()),
            Trigger::Exact(phrase) => message == phrase.to_lowercase(),
        }
    }
}

/// Condition on earlier turns that must hold for a rule to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The learner has not sent the phrase before. Model turns don't count, since
    /// scripted replies often name the next step.
    NotYetSent(&'static str),
    /// Some earlier turn mentions the phrase
    AlreadySent(&'static str),
}

impl Guard {
    pub fn holds(&self, prior: &[ConversationTurn]) -> bool {
        match self {
            Guard::NotYetSent(phrase) => !learner_sent(prior, phrase),
            Guard::AlreadySent(phrase) => mentions(prior, phrase),
        }
    }
}

/// A follow-up button offered with a scripted reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonSpec {
    pub label: &'static str,
    pub value: &'static str,
}

const fn button(text: &'static str) -> ButtonSpec {
    ButtonSpec {
        label: text,
        value: text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedRule {
    pub trigger: Trigger,
    pub guard: Guard,
    pub reply: &'static str,
    pub buttons: &'static [ButtonSpec],
}

pub const RULES: &[ScriptedRule] = &[
    ScriptedRule {
        trigger: Trigger::Contains("what is stoichiometry?"),
        guard: Guard::NotYetSent("what is stoichiometry?"),
        reply: "Stoichiometry is the branch of chemistry concerned with the relative quantities of reactants and products in chemical reactions. It helps us calculate how much of each component is involved!",
        buttons: &[button("Show me the basics"), button("I want to solve a problem")],
    },
    ScriptedRule {
        trigger: Trigger::Contains("show me the basics"),
        guard: Guard::NotYetSent("show me the basics"),
        reply: "Okay, let's start with foundational concepts like moles and molar mass. What would you like to know first?",
        buttons: &[button("What is a mole?"), button("What is molar mass?")],
    },
    ScriptedRule {
        trigger: Trigger::Contains("i want to solve a problem"),
        guard: Guard::NotYetSent("i want to solve a problem"),
        reply: "Great! What kind of problem are you looking to solve? Mole conversions or balancing equations?",
        buttons: &[button("Mole conversions"), button("Balancing equations")],
    },
    ScriptedRule {
        trigger: Trigger::Contains("mole conversions"),
        guard: Guard::NotYetSent("mole conversions"),
        reply: "Alright! Let's start with converting grams to moles. How do I convert grams to moles?",
        buttons: &[button("Tell me how to convert grams to moles")],
    },
    ScriptedRule {
        trigger: Trigger::Contains("tell me how to convert grams to moles"),
        guard: Guard::NotYetSent("tell me how to convert grams to moles"),
        reply: "To convert between grams and moles, we use the molar mass of a substance. Here's a quick guide!\nMolar Mass of H2O is 18 g/mol. To convert 36g of water to moles, you use this formula: Moles = grams / molar mass. Now it's your turn! Can you convert 44 grams of CO2 to moles?",
        buttons: &[button("1 mole"), button("2 moles")],
    },
    ScriptedRule {
        trigger: Trigger::Exact("1 mole"),
        guard: Guard::AlreadySent("44 grams of CO2"),
        reply: "Exactly! 44g / 44 g/mol = 1 mol of CO2. Great work! Now you can practice more problems.",
        buttons: &[button("Try another problem"), button("Go back to main topics")],
    },
    ScriptedRule {
        trigger: Trigger::Contains("can i change the language?"),
        guard: Guard::NotYetSent("change the language?"),
        reply: "Yes! I can speak different languages. What language would you prefer?",
        buttons: &[
            button("English"),
            button("Tagalog"),
            button("Filipino"),
            button("Spanish"),
        ],
    },
    ScriptedRule {
        trigger: Trigger::Exact("filipino"),
        guard: Guard::AlreadySent("change the language?"),
        reply: "Napakagaling! Simula ngayon, mag-aaral tayo ng stoichiometry sa Filipino.",
        buttons: &[],
    },
];

/// Find the first rule that fires for `message`, given the turns sent before it.
pub fn match_rule(message: &str, prior: &[ConversationTurn]) -> Option<&'static ScriptedRule> {
    RULES
        .iter()
        .find(|rule| rule.trigger.matches(message) && rule.guard.holds(prior))
}
