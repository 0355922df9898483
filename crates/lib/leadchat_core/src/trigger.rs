//! Contact-form trigger: decides whether a turn should offer the lead form.
//!
//! The decision is isolated behind [`ContactIntentClassifier`] so the phrase
//! lists can be replaced by a different classifier without touching the
//! streaming code.

use std::sync::LazyLock;

use regex::Regex;

/// Tool name the widget renders as the lead-capture form.
pub const CONTACT_FORM_TOOL: &str = "contact_form";

/// Assistant admissions of missing knowledge.
pub const UNKNOWN_ANSWER_PHRASES: &[&str] = &[
    "don't have that information",
    "do not have that information",
    "based on the available data",
];

/// Assistant replies that already promise a form.
pub const FORM_OFFER_PHRASES: &[&str] = &[
    "a contact form",
    "form has been provided",
    "contact form has been provided",
    "provided below for you to get in touch",
];

/// User phrasings asking for human contact, a demo, a meeting, or a form.
pub const USER_INTENT_PHRASES: &[&str] = &[
    "contact you",
    "contact your",
    "contact someone",
    "contact sales",
    "contact support",
    "contact the team",
    "contact form",
    "get in touch",
    "reach out",
    "reach you",
    "talk to someone",
    "talk to a human",
    "talk to sales",
    "speak to someone",
    "speak with someone",
    "speak to a human",
    "speak with sales",
    "schedule a demo",
    "book a demo",
    "request a demo",
    "schedule a call",
    "book a call",
    "schedule a meeting",
    "book a meeting",
    "set up a meeting",
    "call me",
    "call back",
    "send me a form",
    "fill out a form",
    "request a quote",
    "get a quote",
];

static FORM_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bform\b").expect("valid regex"));
static CONTACT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcontact\b").expect("valid regex"));

/// Decides whether a turn should surface the contact form.
pub trait ContactIntentClassifier: Send + Sync {
    /// `user_text` is the latest user message (possibly empty), `assistant_text`
    /// the complete assistant reply.
    fn should_offer_contact_form(&self, user_text: &str, assistant_text: &str) -> bool;
}

/// Case-insensitive substring matcher over fixed phrase lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhraseClassifier;

impl PhraseClassifier {
    fn assistant_triggers(reply: &str) -> bool {
        UNKNOWN_ANSWER_PHRASES
            .iter()
            .chain(FORM_OFFER_PHRASES)
            .any(|p| reply.contains(p))
    }

    fn user_triggers(user: &str) -> bool {
        USER_INTENT_PHRASES.iter().any(|p| user.contains(p))
            || (FORM_WORD.is_match(user) && CONTACT_WORD.is_match(user))
    }
}

impl ContactIntentClassifier for PhraseClassifier {
    fn should_offer_contact_form(&self, user_text: &str, assistant_text: &str) -> bool {
        let reply = assistant_text.to_lowercase();
        let user = user_text.to_lowercase();
        Self::assistant_triggers(&reply) || Self::user_triggers(&user)
    }
}
