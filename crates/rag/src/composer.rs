//! Prompt composer: fills a template's `{placeholder}` tokens.
//!
//! Substitution is lenient: a placeholder nobody supplied stays in the text
//! verbatim. Values are inserted in a single pass, so a value that itself
//! contains `{braces}` (retrieved content often does) is never expanded.

use chrono::Utc;
use folio_config::PromptConfig;
use folio_core::history::ConversationTurn;
use folio_core::message::SessionId;
use folio_core::template::PromptTemplate;
use std::collections::BTreeMap;
use tracing::debug;

/// Caller-supplied placeholder values, keyed by placeholder name.
pub type PromptVariables = BTreeMap<String, String>;

pub const CONTEXT: &str = "context";
pub const USER_NAME: &str = "userName";
pub const USER_MESSAGE: &str = "userMessage";
pub const CONVERSATION_HISTORY: &str = "conversationHistory";
pub const TIMESTAMP: &str = "timestamp";
pub const MODEL_USED: &str = "modelUsed";
pub const LANGUAGE: &str = "language";
pub const SESSION_ID: &str = "sessionId";

/// Per-turn values for [`PromptComposer::conversation_prompt`].
pub struct TurnInputs<'a> {
    pub context: &'a str,
    pub user_message: &'a str,
    /// Prior turns, oldest first
    pub history: &'a [ConversationTurn],
    pub session_id: &'a SessionId,
    pub user_name: Option<&'a str>,
}

pub struct PromptComposer {
    default_user_name: String,
    language: String,
    model_used: String,
}

impl PromptComposer {
    /// `model_used` is the configured provider name reported by `{modelUsed}`.
    pub fn new(model_used: impl Into<String>) -> Self {
        Self {
            default_user_name: "Usuario".into(),
            language: "es".into(),
            model_used: model_used.into(),
        }
    }

    pub fn from_config(config: &PromptConfig, model_used: impl Into<String>) -> Self {
        Self {
            default_user_name: config.default_user_name.clone(),
            language: config.language.clone(),
            model_used: model_used.into(),
        }
    }

    /// Render `template` with `variables`.
    ///
    /// Built-in placeholders always resolve, falling back to defaults when
    /// the caller did not supply them; any other caller key resolves to its
    /// value.
    pub fn build(&self, template: &PromptTemplate, variables: &PromptVariables) -> String {
        let text = if template.context_preamble.trim().is_empty() {
            template.system_text.clone()
        } else {
            format!("{}\n\n{}", template.context_preamble, template.system_text)
        };

        let mut values = self.builtin_values();
        for (key, value) in variables {
            values.insert(key.clone(), value.clone());
        }

        substitute(&text, &values)
    }

    /// Render the chat prompt for one turn.
    pub fn conversation_prompt(&self, template: &PromptTemplate, turn: &TurnInputs<'_>) -> String {
        let mut variables = PromptVariables::new();
        variables.insert(CONTEXT.into(), turn.context.into());
        variables.insert(USER_MESSAGE.into(), turn.user_message.into());
        variables.insert(CONVERSATION_HISTORY.into(), format_history(turn.history));
        variables.insert(SESSION_ID.into(), turn.session_id.to_string());
        if let Some(name) = turn.user_name.filter(|n| !n.trim().is_empty()) {
            variables.insert(USER_NAME.into(), name.into());
        }
        self.build(template, &variables)
    }

    fn builtin_values(&self) -> PromptVariables {
        PromptVariables::from([
            (CONTEXT.into(), String::new()),
            (USER_NAME.into(), self.default_user_name.clone()),
            (USER_MESSAGE.into(), String::new()),
            (CONVERSATION_HISTORY.into(), String::new()),
            (
                TIMESTAMP.into(),
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            (MODEL_USED.into(), self.model_used.clone()),
            (LANGUAGE.into(), self.language.clone()),
            (SESSION_ID.into(), SessionId::new().to_string()),
        ])
    }
}

/// Serialize turns (oldest first) as alternating speaker lines.
pub fn format_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("User: {}\nAssistant: {}", t.user_message, t.bot_response))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace every `{key}` whose key is in `values`; leave the rest untouched.
fn substitute(text: &str, values: &PromptVariables) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let resolved = after.find('}').and_then(|close| {
            let key = &after[..close];
            values.get(key).map(|value| (value, close))
        });

        match resolved {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                if let Some(close) = after.find('}') {
                    let key = &after[..close];
                    if is_placeholder_name(key) {
                        debug!(placeholder = key, "Unresolved placeholder left verbatim");
                    }
                }
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_placeholder_name(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> PromptVariables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn turn(user: &str, bot: &str) -> ConversationTurn {
        ConversationTurn {
            session_id: SessionId::from_string("s1"),
            user_message: user.into(),
            bot_response: bot.into(),
            context_snapshot: vec![],
            provider: "mock".into(),
            tokens_used: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn substitutes_supplied_values() {
        let composer = PromptComposer::new("openrouter");
        let template = PromptTemplate::new("t", "Hi {userName}, ctx: {context}");

        let prompt = composer.build(&template, &vars(&[("userName", "Ana"), ("context", "X")]));

        assert_eq!(prompt, "Hi Ana, ctx: X");
    }

    #[test]
    fn unknown_placeholder_stays_verbatim() {
        let composer = PromptComposer::new("openrouter");
        let template = PromptTemplate::new("t", "Hi {userName}, {unknown} and {not a key}");

        let prompt = composer.build(&template, &PromptVariables::new());

        assert_eq!(prompt, "Hi Usuario, {unknown} and {not a key}");
    }

    #[test]
    fn builtins_fall_back_to_defaults() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new(
            "t",
            "[{context}] [{userMessage}] [{conversationHistory}] {modelUsed} {language}",
        );

        let prompt = composer.build(&template, &PromptVariables::new());

        assert_eq!(prompt, "[] [] [] groq es");
    }

    #[test]
    fn timestamp_and_session_are_always_filled() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new("t", "{timestamp}|{sessionId}");

        let prompt = composer.build(&template, &PromptVariables::new());
        let (timestamp, session) = prompt.split_once('|').unwrap();

        assert_eq!(timestamp.len(), "2025-01-01 00:00:00".len());
        assert!(!session.is_empty());
        assert!(!session.contains('{'));
    }

    #[test]
    fn extra_caller_keys_are_substituted() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new("t", "Tone: {tone}. User: {userName}");

        let prompt = composer.build(&template, &vars(&[("tone", "friendly")]));

        assert_eq!(prompt, "Tone: friendly. User: Usuario");
    }

    #[test]
    fn preamble_precedes_system_text() {
        let composer = PromptComposer::new("groq");
        let template =
            PromptTemplate::new("t", "Answer in {language}.").with_preamble("Context:\n{context}");

        let prompt = composer.build(&template, &vars(&[("context", "CV")]));

        assert_eq!(prompt, "Context:\nCV\n\nAnswer in es.");
    }

    #[test]
    fn braces_inside_values_are_not_expanded() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new("t", "{context} / {userName}");

        let prompt = composer.build(&template, &vars(&[("context", "fn main() { {userName} }")]));

        assert_eq!(prompt, "fn main() { {userName} } / Usuario");
    }

    #[test]
    fn unbalanced_braces_are_kept() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new("t", "a { b {userName");

        assert_eq!(composer.build(&template, &PromptVariables::new()), "a { b {userName");
    }

    #[test]
    fn blank_user_name_keeps_default() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new("t", "{userName}");
        let session_id = SessionId::new();
        let inputs = |name| TurnInputs {
            context: "",
            user_message: "hi",
            history: &[],
            session_id: &session_id,
            user_name: name,
        };

        assert_eq!(composer.conversation_prompt(&template, &inputs(Some("Ana"))), "Ana");
        assert_eq!(composer.conversation_prompt(&template, &inputs(Some("  "))), "Usuario");
        assert_eq!(composer.conversation_prompt(&template, &inputs(None)), "Usuario");
    }

    #[test]
    fn history_is_rendered_oldest_first() {
        let history = vec![turn("Hola", "¡Hola!"), turn("¿Qué haces?", "Backend en Rust.")];
        assert_eq!(
            format_history(&history),
            "User: Hola\nAssistant: ¡Hola!\nUser: ¿Qué haces?\nAssistant: Backend en Rust."
        );
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn conversation_prompt_fills_turn_values() {
        let composer = PromptComposer::new("groq");
        let template = PromptTemplate::new(
            "rag_system",
            "{conversationHistory}\nQ: {userMessage}\nCTX: {context}\nS: {sessionId}",
        );

        let history = [turn("Hi", "Hello")];
        let session_id = SessionId::from_string("abc");
        let prompt = composer.conversation_prompt(
            &template,
            &TurnInputs {
                context: "[Document: CV]\nRust",
                user_message: "What stack?",
                history: &history,
                session_id: &session_id,
                user_name: None,
            },
        );

        assert_eq!(
            prompt,
            "User: Hi\nAssistant: Hello\nQ: What stack?\nCTX: [Document: CV]\nRust\nS: abc"
        );
    }
}
