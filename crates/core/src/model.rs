//! The model contract.
//!
//! A language model is any `Runnable<ModelInput, String>`. The reasoning loop
//! depends only on that, so tests can script a model with a closure and real
//! deployments plug in an HTTP backend.

use std::fmt::Write;

use crate::message::Message;

/// What a model accepts: a raw prompt or a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    Prompt(String),
    Messages(Vec<Message>),
}

impl ModelInput {
    /// Render to the single text prompt a completion backend consumes.
    ///
    /// With a system prompt, a raw prompt becomes
    /// `System: <sys>\n\nUser: <prompt>\n\nAssistant:`. A conversation that
    /// has no system message of its own gets the system prompt prepended.
    pub fn render(&self, system_prompt: Option<&str>) -> String {
        let system_prompt = system_prompt.filter(|s| !s.is_empty());
        match self {
            ModelInput::Prompt(prompt) => match system_prompt {
                Some(sys) => format!("System: {sys}\n\nUser: {prompt}\n\nAssistant:"),
                None => prompt.clone(),
            },
            ModelInput::Messages(messages) => {
                let has_system = messages
                    .iter()
                    .any(|m| m.kind() == crate::message::MessageKind::System);
                match system_prompt {
                    Some(sys) if !has_system => {
                        format!("System: {sys}\n\n{}", flatten_messages(messages))
                    }
                    _ => flatten_messages(messages),
                }
            }
        }
    }
}

impl From<String> for ModelInput {
    fn from(prompt: String) -> Self {
        ModelInput::Prompt(prompt)
    }
}

impl From<&str> for ModelInput {
    fn from(prompt: &str) -> Self {
        ModelInput::Prompt(prompt.to_string())
    }
}

impl From<Vec<Message>> for ModelInput {
    fn from(messages: Vec<Message>) -> Self {
        ModelInput::Messages(messages)
    }
}

/// Flatten a conversation into role-labelled turns, cueing the assistant.
pub fn flatten_messages(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        let _ = write!(prompt, "{}: {}\n\n", msg.kind().prompt_label(), msg.content());
    }
    prompt.push_str("Assistant:");
    prompt
}
