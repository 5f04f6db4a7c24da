//! Caller-supplied ordering policy for a transcript snapshot.
//!
//! None of these rules are enforced when messages are built; a caller that
//! wants them runs [`validate`] over a snapshot.

use crate::error::ValidationError;
use crate::message::{Message, MessageKind};

/// Which ordering rules to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// The first message must be a system message.
    pub require_system_first: bool,
    /// At least one human message must be present.
    pub require_human: bool,
    /// No two adjacent messages may share a kind.
    pub no_consecutive_same_kind: bool,
    /// Every tool message must answer a preceding assistant tool call.
    pub tool_follows_tool_call: bool,
}

impl ValidationPolicy {
    /// Every rule enabled.
    pub fn strict() -> Self {
        Self {
            require_system_first: true,
            require_human: true,
            no_consecutive_same_kind: true,
            tool_follows_tool_call: true,
        }
    }

    /// Only the non-empty check.
    pub fn lenient() -> Self {
        Self {
            require_system_first: false,
            require_human: false,
            no_consecutive_same_kind: false,
            tool_follows_tool_call: false,
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

/// Check `messages` against `policy`, reporting the first violation.
pub fn validate(messages: &[Message], policy: &ValidationPolicy) -> Result<(), ValidationError> {
    let first = messages.first().ok_or(ValidationError::Empty)?;

    if policy.require_system_first && first.kind() != MessageKind::System {
        return Err(ValidationError::SystemNotFirst(first.kind()));
    }

    if policy.require_human && !messages.iter().any(|m| m.kind() == MessageKind::Human) {
        return Err(ValidationError::NoHumanMessage);
    }

    if policy.no_consecutive_same_kind {
        for (i, pair) in messages.windows(2).enumerate() {
            // Several results for one multi-call assistant turn are fine.
            if pair[0].kind() == pair[1].kind() && pair[1].kind() != MessageKind::Tool {
                return Err(ValidationError::ConsecutiveSameKind {
                    kind: pair[1].kind(),
                    first: i,
                    second: i + 1,
                });
            }
        }
    }

    if policy.tool_follows_tool_call {
        for (position, msg) in messages.iter().enumerate() {
            if msg.kind() != MessageKind::Tool {
                continue;
            }
            let caller = messages[..position]
                .iter()
                .rev()
                .find(|m| m.kind() != MessageKind::Tool);
            let answered = caller.is_some_and(|c| {
                c.kind() == MessageKind::Assistant
                    && c.tool_calls()
                        .iter()
                        .any(|call| Some(call.id.as_str()) == msg.tool_call_id())
            });
            if !answered {
                return Err(ValidationError::OrphanToolMessage { position });
            }
        }
    }

    Ok(())
}
