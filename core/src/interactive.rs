use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::client::CommandArgs;

/// A free-text command line parsed into an invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub command_id: String,
    pub arguments: CommandArgs,
}

impl ParsedCommand {
    /// Drop arguments the configuration marks as read-only. Returns the
    /// names that were dropped so the caller can surface them.
    pub fn apply_read_only(&mut self, read_only: &BTreeSet<String>) -> Vec<String> {
        let dropped: Vec<String> = self
            .arguments
            .keys()
            .filter(|key| read_only.contains(*key))
            .cloned()
            .collect();
        for key in &dropped {
            self.arguments.remove(key);
        }
        dropped
    }
}

/// Parse `command key1=value1 key2=value2 ...`. Tokens without a `=` (or
/// with an empty key or value) are ignored for argument purposes. Blank
/// input parses to `None`.
pub fn parse_command_line(input: &str) -> Option<ParsedCommand> {
    let mut tokens = input.split_whitespace();
    let command_id = tokens.next()?.to_string();
    let mut arguments = CommandArgs::new();
    for token in tokens {
        match parse_argument_token(token) {
            Some((key, value)) => {
                arguments.insert(key, value);
            }
            None => debug!("ignoring malformed argument token `{token}`"),
        }
    }
    Some(ParsedCommand {
        command_id,
        arguments,
    })
}

/// `key=value` → `(key, value)`. Values stay strings, the way form input
/// arrives.
pub fn parse_argument_token(token: &str) -> Option<(String, Value)> {
    let (key, value) = token.split_once('=')?;
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_string(), Value::from(value)))
}
