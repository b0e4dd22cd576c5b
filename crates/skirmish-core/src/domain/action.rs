//! Opaque action token returned by an agent for one decision point.

use std::fmt;
use std::str::FromStr;

/// What an agent answered for one request.
///
/// The orchestrator never interprets `Move` payloads; they are handed to the
/// rule engine untouched. Only the two sentinels have meaning to the loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionToken {
    /// Stringified move identifier.
    Move(String),
    /// Literal `"end"`: the agent ends its phase.
    End,
    /// Literal `"error"`: the agent failed to decide.
    Error,
}

impl ActionToken {
    pub fn is_end(&self) -> bool {
        matches!(self, ActionToken::End)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionToken::Move(m) => m,
            ActionToken::End => "end",
            ActionToken::Error => "error",
        }
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionToken {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "end" => ActionToken::End,
            "error" => ActionToken::Error,
            other => ActionToken::Move(other.to_string()),
        })
    }
}

impl From<&str> for ActionToken {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(token) => token,
            Err(never) => match never {},
        }
    }
}
