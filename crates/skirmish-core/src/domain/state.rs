//! Game state machine: `Running` plus four absorbing win codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::role::Role;

/// Terminal result of a Game.
///
/// Serialized with the rule engine's literal codes (`BINGO`, `WINCHESTER`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinCode {
    /// Pelican ran out of fuel and has to return.
    Bingo,
    /// Pelican has no torpedoes left.
    Winchester,
    /// Panther escaped.
    Escape,
    /// Pelican destroyed the panther.
    #[serde(rename = "PELICANWIN")]
    PelicanWin,
}

impl WinCode {
    pub const ALL: [WinCode; 4] = [
        WinCode::Bingo,
        WinCode::Winchester,
        WinCode::Escape,
        WinCode::PelicanWin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WinCode::Bingo => "BINGO",
            WinCode::Winchester => "WINCHESTER",
            WinCode::Escape => "ESCAPE",
            WinCode::PelicanWin => "PELICANWIN",
        }
    }

    /// Static win table. No code maps to a draw.
    pub fn winner(self) -> Role {
        match self {
            WinCode::Bingo | WinCode::Winchester | WinCode::Escape => Role::Panther,
            WinCode::PelicanWin => Role::Pelican,
        }
    }
}

impl fmt::Display for WinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game state {0:?}")]
pub struct UnknownGameState(pub String);

impl FromStr for WinCode {
    type Err = UnknownGameState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WinCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownGameState(s.to_string()))
    }
}

/// Current state of a board as reported by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Running,
    Terminal(WinCode),
}

impl GameState {
    pub fn is_running(self) -> bool {
        matches!(self, GameState::Running)
    }

    pub fn win_code(self) -> Option<WinCode> {
        match self {
            GameState::Running => None,
            GameState::Terminal(code) => Some(code),
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Running => f.write_str("Running"),
            GameState::Terminal(code) => code.fmt(f),
        }
    }
}

/// Accepts the engine's state strings ("Running", "BINGO", ...).
impl FromStr for GameState {
    type Err = UnknownGameState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("running") {
            return Ok(GameState::Running);
        }
        s.parse().map(GameState::Terminal)
    }
}
