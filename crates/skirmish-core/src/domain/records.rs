//! Persisted records: Match, Game, Agent, Team, Tournament.
//!
//! Design:
//! - Games are append-only. A Game is created exactly once, when a game reaches
//!   a terminal state, and never mutated afterwards.
//! - A loaded `Match` carries its Games, so `is_finished` and `winner` can be
//!   answered from the record alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AgentId, GameId, MatchId, TeamId, TournamentId};
use super::role::Role;
use super::state::WinCode;

/// One complete play-through, owned by exactly one Match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: GameId,
    pub match_id: MatchId,
    pub created_at: DateTime<Utc>,
    pub num_turns: u32,
    pub result_code: WinCode,
    /// Location of the uploaded video, when a video was recorded.
    pub video_url: Option<String>,
}

impl Game {
    pub fn winner(&self) -> Role {
        self.result_code.winner()
    }
}

/// Everything needed to append a Game. Written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub num_turns: u32,
    pub result_code: WinCode,
    pub video_url: Option<String>,
}

/// Match-level verdict. Ties (including a Match without Games) are a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchWinner {
    Pelican,
    Panther,
    Draw,
}

impl From<Role> for MatchWinner {
    fn from(role: Role) -> Self {
        match role {
            Role::Pelican => MatchWinner::Pelican,
            Role::Panther => MatchWinner::Panther,
        }
    }
}

/// A scheduled contest of `num_games` Games between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: MatchId,
    pub created_at: DateTime<Utc>,
    pub pelican_agent: AgentId,
    pub panther_agent: AgentId,
    pub num_games: u32,
    /// Blob name of the game configuration artifact.
    pub game_config: String,
    /// Set once, after all Games of the Match have been played.
    pub logfile_url: Option<String>,
    pub tournament_id: Option<TournamentId>,
    /// Games in creation order.
    pub games: Vec<Game>,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.games.len() == self.num_games as usize
    }

    /// Games that can still be appended.
    pub fn remaining_games(&self) -> u32 {
        let played = u32::try_from(self.games.len()).unwrap_or(u32::MAX);
        self.num_games.saturating_sub(played)
    }

    pub fn wins(&self, role: Role) -> usize {
        self.games.iter().filter(|g| g.winner() == role).count()
    }

    /// Majority of Game wins, or an explicit draw on equal counts.
    pub fn winner(&self) -> MatchWinner {
        let pelican = self.wins(Role::Pelican);
        let panther = self.wins(Role::Panther);
        match pelican.cmp(&panther) {
            std::cmp::Ordering::Greater => MatchWinner::Pelican,
            std::cmp::Ordering::Less => MatchWinner::Panther,
            std::cmp::Ordering::Equal => MatchWinner::Draw,
        }
    }

    pub fn agent_for(&self, role: Role) -> AgentId {
        match role {
            Role::Pelican => self.pelican_agent,
            Role::Panther => self.panther_agent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: TeamId,
    pub team_name: String,
    pub team_members: String,
}

/// A named agent image, `TEAM:TAG`, playing one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub agent_type: Role,
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub tournament_id: TournamentId,
    pub created_at: DateTime<Utc>,
    pub agent_ids: Vec<AgentId>,
    pub match_ids: Vec<MatchId>,
}
