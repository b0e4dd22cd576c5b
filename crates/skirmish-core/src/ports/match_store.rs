//! MatchStore port: the relational store owning Matches, Games, Agents, Teams
//! and Tournaments.
//!
//! # Write paths
//! - `append_game` commits a whole Game or nothing; readers never observe a
//!   partially written Game.
//! - `set_match_logfile` is a single write done after the last Game.
//!
//! # Read paths
//! Listing methods return `Ok(vec![])` when there are no rows and `Err` when
//! the query itself failed. Callers that prefer to degrade a failure to an
//! empty listing do so explicitly with [`Listing::or_empty`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Agent, AgentId, Game, Match, MatchId, NewGame, Role, Team, TeamId, Tournament, TournamentId,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("match {0} already has all of its games")]
    MatchComplete(MatchId),

    #[error("logfile of match {0} was already set")]
    LogfileAlreadySet(MatchId),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn match_not_found(id: MatchId) -> Self {
        StoreError::NotFound {
            kind: "match",
            id: id.to_string(),
        }
    }

    /// Only backend failures can succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// Fields of a Match chosen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub pelican_agent: AgentId,
    pub panther_agent: AgentId,
    pub num_games: u32,
    pub game_config: String,
    pub tournament_id: Option<TournamentId>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    // ---- orchestration surface ----

    async fn find_match(&self, match_id: MatchId) -> Result<Option<Match>, StoreError>;

    /// Atomically append a completed Game to its Match.
    async fn append_game(&self, match_id: MatchId, game: NewGame) -> Result<Game, StoreError>;

    async fn set_match_logfile(&self, match_id: MatchId, url: &str) -> Result<(), StoreError>;

    // ---- scheduling surface ----

    async fn insert_team(&self, name: &str, members: &str) -> Result<Team, StoreError>;

    async fn insert_agent(
        &self,
        name: &str,
        role: Role,
        team_id: Option<TeamId>,
    ) -> Result<Agent, StoreError>;

    async fn insert_tournament(
        &self,
        agent_ids: &[AgentId],
        created_at: DateTime<Utc>,
    ) -> Result<Tournament, StoreError>;

    async fn insert_match(&self, new_match: NewMatch) -> Result<Match, StoreError>;

    async fn find_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Option<Tournament>, StoreError>;

    // ---- read paths ----

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    async fn list_tournaments(&self) -> Result<Vec<Tournament>, StoreError>;

    /// Matches, optionally restricted to one tournament, in creation order.
    async fn list_matches(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> Result<Vec<Match>, StoreError>;
}

/// Explicit degradation of read-path failures.
pub trait Listing<T> {
    /// Treat a failed query as "no rows", logging the failure.
    fn or_empty(self, what: &str) -> Vec<T>;
}

impl<T> Listing<T> for Result<Vec<T>, StoreError> {
    fn or_empty(self, what: &str) -> Vec<T> {
        self.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "listing {what} failed, reporting no rows");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_empty_distinguishes_nothing_at_the_call_site() {
        let rows: Result<Vec<u8>, StoreError> = Ok(vec![1, 2]);
        assert_eq!(rows.or_empty("rows"), vec![1, 2]);
        let failed: Result<Vec<u8>, StoreError> = Err(StoreError::Backend("down".into()));
        assert!(failed.or_empty("rows").is_empty());
    }
}
