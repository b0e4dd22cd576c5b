//! Scheduler-side record creation.
//!
//! Creates Teams, Agents, Tournaments and Matches ahead of orchestration.
//! Teams and Agents are deduplicated by name; Matches optionally.

use std::sync::Arc;

use crate::domain::{
    Agent, AgentId, DEFAULT_GAME_CONFIG, Match, MatchId, Role, Team, Tournament, TournamentId,
};
use crate::ports::{Clock, MatchStore, NewMatch, StoreError};

pub const DEFAULT_NUM_GAMES: u32 = 10;

const PLACEHOLDER_MEMBERS: &str = "placeholder";

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("agent name {0:?} must look like TEAM:TAG")]
    InvalidAgentName(String),

    #[error("no {role} agent named {name:?}")]
    AgentNotFound { role: Role, name: String },

    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Parameters of [`Scheduler::create_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub pelican: String,
    pub panther: String,
    pub game_config: String,
    pub num_games: u32,
    pub tournament_id: Option<TournamentId>,
    /// Reuse an existing Match between the same two agents.
    pub check_for_existing: bool,
}

impl MatchRequest {
    pub fn new(pelican: impl Into<String>, panther: impl Into<String>) -> Self {
        Self {
            pelican: pelican.into(),
            panther: panther.into(),
            game_config: DEFAULT_GAME_CONFIG.to_string(),
            num_games: DEFAULT_NUM_GAMES,
            tournament_id: None,
            check_for_existing: false,
        }
    }

    pub fn with_game_config(mut self, name: impl Into<String>) -> Self {
        self.game_config = name.into();
        self
    }

    pub fn with_num_games(mut self, num_games: u32) -> Self {
        self.num_games = num_games;
        self
    }

    pub fn in_tournament(mut self, tournament_id: TournamentId) -> Self {
        self.tournament_id = Some(tournament_id);
        self
    }

    pub fn reuse_existing(mut self) -> Self {
        self.check_for_existing = true;
        self
    }
}

pub struct Scheduler {
    store: Arc<dyn MatchStore>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MatchStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Existing team with the same name and members, or a new one.
    pub async fn create_team(&self, name: &str, members: &str) -> Result<Team, SchedulingError> {
        let existing = self.store.list_teams().await?;
        if let Some(team) = existing
            .into_iter()
            .find(|t| t.team_name == name && t.team_members == members)
        {
            tracing::debug!(team = name, "team already exists");
            return Ok(team);
        }
        tracing::info!(team = name, "creating team");
        Ok(self.store.insert_team(name, members).await?)
    }

    /// Existing agent with this name, or a new one attached to its team
    /// (created on demand).
    pub async fn create_agent(&self, name: &str, role: Role) -> Result<Agent, SchedulingError> {
        let team_name = match name.split_once(':') {
            Some((team, tag)) if !team.is_empty() && !tag.is_empty() && !tag.contains(':') => team,
            _ => return Err(SchedulingError::InvalidAgentName(name.to_string())),
        };
        if let Some(agent) = self.find_agent(name).await? {
            tracing::debug!(agent = name, "agent already exists");
            return Ok(agent);
        }
        let team = self.create_team(team_name, PLACEHOLDER_MEMBERS).await?;
        tracing::info!(agent = name, %role, "creating agent");
        Ok(self
            .store
            .insert_agent(name, role, Some(team.team_id))
            .await?)
    }

    /// New tournament over the named agents; unknown names are skipped.
    pub async fn create_tournament(
        &self,
        agent_names: &[&str],
    ) -> Result<Tournament, SchedulingError> {
        let agent_ids: Vec<AgentId> = self
            .store
            .list_agents()
            .await?
            .into_iter()
            .filter(|a| agent_names.contains(&a.agent_name.as_str()))
            .map(|a| a.agent_id)
            .collect();
        tracing::info!(agents = agent_ids.len(), "creating tournament");
        Ok(self
            .store
            .insert_tournament(&agent_ids, self.clock.now())
            .await?)
    }

    pub async fn create_match(&self, request: MatchRequest) -> Result<Match, SchedulingError> {
        let pelican = self.require_agent(&request.pelican, Role::Pelican).await?;
        let panther = self.require_agent(&request.panther, Role::Panther).await?;

        if request.check_for_existing {
            let existing = self.store.list_matches(None).await?;
            if let Some(found) = existing.into_iter().find(|m| {
                m.pelican_agent == pelican.agent_id && m.panther_agent == panther.agent_id
            }) {
                tracing::info!(match_id = %found.match_id, "match already exists");
                return Ok(found);
            }
        }

        let created = self
            .store
            .insert_match(NewMatch {
                pelican_agent: pelican.agent_id,
                panther_agent: panther.agent_id,
                num_games: request.num_games,
                game_config: request.game_config,
                tournament_id: request.tournament_id,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(
            match_id = %created.match_id,
            pelican = %request.pelican,
            panther = %request.panther,
            "match created"
        );
        Ok(created)
    }

    pub async fn match_finished(&self, match_id: MatchId) -> Result<bool, SchedulingError> {
        self.store
            .find_match(match_id)
            .await?
            .map(|m| m.is_finished())
            .ok_or(SchedulingError::MatchNotFound(match_id))
    }

    async fn find_agent(&self, name: &str) -> Result<Option<Agent>, SchedulingError> {
        Ok(self
            .store
            .list_agents()
            .await?
            .into_iter()
            .find(|a| a.agent_name == name))
    }

    async fn require_agent(&self, name: &str, role: Role) -> Result<Agent, SchedulingError> {
        self.find_agent(name)
            .await?
            .ok_or_else(|| SchedulingError::AgentNotFound {
                role,
                name: name.to_string(),
            })
    }
}
