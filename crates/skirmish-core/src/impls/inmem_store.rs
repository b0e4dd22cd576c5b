//! InMemoryMatchStore - MatchStore kept in process memory.
//!
//! Every write takes the single lock for its whole duration, which gives
//! `append_game` its all-or-nothing semantics. The tables can be exported to
//! and restored from JSON, which lets a CLI keep records between runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Agent, AgentId, Game, Match, MatchId, NewGame, Role, Team, TeamId, Tournament, TournamentId,
};
use crate::ports::{Clock, IdGenerator, IdGeneratorExt, MatchStore, NewMatch, StoreError};

#[derive(Default, Serialize, Deserialize)]
struct Tables {
    teams: Vec<Team>,
    agents: Vec<Agent>,
    tournaments: Vec<Tournament>,
    matches: Vec<Match>,
}

pub struct InMemoryMatchStore {
    tables: Mutex<Tables>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    passing_appends: AtomicU32,
    failing_appends: AtomicU32,
    failing_listings: AtomicU32,
}

impl InMemoryMatchStore {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            ids,
            clock,
            passing_appends: AtomicU32::new(0),
            failing_appends: AtomicU32::new(0),
            failing_listings: AtomicU32::new(0),
        }
    }

    /// Make the next `attempts` calls to `append_game` fail with a backend
    /// error, leaving the tables untouched.
    pub fn fail_next_appends(&self, attempts: u32) {
        self.fail_appends_after(0, attempts);
    }

    /// Let `successes` appends through, then fail the following `attempts`.
    pub fn fail_appends_after(&self, successes: u32, attempts: u32) {
        self.passing_appends.store(successes, Ordering::SeqCst);
        self.failing_appends.store(attempts, Ordering::SeqCst);
    }

    /// Make the next `queries` calls to any `list_*` method fail.
    pub fn fail_next_listings(&self, queries: u32) {
        self.failing_listings.store(queries, Ordering::SeqCst);
    }

    fn listing(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let failed = self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Backend("injected listing failure".into()));
        }
        Ok(self.lock())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.lock())
    }

    /// Replace every table with the contents of a [`to_json`](Self::to_json)
    /// export.
    pub fn load_json(&self, raw: &str) -> Result<(), serde_json::Error> {
        let tables: Tables = serde_json::from_str(raw)?;
        *self.lock() = tables;
        Ok(())
    }

    fn injected_failure(&self) -> bool {
        let take = |counter: &AtomicU32| {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        };
        !take(&self.passing_appends) && take(&self.failing_appends)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn match_mut(tables: &mut Tables, match_id: MatchId) -> Result<&mut Match, StoreError> {
    tables
        .matches
        .iter_mut()
        .find(|m| m.match_id == match_id)
        .ok_or_else(|| StoreError::match_not_found(match_id))
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn find_match(&self, match_id: MatchId) -> Result<Option<Match>, StoreError> {
        Ok(self
            .lock()
            .matches
            .iter()
            .find(|m| m.match_id == match_id)
            .cloned())
    }

    async fn append_game(&self, match_id: MatchId, game: NewGame) -> Result<Game, StoreError> {
        if self.injected_failure() {
            return Err(StoreError::Backend("injected append failure".into()));
        }

        let mut tables = self.lock();
        let target = match_mut(&mut tables, match_id)?;
        if target.is_finished() {
            return Err(StoreError::MatchComplete(match_id));
        }
        let record = Game {
            game_id: self.ids.game_id(),
            match_id,
            created_at: self.clock.now(),
            num_turns: game.num_turns,
            result_code: game.result_code,
            video_url: game.video_url,
        };
        target.games.push(record.clone());
        Ok(record)
    }

    async fn set_match_logfile(&self, match_id: MatchId, url: &str) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let target = match_mut(&mut tables, match_id)?;
        if target.logfile_url.is_some() {
            return Err(StoreError::LogfileAlreadySet(match_id));
        }
        target.logfile_url = Some(url.to_string());
        Ok(())
    }

    async fn insert_team(&self, name: &str, members: &str) -> Result<Team, StoreError> {
        let team = Team {
            team_id: self.ids.team_id(),
            team_name: name.to_string(),
            team_members: members.to_string(),
        };
        self.lock().teams.push(team.clone());
        Ok(team)
    }

    async fn insert_agent(
        &self,
        name: &str,
        role: Role,
        team_id: Option<TeamId>,
    ) -> Result<Agent, StoreError> {
        let agent = Agent {
            agent_id: self.ids.agent_id(),
            agent_name: name.to_string(),
            agent_type: role,
            team_id,
        };
        self.lock().agents.push(agent.clone());
        Ok(agent)
    }

    async fn insert_tournament(
        &self,
        agent_ids: &[AgentId],
        created_at: DateTime<Utc>,
    ) -> Result<Tournament, StoreError> {
        let tournament = Tournament {
            tournament_id: self.ids.tournament_id(),
            created_at,
            agent_ids: agent_ids.to_vec(),
            match_ids: Vec::new(),
        };
        self.lock().tournaments.push(tournament.clone());
        Ok(tournament)
    }

    async fn insert_match(&self, new_match: NewMatch) -> Result<Match, StoreError> {
        let mut tables = self.lock();
        let record = Match {
            match_id: self.ids.match_id(),
            created_at: new_match.created_at,
            pelican_agent: new_match.pelican_agent,
            panther_agent: new_match.panther_agent,
            num_games: new_match.num_games,
            game_config: new_match.game_config,
            logfile_url: None,
            tournament_id: new_match.tournament_id,
            games: Vec::new(),
        };
        if let Some(tournament_id) = record.tournament_id {
            let tournament = tables
                .tournaments
                .iter_mut()
                .find(|t| t.tournament_id == tournament_id)
                .ok_or_else(|| StoreError::NotFound {
                    kind: "tournament",
                    id: tournament_id.to_string(),
                })?;
            tournament.match_ids.push(record.match_id);
        }
        tables.matches.push(record.clone());
        Ok(record)
    }

    async fn find_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Option<Tournament>, StoreError> {
        Ok(self
            .lock()
            .tournaments
            .iter()
            .find(|t| t.tournament_id == tournament_id)
            .cloned())
    }

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        Ok(self.listing()?.teams.clone())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.listing()?.agents.clone())
    }

    async fn list_tournaments(&self) -> Result<Vec<Tournament>, StoreError> {
        Ok(self.listing()?.tournaments.clone())
    }

    async fn list_matches(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> Result<Vec<Match>, StoreError> {
        Ok(self
            .listing()?
            .matches
            .iter()
            .filter(|m| tournament_id.is_none() || m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }
}
