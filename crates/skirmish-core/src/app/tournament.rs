//! Tournament reporting and daily config selection.

use std::collections::HashMap;

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::{
    Agent, AgentId, DEFAULT_GAME_CONFIG, Match, MatchId, MatchWinner, Role, TournamentId,
};
use crate::ports::{BlobError, BlobStore, MatchStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Games won by one agent over a tournament.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentScore {
    pub agent_name: String,
    pub role: Role,
    pub wins: u32,
    pub played: u32,
}

/// One Match with agent names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub pelican: String,
    pub panther: String,
    pub pelican_score: usize,
    pub panther_score: usize,
    /// Winning agent's name, `None` on a tie.
    pub winner: Option<String>,
    pub finished: bool,
}

fn agent_names(agents: Vec<Agent>) -> HashMap<AgentId, (String, Role)> {
    agents
        .into_iter()
        .map(|a| (a.agent_id, (a.agent_name, a.agent_type)))
        .collect()
}

fn name_of(names: &HashMap<AgentId, (String, Role)>, id: AgentId) -> String {
    names
        .get(&id)
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| id.to_string())
}

pub fn summarize(m: &Match, names: &HashMap<AgentId, (String, Role)>) -> MatchSummary {
    let pelican = name_of(names, m.pelican_agent);
    let panther = name_of(names, m.panther_agent);
    let winner = match m.winner() {
        MatchWinner::Pelican => Some(pelican.clone()),
        MatchWinner::Panther => Some(panther.clone()),
        MatchWinner::Draw => None,
    };
    MatchSummary {
        match_id: m.match_id,
        pelican_score: m.wins(Role::Pelican),
        panther_score: m.wins(Role::Panther),
        pelican,
        panther,
        winner,
        finished: m.is_finished(),
    }
}

pub async fn match_summary(
    store: &dyn MatchStore,
    match_id: MatchId,
) -> Result<MatchSummary, ReportError> {
    let m = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ReportError::NotFound {
            kind: "match",
            id: match_id.to_string(),
        })?;
    let names = agent_names(store.list_agents().await?);
    Ok(summarize(&m, &names))
}

/// Game wins per agent across every Match of the tournament, best first.
pub async fn tournament_scores(
    store: &dyn MatchStore,
    tournament_id: TournamentId,
) -> Result<Vec<AgentScore>, ReportError> {
    if store.find_tournament(tournament_id).await?.is_none() {
        return Err(ReportError::NotFound {
            kind: "tournament",
            id: tournament_id.to_string(),
        });
    }
    let names = agent_names(store.list_agents().await?);
    let mut scores: HashMap<AgentId, AgentScore> = HashMap::new();

    for m in store.list_matches(Some(tournament_id)).await? {
        for role in Role::ALL {
            let agent = m.agent_for(role);
            let entry = scores.entry(agent).or_insert_with(|| AgentScore {
                agent_name: name_of(&names, agent),
                role,
                wins: 0,
                played: 0,
            });
            entry.played += m.games.len() as u32;
            entry.wins += m.wins(role) as u32;
        }
    }

    let mut ranked: Vec<AgentScore> = scores.into_values().collect();
    ranked.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.agent_name.cmp(&b.agent_name)));
    Ok(ranked)
}

/// Pick the game configuration for `day` and `map_size`.
///
/// Candidates, in order of preference: configs named for the day
/// (`YYYY_MM_DD...`) containing the map size, then `default...` configs
/// containing it, then [`DEFAULT_GAME_CONFIG`] if present. Ties are broken
/// at random. `None` when the bucket holds nothing usable.
pub async fn select_config<R: Rng + ?Sized>(
    blobs: &dyn BlobStore,
    bucket: &str,
    day: NaiveDate,
    map_size: &str,
    rng: &mut R,
) -> Result<Option<String>, BlobError> {
    let names = blobs.list_names(bucket, "").await?;
    let day_prefix = day.format("%Y_%m_%d").to_string();
    tracing::info!(day = %day_prefix, configs = names.len(), "selecting game config");

    let pick = |prefix: &str| -> Vec<&String> {
        names
            .iter()
            .filter(|n| n.starts_with(prefix) && n.contains(map_size))
            .collect()
    };
    let mut candidates = pick(&day_prefix);
    if candidates.is_empty() {
        tracing::info!(map_size, "no config for the day, trying defaults");
        candidates = pick("default");
    }
    let chosen = match candidates.choose(rng) {
        Some(name) => Some((*name).clone()),
        None => names.iter().find(|n| *n == DEFAULT_GAME_CONFIG).cloned(),
    };
    tracing::info!(config = ?chosen, "game config selected");
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{MatchRequest, Scheduler};
    use crate::domain::{NewGame, WinCode};
    use crate::impls::{InMemoryBlobStore, InMemoryMatchStore};
    use crate::ports::{SystemClock, UlidGenerator};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    fn game(code: WinCode) -> NewGame {
        NewGame {
            num_turns: 5,
            result_code: code,
            video_url: None,
        }
    }

    #[tokio::test]
    async fn scores_count_game_wins_per_agent() {
        let store = Arc::new(InMemoryMatchStore::new(
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        ));
        let scheduler = Scheduler::new(store.clone(), Arc::new(SystemClock));
        scheduler.create_agent("red:p", Role::Pelican).await.unwrap();
        scheduler.create_agent("blue:q", Role::Panther).await.unwrap();
        scheduler.create_agent("green:q", Role::Panther).await.unwrap();
        let t = scheduler
            .create_tournament(&["red:p", "blue:q", "green:q"])
            .await
            .unwrap();

        let a = scheduler
            .create_match(
                MatchRequest::new("red:p", "blue:q")
                    .with_num_games(2)
                    .in_tournament(t.tournament_id),
            )
            .await
            .unwrap();
        let b = scheduler
            .create_match(
                MatchRequest::new("red:p", "green:q")
                    .with_num_games(1)
                    .in_tournament(t.tournament_id),
            )
            .await
            .unwrap();
        store.append_game(a.match_id, game(WinCode::PelicanWin)).await.unwrap();
        store.append_game(a.match_id, game(WinCode::PelicanWin)).await.unwrap();
        store.append_game(b.match_id, game(WinCode::Escape)).await.unwrap();

        let scores = tournament_scores(store.as_ref(), t.tournament_id).await.unwrap();
        let red = scores.iter().find(|s| s.agent_name == "red:p").unwrap();
        assert_eq!((red.wins, red.played), (2, 3));
        assert_eq!(scores[0].agent_name, "red:p");

        let summary = match_summary(store.as_ref(), a.match_id).await.unwrap();
        assert_eq!(summary.winner.as_deref(), Some("red:p"));
        assert_eq!((summary.pelican_score, summary.panther_score), (2, 0));
        assert!(summary.finished);
    }

    fn config_bucket(names: &[&str]) -> InMemoryBlobStore {
        let blobs = InMemoryBlobStore::new();
        for name in names {
            blobs.put("config", name, "{}");
        }
        blobs
    }

    #[tokio::test]
    async fn prefers_the_days_config_for_the_map_size() {
        let blobs = config_bucket(&[
            "2024_03_01_25x25_a.json",
            "2024_03_01_10x10_a.json",
            "default_25x25.json",
            "10x10_balanced.json",
        ]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let chosen = select_config(&blobs, "config", day, "25x25", &mut StdRng::seed_from_u64(7))
            .await
            .unwrap();
        assert_eq!(chosen.as_deref(), Some("2024_03_01_25x25_a.json"));
    }

    #[tokio::test]
    async fn falls_back_to_defaults_then_the_balanced_map() {
        let blobs = config_bucket(&["default_25x25.json", "10x10_balanced.json"]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let chosen = select_config(&blobs, "config", day, "25x25", &mut rng).await.unwrap();
        assert_eq!(chosen.as_deref(), Some("default_25x25.json"));

        let chosen = select_config(&blobs, "config", day, "40x40", &mut rng).await.unwrap();
        assert_eq!(chosen.as_deref(), Some(DEFAULT_GAME_CONFIG));

        let empty = InMemoryBlobStore::new();
        let chosen = select_config(&empty, "config", day, "40x40", &mut rng).await.unwrap();
        assert_eq!(chosen, None);
    }
}
