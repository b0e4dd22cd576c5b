//! MatchCoordinator - runs every Game of one Match.
//!
//! # Lifecycle
//! 1. load the Match (absent: fatal) and its game configuration (fatal)
//! 2. connect to the broker and wait until both agents are ready
//! 3. for each game, strictly one after the other: fresh connection, fresh
//!    RPC client, fresh board; play; persist
//! 4. upload the run log and set the Match's logfile url
//!
//! A persistence failure that outlives the append retries stops the schedule;
//! Games recorded before it stay recorded. Only transient store failures are
//! retried. A game count larger than the Match can still record is refused
//! before anything is played, unless persistence is disabled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::{Game, GameConfig, Match, MatchId};
use crate::ports::{BoardFactory, Broker, Connector, IdGenerator};
use crate::rpc::{DEFAULT_CONNECT_DELAY, RpcClient, RpcError, await_readiness, connect_with_retry};

use super::game_loop::{GameError, GameLoop, GameSummary};
use super::gateway::{GatewayError, PersistenceGateway};
use super::move_sources::RpcMoveSource;
use super::retry::RetryPolicy;

/// Knobs of a coordinator run. Built with the `with_*` setters.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub broker_host: String,
    pub connect_delay: Duration,
    /// Per-call bound on agent replies; `None` waits forever.
    pub rpc_deadline: Option<Duration>,
    pub readiness_deadline: Option<Duration>,
    /// Where per-game videos are written; no videos when unset.
    pub video_dir: Option<PathBuf>,
    /// Run log uploaded once all games are played.
    pub log_path: Option<PathBuf>,
    /// Play every game but write nothing to the stores.
    pub no_persistence: bool,
    pub num_games_override: Option<u32>,
    pub config_override: Option<String>,
    pub append_retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            broker_host: "localhost".into(),
            connect_delay: DEFAULT_CONNECT_DELAY,
            rpc_deadline: None,
            readiness_deadline: None,
            video_dir: None,
            log_path: None,
            no_persistence: false,
            num_games_override: None,
            config_override: None,
            append_retry: RetryPolicy::default(),
        }
    }
}

impl CoordinatorSettings {
    pub fn with_broker_host(mut self, host: impl Into<String>) -> Self {
        self.broker_host = host.into();
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_rpc_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.rpc_deadline = deadline;
        self
    }

    pub fn with_readiness_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.readiness_deadline = deadline;
        self
    }

    pub fn with_video_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.video_dir = Some(dir.into());
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_no_persistence(mut self, enabled: bool) -> Self {
        self.no_persistence = enabled;
        self
    }

    pub fn with_num_games(mut self, num_games: Option<u32>) -> Self {
        self.num_games_override = num_games;
        self
    }

    pub fn with_config(mut self, name: Option<String>) -> Self {
        self.config_override = name;
        self
    }

    pub fn with_append_retry(mut self, policy: RetryPolicy) -> Self {
        self.append_retry = policy;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("cannot load game configuration: {0}")]
    Config(#[source] GatewayError),

    #[error("match {match_id} can record {remaining} more games, {requested} requested")]
    GameCount {
        match_id: MatchId,
        requested: u32,
        remaining: u32,
    },

    #[error("broker unavailable: {0}")]
    Connect(#[source] RpcError),

    #[error("agents did not become ready: {0}")]
    Readiness(#[source] RpcError),

    #[error("game {index} failed: {source}")]
    Game {
        index: u32,
        #[source]
        source: GameError,
    },

    #[error("recording game {index} failed: {source}")]
    Persistence {
        index: u32,
        #[source]
        source: GatewayError,
    },

    #[error("finalizing the match failed: {0}")]
    Finalize(#[source] GatewayError),
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub match_id: MatchId,
    /// One entry per game played, in order.
    pub games: Vec<GameSummary>,
    /// Games written to the store (empty without persistence).
    pub recorded: Vec<Game>,
    pub logfile_url: Option<String>,
}

pub struct MatchCoordinator {
    connector: Arc<dyn Connector>,
    gateway: PersistenceGateway,
    boards: Arc<dyn BoardFactory>,
    ids: Arc<dyn IdGenerator>,
    settings: CoordinatorSettings,
}

impl MatchCoordinator {
    pub fn new(
        connector: Arc<dyn Connector>,
        gateway: PersistenceGateway,
        boards: Arc<dyn BoardFactory>,
        ids: Arc<dyn IdGenerator>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            connector,
            gateway,
            boards,
            ids,
            settings,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        match_id: MatchId,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, CoordinatorError> {
        let record = self.load_match(match_id).await?;
        let num_games = self.settings.num_games_override.unwrap_or(record.num_games);
        let remaining = record.remaining_games();
        if !self.settings.no_persistence && num_games > remaining {
            tracing::error!(%match_id, num_games, remaining, "more games requested than the match can record");
            return Err(CoordinatorError::GameCount {
                match_id,
                requested: num_games,
                remaining,
            });
        }
        let config_name = self
            .settings
            .config_override
            .as_deref()
            .unwrap_or(&record.game_config);
        let config = self
            .gateway
            .load_game_config(config_name)
            .await
            .map_err(CoordinatorError::Config)?;
        tracing::info!(%match_id, num_games, config = config_name, "match loaded");

        let broker = self.connect(cancel).await?;
        await_readiness(broker.as_ref(), self.settings.readiness_deadline, cancel)
            .await
            .map_err(CoordinatorError::Readiness)?;
        drop(broker);

        let mut report = MatchReport {
            match_id,
            games: Vec::new(),
            recorded: Vec::new(),
            logfile_url: None,
        };
        for index in 1..=num_games {
            tracing::info!(%match_id, game = index, "game starting");
            let summary = self
                .play_game(match_id, index, &config, cancel)
                .await
                .map_err(|source| CoordinatorError::Game { index, source })?;

            if !self.settings.no_persistence {
                let game = self
                    .settings
                    .append_retry
                    .run_if("record game", GatewayError::is_transient, || {
                        self.gateway.record_game(match_id, &summary)
                    })
                    .await
                    .map_err(|source| CoordinatorError::Persistence { index, source })?;
                report.recorded.push(game);
            }
            report.games.push(summary);
        }

        report.logfile_url = self.finalize(match_id).await?;
        tracing::info!(%match_id, games = report.games.len(), "match complete");
        Ok(report)
    }

    async fn load_match(&self, match_id: MatchId) -> Result<Match, CoordinatorError> {
        match self.gateway.load_match(match_id).await {
            Ok(record) => Ok(record),
            Err(GatewayError::MatchNotFound(id)) => {
                tracing::error!(match_id = %id, "match not found");
                Err(CoordinatorError::MatchNotFound(id))
            }
            Err(e) => Err(CoordinatorError::Config(e)),
        }
    }

    async fn connect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn Broker>, CoordinatorError> {
        connect_with_retry(
            self.connector.as_ref(),
            &self.settings.broker_host,
            self.settings.connect_delay,
            cancel,
        )
        .await
        .map_err(CoordinatorError::Connect)
    }

    async fn play_game(
        &self,
        match_id: MatchId,
        index: u32,
        config: &GameConfig,
        cancel: &CancellationToken,
    ) -> Result<GameSummary, GameError> {
        let broker = connect_with_retry(
            self.connector.as_ref(),
            &self.settings.broker_host,
            self.settings.connect_delay,
            cancel,
        )
        .await?;
        let client = RpcClient::open(broker, self.ids.clone(), cancel.child_token()).await?;
        let moves = RpcMoveSource::new(client, self.settings.rpc_deadline);
        let board = self.boards.new_board(config)?;

        let game = GameLoop::new(board, moves, config);
        let game = match &self.settings.video_dir {
            Some(dir) => {
                let path = dir.join(match_id.to_string()).join(format!("game-{index}.ppm"));
                game.record_to(path).await?
            }
            None => game,
        };
        game.play().await
    }

    async fn finalize(&self, match_id: MatchId) -> Result<Option<String>, CoordinatorError> {
        if self.settings.no_persistence {
            tracing::info!(%match_id, "persistence disabled, skipping logfile upload");
            return Ok(None);
        }
        let Some(log_path) = &self.settings.log_path else {
            tracing::warn!(%match_id, "no run log configured, logfile url stays unset");
            return Ok(None);
        };
        self.gateway
            .finalize_match(match_id, log_path)
            .await
            .map(Some)
            .map_err(CoordinatorError::Finalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::impls::{InMemoryBlobStore, InMemoryBroker, InMemoryMatchStore, ScriptedBoardFactory};
    use crate::ports::{MatchStore, NewMatch, SystemClock, UlidGenerator};
    use crate::rpc::announce_ready;
    use crate::test_support::init_test_logging;

    async fn coordinator(broker: &InMemoryBroker) -> (MatchCoordinator, MatchId) {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
        let store = Arc::new(InMemoryMatchStore::new(ids.clone(), Arc::new(SystemClock)));
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs.put(
            "config",
            "c.json",
            r#"{"game_rules": {"pelican": {"move_limit": 1}, "panther": {"move_limit": 1}}}"#,
        );
        let pelican = store.insert_agent("a:1", Role::Pelican, None).await.unwrap();
        let panther = store.insert_agent("b:1", Role::Panther, None).await.unwrap();
        let m = store
            .insert_match(NewMatch {
                pelican_agent: pelican.agent_id,
                panther_agent: panther.agent_id,
                num_games: 1,
                game_config: "c.json".into(),
                tournament_id: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let coordinator = MatchCoordinator::new(
            Arc::new(broker.clone()),
            PersistenceGateway::new(store, blobs),
            Arc::new(ScriptedBoardFactory::new(crate::domain::WinCode::Bingo)),
            ids,
            CoordinatorSettings::default()
                .with_connect_delay(Duration::from_millis(1))
                .with_readiness_deadline(Some(Duration::from_millis(50))),
        );
        (coordinator, m.match_id)
    }

    #[tokio::test]
    async fn one_ready_agent_is_not_enough() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let (coordinator, match_id) = coordinator(&broker).await;
        announce_ready(&broker, Role::Pelican).await.unwrap();
        announce_ready(&broker, Role::Pelican).await.unwrap();

        let err = coordinator
            .run(match_id, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Readiness(RpcError::Timeout(_))));
    }

    #[tokio::test]
    async fn broker_outage_at_startup_is_retried() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        broker.fail_next_connects(3);
        let (coordinator, match_id) = coordinator(&broker).await;

        // nobody announces: the run gets past connecting and stops at readiness
        let err = coordinator
            .run(match_id, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Readiness(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_the_readiness_wait() {
        let broker = InMemoryBroker::new();
        let (coordinator, match_id) = coordinator(&broker).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = coordinator.run(match_id, &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Connect(RpcError::Cancelled)
                | CoordinatorError::Readiness(RpcError::Cancelled)
        ));
    }
}
