//! End-to-end runs of the match coordinator against in-process agents.

use std::sync::{Arc, Once};
use std::time::Duration;

use serde_json::json;
use skirmish_core::app::video::decode_ppm_frames;
use skirmish_core::app::{
    CoordinatorError, CoordinatorSettings, MatchCoordinator, MatchReport, PersistenceGateway,
    RetryPolicy, VIDEO_WIDTH,
};
use skirmish_core::codec::StateValue;
use skirmish_core::domain::{ActionToken, MatchId, Role, WinCode};
use skirmish_core::impls::{
    ActionRecord, InMemoryBlobStore, InMemoryBroker, InMemoryMatchStore, ScriptedBoardFactory,
};
use skirmish_core::ports::{
    Broker, IdGenerator, IdGeneratorExt, MatchStore, NewMatch, SystemClock, UlidGenerator,
};
use skirmish_core::rpc::AgentServer;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

const CONFIG: &str = "10x10_balanced.json";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = std::env::var("TEST_LOG")
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}

struct Harness {
    broker: InMemoryBroker,
    store: Arc<InMemoryMatchStore>,
    blobs: Arc<InMemoryBlobStore>,
    boards: Arc<ScriptedBoardFactory>,
    ids: Arc<dyn IdGenerator>,
    cancel: CancellationToken,
    dir: TempDir,
}

impl Harness {
    /// Games last two turns; pelicans may move twice per turn, panthers once.
    fn new(outcome: WinCode) -> Self {
        init_logging();
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs.put(
            "config",
            CONFIG,
            json!({
                "game_settings": {"maximum_turns": 2},
                "game_rules": {
                    "pelican": {"move_limit": 2},
                    "panther": {"move_limit": 1}
                }
            })
            .to_string(),
        );
        Self {
            broker: InMemoryBroker::new(),
            store: Arc::new(InMemoryMatchStore::new(ids.clone(), Arc::new(SystemClock))),
            blobs,
            boards: Arc::new(ScriptedBoardFactory::new(outcome)),
            ids,
            cancel: CancellationToken::new(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    async fn seed_match(&self, num_games: u32) -> MatchId {
        let pelican = self.store.insert_agent("red:p", Role::Pelican, None).await.unwrap();
        let panther = self.store.insert_agent("blue:q", Role::Panther, None).await.unwrap();
        self.store
            .insert_match(NewMatch {
                pelican_agent: pelican.agent_id,
                panther_agent: panther.agent_id,
                num_games,
                game_config: CONFIG.into(),
                tournament_id: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap()
            .match_id
    }

    fn spawn_agent<F>(&self, role: Role, decide: F)
    where
        F: FnMut(&StateValue) -> ActionToken + Send + 'static,
    {
        let broker: Arc<dyn Broker> = Arc::new(self.broker.clone());
        let server = AgentServer::new(broker, role, decide);
        tokio::spawn(server.serve(self.cancel.child_token()));
    }

    fn settings(&self) -> CoordinatorSettings {
        let log_path = self.dir.path().join("run.log");
        std::fs::write(&log_path, "match log\n").unwrap();
        CoordinatorSettings::default()
            .with_connect_delay(Duration::from_millis(1))
            .with_rpc_deadline(Some(Duration::from_secs(5)))
            .with_readiness_deadline(Some(Duration::from_secs(5)))
            .with_video_dir(self.dir.path().join("videos"))
            .with_log_path(log_path)
            .with_append_retry(RetryPolicy::immediate(2))
    }

    fn coordinator(&self, settings: CoordinatorSettings) -> MatchCoordinator {
        let gateway = PersistenceGateway::new(self.store.clone(), self.blobs.clone())
            .with_upload_retry(RetryPolicy::immediate(2));
        MatchCoordinator::new(
            Arc::new(self.broker.clone()),
            gateway,
            self.boards.clone(),
            self.ids.clone(),
            settings,
        )
    }

    async fn run(
        &self,
        match_id: MatchId,
        settings: CoordinatorSettings,
    ) -> Result<MatchReport, CoordinatorError> {
        let result = self.coordinator(settings).run(match_id, &self.cancel).await;
        self.cancel.cancel();
        result
    }
}

fn always(action: &'static str) -> impl FnMut(&StateValue) -> ActionToken + Send + 'static {
    move |_: &StateValue| ActionToken::from(action)
}

#[tokio::test]
async fn single_game_of_ending_agents_lasts_one_turn() {
    let mut h = Harness::new(WinCode::Bingo);
    h.boards = Arc::new(ScriptedBoardFactory::new(WinCode::Bingo).with_turns(1));
    let match_id = h.seed_match(1).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("end"));

    let report = h.run(match_id, h.settings()).await.unwrap();

    assert_eq!(report.games.len(), 1);
    assert_eq!(report.games[0].num_turns, 1);
    assert_eq!(report.games[0].result, WinCode::Bingo);

    let video = report.games[0].video_path.clone().unwrap();
    let frames = decode_ppm_frames(&std::fs::read(&video).unwrap()).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].width, VIDEO_WIDTH);

    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.games.len(), 1);
    let video_name = format!("{match_id}/game-1.ppm");
    assert_eq!(stored.games[0].video_url, Some(format!("videos/{video_name}")));
    assert!(h.blobs.get("videos", &video_name).is_some());
    assert_eq!(stored.logfile_url, Some(format!("logfiles/{match_id}/run.log")));
    assert_eq!(report.logfile_url, stored.logfile_url);
    assert_eq!(
        h.blobs.get("logfiles", &format!("{match_id}/run.log")).unwrap(),
        b"match log\n"
    );
}

#[tokio::test]
async fn games_run_one_after_the_other() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(3).await;
    h.spawn_agent(Role::Pelican, always("drop_buoy"));
    h.spawn_agent(Role::Panther, always("dive"));

    let report = h.run(match_id, h.settings()).await.unwrap();
    assert_eq!(report.games.len(), 3);
    assert!(report.games.iter().all(|g| g.num_turns == 2));

    // Actions of one game never interleave with another's.
    let actions = h.boards.actions();
    let games: Vec<u32> = actions.iter().map(|a| a.game).collect();
    assert!(games.windows(2).all(|w| w[0] <= w[1]));
    for game in 1..=3 {
        let of_game: Vec<&ActionRecord> = actions.iter().filter(|a| a.game == game).collect();
        let roles: Vec<Role> = of_game.iter().map(|a| a.role).collect();
        use Role::{Panther, Pelican};
        assert_eq!(roles, vec![Pelican, Pelican, Panther, Pelican, Pelican, Panther]);
    }

    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert!(stored.is_finished());
    let ids: Vec<_> = stored.games.iter().map(|g| g.game_id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(report.recorded, stored.games);
}

#[tokio::test]
async fn escape_ends_the_game_in_the_panther_phase() {
    let h = Harness::new(WinCode::Escape);
    let match_id = h.seed_match(1).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("slip_away"));

    let report = h.run(match_id, h.settings()).await.unwrap();
    assert_eq!(report.games[0].result, WinCode::Escape);
    assert_eq!(report.games[0].num_turns, 2);
    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.games[0].winner(), Role::Panther);
}

#[tokio::test]
async fn unknown_match_is_fatal() {
    let h = Harness::new(WinCode::Bingo);
    let missing = h.ids.match_id();
    let err = h.run(missing, h.settings()).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::MatchNotFound(id) if id == missing));
}

#[tokio::test]
async fn persistence_failure_stops_the_match_and_keeps_earlier_games() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(3).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("end"));
    h.store.fail_appends_after(1, 2);

    let err = h.run(match_id, h.settings()).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Persistence { index: 2, .. }));

    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.games.len(), 1);
    assert_eq!(stored.logfile_url, None);
}

#[tokio::test]
async fn test_mode_writes_nothing() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(5).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("end"));

    let settings = h.settings().with_no_persistence(true).with_num_games(Some(2));
    let report = h.run(match_id, settings).await.unwrap();

    assert_eq!(report.games.len(), 2);
    assert!(report.recorded.is_empty());
    assert_eq!(report.logfile_url, None);
    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert!(stored.games.is_empty());
    assert_eq!(stored.logfile_url, None);
    assert!(h.blobs.get("videos", &format!("{match_id}/game-1.ppm")).is_none());
}

#[tokio::test]
async fn missing_config_is_fatal() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(1).await;
    let settings = h.settings().with_config(Some("nowhere.json".into()));
    let err = h.run(match_id, settings).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Config(_)));
}

#[tokio::test]
async fn more_games_than_the_match_can_record_is_refused_before_play() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(1).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("end"));

    let settings = h.settings().with_num_games(Some(2));
    let err = h.run(match_id, settings).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::GameCount { requested: 2, remaining: 1, .. }
    ));

    assert!(h.boards.actions().is_empty());
    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert!(stored.games.is_empty());
    assert_eq!(stored.logfile_url, None);
}

#[tokio::test]
async fn fewer_games_than_scheduled_are_recorded_and_finalized() {
    let h = Harness::new(WinCode::Bingo);
    let match_id = h.seed_match(3).await;
    h.spawn_agent(Role::Pelican, always("end"));
    h.spawn_agent(Role::Panther, always("end"));

    let report = h.run(match_id, h.settings().with_num_games(Some(1))).await.unwrap();
    assert_eq!(report.recorded.len(), 1);

    let stored = h.store.find_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.games.len(), 1);
    assert!(!stored.is_finished());
    assert!(stored.logfile_url.is_some());
}
