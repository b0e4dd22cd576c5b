//! Persistence gateway: the only path from orchestration to the stores.
//!
//! # Write ordering
//! - `record_game`: upload the video first, then append the Game carrying
//!   its url. A Game row never points at a blob that was not written.
//! - `finalize_match`: upload the run log, then set the Match's logfile url.
//!
//! Uploads are retried here; the append is attempted once and its failure
//! surfaced, leaving the retry decision to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{Game, GameConfig, Match, MatchId, NewGame};
use crate::ports::{BlobError, BlobStore, MatchStore, StoreError, blob_url};

use super::game_loop::GameSummary;
use super::retry::RetryPolicy;

/// Bucket names for the three artifact kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub config: String,
    pub logfiles: String,
    pub videos: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            config: "config".into(),
            logfiles: "logfiles".into(),
            videos: "videos".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("game configuration {name:?} is invalid: {source}")]
    InvalidConfig {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact path {0:?} has no file name")]
    ArtifactName(PathBuf),
}

impl GatewayError {
    /// Whether repeating the same write may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Store(e) => e.is_transient(),
            GatewayError::Blob(e) => matches!(e, BlobError::Io(_) | BlobError::Backend(_)),
            GatewayError::MatchNotFound(_)
            | GatewayError::InvalidConfig { .. }
            | GatewayError::ArtifactName(_) => false,
        }
    }
}

pub struct PersistenceGateway {
    store: Arc<dyn MatchStore>,
    blobs: Arc<dyn BlobStore>,
    buckets: Buckets,
    upload_retry: RetryPolicy,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn MatchStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            buckets: Buckets::default(),
            upload_retry: RetryPolicy::default(),
        }
    }

    pub fn with_buckets(mut self, buckets: Buckets) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn with_upload_retry(mut self, policy: RetryPolicy) -> Self {
        self.upload_retry = policy;
        self
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    pub async fn load_match(&self, match_id: MatchId) -> Result<Match, GatewayError> {
        self.store
            .find_match(match_id)
            .await?
            .ok_or(GatewayError::MatchNotFound(match_id))
    }

    /// Fetch and parse a config document from the config bucket.
    pub async fn load_game_config(&self, name: &str) -> Result<GameConfig, GatewayError> {
        let raw = self.blobs.read_config(name, &self.buckets.config).await?;
        GameConfig::from_value(raw).map_err(|source| GatewayError::InvalidConfig {
            name: name.to_string(),
            source,
        })
    }

    /// Upload the game's video (if any), then append the Game.
    pub async fn record_game(
        &self,
        match_id: MatchId,
        summary: &GameSummary,
    ) -> Result<Game, GatewayError> {
        let video_url = match &summary.video_path {
            Some(path) => Some(self.upload(path, match_id, &self.buckets.videos).await?),
            None => None,
        };
        let game = self
            .store
            .append_game(
                match_id,
                NewGame {
                    num_turns: summary.num_turns,
                    result_code: summary.result,
                    video_url,
                },
            )
            .await?;
        tracing::info!(%match_id, game_id = %game.game_id, result = %game.result_code, "game recorded");
        Ok(game)
    }

    /// Upload the run log and point the Match at it. Returns the url.
    pub async fn finalize_match(
        &self,
        match_id: MatchId,
        log_path: &Path,
    ) -> Result<String, GatewayError> {
        let url = self.upload(log_path, match_id, &self.buckets.logfiles).await?;
        self.store.set_match_logfile(match_id, &url).await?;
        tracing::info!(%match_id, logfile_url = %url, "match finalized");
        Ok(url)
    }

    /// Stored as `<match_id>/<file name>`.
    async fn upload(
        &self,
        path: &Path,
        match_id: MatchId,
        bucket: &str,
    ) -> Result<String, GatewayError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GatewayError::ArtifactName(path.to_path_buf()))?;
        let name = format!("{match_id}/{file_name}");
        self.upload_retry
            .run("artifact upload", || self.blobs.write_artifact(path, &name, bucket))
            .await?;
        Ok(blob_url(bucket, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, WinCode};
    use crate::impls::{InMemoryBlobStore, InMemoryMatchStore};
    use crate::ports::{NewMatch, SystemClock, UlidGenerator};
    use chrono::Utc;

    struct Fixture {
        store: Arc<InMemoryMatchStore>,
        blobs: Arc<InMemoryBlobStore>,
        gateway: PersistenceGateway,
        match_id: MatchId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryMatchStore::new(
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        ));
        let blobs = Arc::new(InMemoryBlobStore::new());
        let pelican = store.insert_agent("a:1", Role::Pelican, None).await.unwrap();
        let panther = store.insert_agent("b:1", Role::Panther, None).await.unwrap();
        let m = store
            .insert_match(NewMatch {
                pelican_agent: pelican.agent_id,
                panther_agent: panther.agent_id,
                num_games: 2,
                game_config: "10x10_balanced.json".into(),
                tournament_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let gateway = PersistenceGateway::new(store.clone(), blobs.clone())
            .with_upload_retry(RetryPolicy::immediate(3));
        Fixture {
            store,
            blobs,
            gateway,
            match_id: m.match_id,
        }
    }

    fn summary(video_path: Option<PathBuf>) -> GameSummary {
        GameSummary {
            num_turns: 4,
            result: WinCode::Escape,
            video_path,
        }
    }

    #[tokio::test]
    async fn uploads_video_before_appending() {
        let f = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("game-1.ppm");
        std::fs::write(&video, b"P6").unwrap();
        f.blobs.fail_next_writes(2);

        let game = f.gateway.record_game(f.match_id, &summary(Some(video))).await.unwrap();

        let name = format!("{}/game-1.ppm", f.match_id);
        assert_eq!(game.video_url, Some(format!("videos/{name}")));
        assert_eq!(f.blobs.get("videos", &name).unwrap(), b"P6");
        assert_eq!(game.num_turns, 4);
    }

    #[tokio::test]
    async fn failed_upload_appends_nothing() {
        let f = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("game-1.ppm");
        std::fs::write(&video, b"P6").unwrap();
        f.blobs.fail_next_writes(3);

        let err = f.gateway.record_game(f.match_id, &summary(Some(video))).await.unwrap_err();
        assert!(matches!(err, GatewayError::Blob(_)));
        let m = f.store.find_match(f.match_id).await.unwrap().unwrap();
        assert!(m.games.is_empty());
    }

    #[tokio::test]
    async fn games_without_video_have_no_url() {
        let f = fixture().await;
        let game = f.gateway.record_game(f.match_id, &summary(None)).await.unwrap();
        assert_eq!(game.video_url, None);
    }

    #[tokio::test]
    async fn finalize_sets_the_logfile_url() {
        let f = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");
        std::fs::write(&log, "line\n").unwrap();

        let url = f.gateway.finalize_match(f.match_id, &log).await.unwrap();
        let m = f.gateway.load_match(f.match_id).await.unwrap();
        assert_eq!(m.logfile_url, Some(url));
    }

    #[tokio::test]
    async fn config_documents_are_parsed() {
        let f = fixture().await;
        f.blobs.put(
            "config",
            "10x10_balanced.json",
            r#"{"game_rules": {"pelican": {"move_limit": 3}, "panther": {"move_limit": 1}}}"#,
        );
        f.blobs.put("config", "broken.json", r#"{"game_rules": 1}"#);

        let config = f.gateway.load_game_config("10x10_balanced.json").await.unwrap();
        assert_eq!(config.move_limit(Role::Pelican), 3);
        assert!(matches!(
            f.gateway.load_game_config("broken.json").await,
            Err(GatewayError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn appending_to_a_complete_match_is_permanent() {
        let f = fixture().await;
        f.gateway.record_game(f.match_id, &summary(None)).await.unwrap();
        f.gateway.record_game(f.match_id, &summary(None)).await.unwrap();

        let err = f.gateway.record_game(f.match_id, &summary(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Store(StoreError::MatchComplete(_))));
        assert!(!err.is_transient());

        let other = fixture().await;
        other.store.fail_next_appends(1);
        let err = other.gateway.record_game(other.match_id, &summary(None)).await.unwrap_err();
        assert!(err.is_transient());
    }
}
