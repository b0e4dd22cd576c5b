//! Application layer: the game loop, persistence and match orchestration.
//!
//! # Modules
//! - **game_loop** / **video**: one game, turn by turn, with optional capture
//! - **move_sources**: in-process and broker-backed `MoveSource`s
//! - **gateway**: the write path to the match and blob stores
//! - **coordinator**: every game of one Match, in order
//! - **scheduling** / **tournament**: record creation and reporting

pub mod coordinator;
pub mod game_loop;
pub mod gateway;
pub mod move_sources;
pub mod retry;
pub mod scheduling;
pub mod tournament;
pub mod video;

pub use self::coordinator::{CoordinatorError, CoordinatorSettings, MatchCoordinator, MatchReport};
pub use self::game_loop::{GameError, GameLoop, GameSummary};
pub use self::gateway::{Buckets, GatewayError, PersistenceGateway};
pub use self::move_sources::{LocalMoveSource, RpcMoveSource};
pub use self::retry::RetryPolicy;
pub use self::scheduling::{DEFAULT_NUM_GAMES, MatchRequest, Scheduler, SchedulingError};
pub use self::tournament::{
    AgentScore, MatchSummary, ReportError, match_summary, select_config, summarize,
    tournament_scores,
};
pub use self::video::{VIDEO_WIDTH, VideoError, VideoRecorder};
