//! Domain model (ids, roles, game state, records, configuration).

pub mod action;
pub mod config;
pub mod ids;
pub mod records;
pub mod role;
pub mod state;

pub use action::ActionToken;
pub use config::{DEFAULT_GAME_CONFIG, GameConfig, GameRules, RoleRules};
pub use ids::{
    AgentId, CorrelationId, GameId, Id, IdMarker, MatchId, ParseIdError, TeamId, TournamentId,
};
pub use records::{Agent, Game, Match, MatchWinner, NewGame, Team, Tournament};
pub use role::{READY_QUEUE, Role, UnknownRole};
pub use state::{GameState, UnknownGameState, WinCode};
