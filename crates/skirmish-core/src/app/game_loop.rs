//! Turn-based step loop for a single game.
//!
//! # Turn structure
//! 1. pelican phase, then panther phase
//! 2. `end_turn` on the board, turn counter + 1
//! 3. one video frame (when recording)
//! 4. stop if the board reached a terminal state
//!
//! Within a phase the loop asks for an action, applies it, and stops once the
//! role's move limit is reached, the agent answered `end`, or (panther only)
//! the panther has escaped. A phase always asks at least once.

use std::path::PathBuf;

use crate::domain::{GameConfig, GameState, Role, WinCode};
use crate::ports::{Board, BoardError, MoveSource};
use crate::rpc::RpcError;

use super::video::{VideoError, VideoRecorder};

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("board error: {0}")]
    Board(#[from] BoardError),

    #[error("agent call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("video capture failed: {0}")]
    Video(#[from] VideoError),
}

/// Outcome of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    /// Completed turns, the terminating one included.
    pub num_turns: u32,
    pub result: WinCode,
    pub video_path: Option<PathBuf>,
}

pub struct GameLoop<M> {
    board: Box<dyn Board>,
    moves: M,
    move_limits: [u32; 2],
    video: Option<VideoRecorder>,
    turn: u32,
}

impl<M: MoveSource> GameLoop<M> {
    pub fn new(board: Box<dyn Board>, moves: M, config: &GameConfig) -> Self {
        Self {
            board,
            moves,
            move_limits: Role::ALL.map(|role| config.move_limit(role)),
            video: None,
            turn: 0,
        }
    }

    /// Record one frame per turn to `path`.
    pub async fn record_to(mut self, path: impl Into<PathBuf>) -> Result<Self, GameError> {
        self.video = Some(VideoRecorder::create(path).await?);
        Ok(self)
    }

    /// Play until the board reaches a terminal state.
    pub async fn play(mut self) -> Result<GameSummary, GameError> {
        let result = loop {
            for role in Role::ALL {
                self.play_phase(role).await?;
            }
            self.board.end_turn()?;
            self.turn += 1;
            if let Some(video) = self.video.as_mut() {
                let frame = self.board.render();
                video.push(&frame).await?;
            }
            match self.board.state() {
                GameState::Terminal(code) => break code,
                GameState::Running => tracing::debug!(turn = self.turn, "turn complete"),
            }
        };

        let video_path = match self.video.take() {
            Some(video) => Some(video.finish().await?),
            None => None,
        };
        tracing::info!(turns = self.turn, result = %result, "game over");
        Ok(GameSummary {
            num_turns: self.turn,
            result,
            video_path,
        })
    }

    async fn play_phase(&mut self, role: Role) -> Result<(), GameError> {
        let limit = self.move_limits[role as usize];
        let mut taken = 0;
        loop {
            let observation = self.board.observation(role);
            let action = self.moves.next_action(role, &observation).await?;
            tracing::debug!(turn = self.turn + 1, %role, %action, "action");
            self.board.apply_action(role, &action)?;
            taken += 1;

            let escaped =
                role == Role::Panther && self.board.state() == GameState::Terminal(WinCode::Escape);
            if taken >= limit || action.is_end() || escaped {
                return Ok(());
            }
        }
    }
}
