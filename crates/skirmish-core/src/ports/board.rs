//! Board port: the external rule engine owning the board state.
//!
//! The orchestrator never decides legality or outcomes. It asks the board for
//! per-role observations, feeds agent actions back, and reads the state.

use crate::codec::StateValue;
use crate::domain::{ActionToken, GameConfig, GameState, Role};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("invalid game configuration: {0}")]
    InvalidConfig(String),

    #[error("rule engine failure: {0}")]
    Engine(String),
}

/// RGB image, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// A frame filled with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    /// True when `pixels` holds exactly `width * height` RGB triples.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * 3
    }
}

pub trait Board: Send {
    /// What `role` is allowed to see right now.
    fn observation(&self, role: Role) -> StateValue;

    /// Apply one action for `role`. Sentinels are passed through as well.
    fn apply_action(&mut self, role: Role, action: &ActionToken) -> Result<(), BoardError>;

    /// Both phases of the current turn are done; advance the engine.
    fn end_turn(&mut self) -> Result<(), BoardError>;

    fn state(&self) -> GameState;

    /// Full view of the board, used for video capture.
    fn render(&self) -> Frame;
}

/// Builds a fresh board for each game of a Match.
pub trait BoardFactory: Send + Sync {
    fn new_board(&self, config: &GameConfig) -> Result<Box<dyn Board>, BoardError>;
}
