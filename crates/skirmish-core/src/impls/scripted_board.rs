//! ScriptedBoard - deterministic stand-in for the rule engine.
//!
//! It plays no real rules: the game lasts a fixed number of turns and then
//! takes a preset outcome. `ESCAPE` is raised during the panther phase of the
//! last turn, the other codes when that turn ends. Every action it receives is
//! appended to a log shared by all boards of one factory, tagged with the game
//! serial and turn, so tests can check the order in which actions arrived.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use crate::codec::{Sonobuoy, StateValue, Torpedo};
use crate::domain::{ActionToken, GameConfig, GameState, Role, WinCode};
use crate::ports::{Board, BoardError, BoardFactory, Frame};

pub const FRAME_WIDTH: u32 = 310;
pub const FRAME_HEIGHT: u32 = 250;

const FALLBACK_TURNS: u32 = 1;

/// One action as the board received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// 1-based serial of the board within its factory.
    pub game: u32,
    pub turn: u32,
    pub role: Role,
    pub action: ActionToken,
}

pub type ActionLog = Arc<Mutex<Vec<ActionRecord>>>;

pub struct ScriptedBoardFactory {
    outcome: WinCode,
    turns: Option<u32>,
    boards_built: AtomicU32,
    log: ActionLog,
}

impl ScriptedBoardFactory {
    /// Games end with `outcome`. Their length comes from
    /// `game_settings.maximum_turns` of the config unless set with
    /// [`with_turns`](Self::with_turns).
    pub fn new(outcome: WinCode) -> Self {
        Self {
            outcome,
            turns: None,
            boards_built: AtomicU32::new(0),
            log: ActionLog::default(),
        }
    }

    pub fn with_turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns.max(1));
        self
    }

    pub fn action_log(&self) -> ActionLog {
        self.log.clone()
    }

    pub fn actions(&self) -> Vec<ActionRecord> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BoardFactory for ScriptedBoardFactory {
    fn new_board(&self, config: &GameConfig) -> Result<Box<dyn Board>, BoardError> {
        let turns = match self.turns {
            Some(turns) => turns,
            None => match config.raw.pointer("/game_settings/maximum_turns") {
                None => FALLBACK_TURNS,
                Some(value) => value
                    .as_u64()
                    .filter(|&n| n > 0)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        BoardError::InvalidConfig(format!("maximum_turns must be positive, got {value}"))
                    })?,
            },
        };
        let game = self.boards_built.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedBoard {
            game,
            turn: 0,
            turns,
            outcome: self.outcome,
            state: GameState::Running,
            log: self.log.clone(),
        }))
    }
}

pub struct ScriptedBoard {
    game: u32,
    /// Completed turns.
    turn: u32,
    turns: u32,
    outcome: WinCode,
    state: GameState,
    log: ActionLog,
}

impl ScriptedBoard {
    fn in_last_turn(&self) -> bool {
        self.turn + 1 >= self.turns
    }
}

impl Board for ScriptedBoard {
    fn observation(&self, role: Role) -> StateValue {
        let mut sonobuoy = Sonobuoy::new(2);
        sonobuoy.col = Some(i64::from(self.turn % 10));
        sonobuoy.row = Some(3);
        let torpedo = Torpedo {
            id: Some(format!("torpedo-{}", self.game)),
            col: Some(4),
            row: Some(i64::from(self.turn % 10)),
            turn: i64::from(self.turn),
            size: 1,
            speed: Some(vec![1, 0]),
            search_radius: Some(2),
        };
        StateValue::map([
            ("game", StateValue::Plain(json!(self.game))),
            ("turn", StateValue::Plain(json!(self.turn))),
            ("role", StateValue::Plain(json!(role.as_str()))),
            ("sonobuoys", StateValue::List(vec![sonobuoy.into()])),
            ("torpedoes", StateValue::List(vec![torpedo.into()])),
        ])
    }

    fn apply_action(&mut self, role: Role, action: &ActionToken) -> Result<(), BoardError> {
        if !self.state.is_running() {
            return Err(BoardError::Engine(format!(
                "action {action} received after the game ended"
            )));
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ActionRecord {
                game: self.game,
                turn: self.turn + 1,
                role,
                action: action.clone(),
            });
        if role == Role::Panther && self.outcome == WinCode::Escape && self.in_last_turn() {
            self.state = GameState::Terminal(WinCode::Escape);
        }
        Ok(())
    }

    fn end_turn(&mut self) -> Result<(), BoardError> {
        let last = self.in_last_turn();
        self.turn += 1;
        if last && self.state.is_running() {
            self.state = GameState::Terminal(self.outcome);
        }
        Ok(())
    }

    fn state(&self) -> GameState {
        self.state
    }

    fn render(&self) -> Frame {
        let shade = (self.turn * 16 % 256) as u8;
        let mut frame = Frame::filled(FRAME_WIDTH, FRAME_HEIGHT, [0, 40, shade]);
        // mark the torpedo column
        let x = (4 * FRAME_WIDTH / 10) as usize;
        for y in 0..FRAME_HEIGHT as usize {
            let i = (y * FRAME_WIDTH as usize + x) * 3;
            frame.pixels[i..i + 3].copy_from_slice(&[255, 255, 255]);
        }
        frame
    }
}
