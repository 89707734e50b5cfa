use serde::{Deserialize, Serialize};

use crate::{
    constants::{BOARD_CELLS, BOARD_WIDTH},
    error::{AppError, Result},
};

/// One board square as stored by the contract (0 empty, 1 X, 2 O).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn from_code(code: u128) -> Option<Self> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::X),
            2 => Some(Cell::O),
            _ => None,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn display(self) -> &'static str {
        match self {
            Cell::Empty => "",
            Cell::X => "X",
            Cell::O => "O",
        }
    }
}

/// The side allowed to move next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    X,
    O,
}

impl Side {
    pub fn from_code(code: u128) -> Option<Self> {
        match code {
            1 => Some(Side::X),
            2 => Some(Side::O),
            _ => None,
        }
    }

    pub fn mark(self) -> Cell {
        match self {
            Side::X => Cell::X,
            Side::O => Cell::O,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Active,
    XWon,
    OWon,
    Draw,
}

impl GameStatus {
    pub fn from_code(code: u128) -> Option<Self> {
        match code {
            0 => Some(GameStatus::Active),
            1 => Some(GameStatus::XWon),
            2 => Some(GameStatus::OWon),
            3 => Some(GameStatus::Draw),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, GameStatus::Active)
    }

    pub fn is_won(self) -> bool {
        matches!(self, GameStatus::XWon | GameStatus::OWon)
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameStatus::XWon => Some(Side::X),
            GameStatus::OWon => Some(Side::O),
            GameStatus::Active | GameStatus::Draw => None,
        }
    }

    /// Status text as seen by the player on side `local`.
    pub fn label_for(self, local: Side) -> &'static str {
        match (self, self.winner()) {
            (_, Some(winner)) if winner == local => "You Win!",
            (_, Some(_)) => "Computer Wins!",
            (GameStatus::Draw, None) => "It's a Draw!",
            _ => "Game in Progress",
        }
    }
}

/// Three board indices forming a completed line.
pub type WinningLine = [usize; 3];

/// Nine cells in row-major order. Only ever replaced wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board([Cell; BOARD_CELLS]);

impl Board {
    /// Decode the contract's list of cell codes, rejecting anything that is
    /// not exactly nine known codes.
    pub fn from_codes(codes: &[u128]) -> Result<Self> {
        if codes.len() != BOARD_CELLS {
            return Err(AppError::Decode(format!(
                "board must have {} cells, got {}",
                BOARD_CELLS,
                codes.len()
            )));
        }
        let mut cells = [Cell::Empty; BOARD_CELLS];
        for (slot, code) in cells.iter_mut().zip(codes) {
            *slot = Cell::from_code(*code)
                .ok_or_else(|| AppError::Decode(format!("unknown cell code {}", code)))?;
        }
        Ok(Self(cells))
    }

    pub fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.0.get(index).copied()
    }
}

/// Convert a board index into the (row, col) pair the contract expects.
pub fn index_to_row_col(index: usize) -> Result<(u8, u8)> {
    if index >= BOARD_CELLS {
        return Err(AppError::BadRequest(format!(
            "cell index {} out of range 0..{}",
            index, BOARD_CELLS
        )));
    }
    Ok(((index / BOARD_WIDTH) as u8, (index % BOARD_WIDTH) as u8))
}

pub fn row_col_to_index(row: u8, col: u8) -> Result<usize> {
    let (row, col) = (row as usize, col as usize);
    if row >= BOARD_WIDTH || col >= BOARD_WIDTH {
        return Err(AppError::BadRequest(format!(
            "row/col ({}, {}) out of range",
            row, col
        )));
    }
    Ok(row * BOARD_WIDTH + col)
}

/// The locally observed game state. Replaced atomically by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub board: Board,
    pub status: GameStatus,
    pub turn: Side,
    pub winning_line: Option<WinningLine>,
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self {
            board: Board::default(),
            status: GameStatus::Active,
            turn: Side::X,
            winning_line: None,
        }
    }
}
