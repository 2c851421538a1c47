// Packed 3x3 board and the win/draw rules

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::board::{self as board_config, BITS_PER_CELL, CELLS};

/// Player slot; `First` always opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Slot {
    First = 0,
    Second = 1,
}

impl Slot {
    pub const BOTH: [Slot; 2] = [Slot::First, Slot::Second];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn other(self) -> Self {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }

    fn mark(self) -> u32 {
        self as u32 + 1
    }

    fn from_mark(mark: u32) -> Option<Self> {
        match mark {
            1 => Some(Slot::First),
            2 => Some(Slot::Second),
            _ => None,
        }
    }
}

/// Game status as seen by the rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Playing,
    P1Win,
    P2Win,
    Draw,
}

impl Status {
    /// Stored in the `result` column
    pub fn code(self) -> i64 {
        match self {
            Status::Playing => 0,
            Status::P1Win => 1,
            Status::P2Win => 2,
            Status::Draw => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Status::Playing),
            1 => Some(Status::P1Win),
            2 => Some(Status::P2Win),
            3 => Some(Status::Draw),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Playing)
    }

    pub fn win_for(slot: Slot) -> Self {
        match slot {
            Slot::First => Status::P1Win,
            Slot::Second => Status::P2Win,
        }
    }

    /// Winner for terminal statuses with one
    pub fn winner(self) -> Option<Slot> {
        match self {
            Status::P1Win => Some(Slot::First),
            Status::P2Win => Some(Slot::Second),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Playing => "",
            Status::P1Win => "P1 Win",
            Status::P2Win => "P2 Win",
            Status::Draw => "Draw",
        }
    }
}

/// Board cell as (x, y), both in 0..3
pub type Cell = (usize, usize);

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

const CELL_MASK: u32 = (1 << BITS_PER_CELL) - 1;

/// Board packed two bits per cell, row-major: 0 empty, 1 first slot, 2 second slot.
/// The packed value is what the presentation surface receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board(u32);

impl Board {
    pub fn new() -> Self {
        Self(0)
    }

    /// Validate a packed value: known marks only, counts consistent with alternating play
    pub fn from_encoded(encoded: u32) -> Option<Self> {
        if encoded >> (BITS_PER_CELL * CELLS as u32) != 0 {
            return None;
        }
        let board = Self(encoded);
        for index in 0..CELLS {
            if board.raw(index) == CELL_MASK {
                return None;
            }
        }
        let first = board.count_of(Slot::First);
        let second = board.count_of(Slot::Second);
        if first == second || first == second + 1 {
            Some(board)
        } else {
            None
        }
    }

    #[inline]
    pub fn encoded(&self) -> u32 {
        self.0
    }

    #[inline]
    fn raw(&self, index: usize) -> u32 {
        (self.0 >> (index as u32 * BITS_PER_CELL)) & CELL_MASK
    }

    pub fn get_index(&self, index: usize) -> Option<Slot> {
        Slot::from_mark(self.raw(index))
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Slot> {
        if !board_config::is_in_bounds(x, y) {
            return None;
        }
        self.get_index(board_config::cell_index(x, y))
    }

    pub fn is_free(&self, x: usize, y: usize) -> bool {
        board_config::is_in_bounds(x, y) && self.get(x, y).is_none()
    }

    /// Copy of this board with `slot` marked at (x, y). Caller checks the cell is free.
    pub fn with_mark(&self, x: usize, y: usize, slot: Slot) -> Self {
        let shift = board_config::cell_index(x, y) as u32 * BITS_PER_CELL;
        Self((self.0 & !(CELL_MASK << shift)) | (slot.mark() << shift))
    }

    pub fn free_cells(&self) -> Vec<Cell> {
        (0..CELLS)
            .filter(|&index| self.raw(index) == 0)
            .map(board_config::index_to_cell)
            .collect()
    }

    pub fn count_of(&self, slot: Slot) -> usize {
        (0..CELLS).filter(|&index| self.raw(index) == slot.mark()).count()
    }

    pub fn filled(&self) -> usize {
        (0..CELLS).filter(|&index| self.raw(index) != 0).count()
    }

    /// Slot whose turn it is
    pub fn to_move(&self) -> Slot {
        if self.count_of(Slot::First) > self.count_of(Slot::Second) {
            Slot::Second
        } else {
            Slot::First
        }
    }

    pub fn winner(&self) -> Option<Slot> {
        LINES.iter().find_map(|line| {
            let first = self.get_index(line[0])?;
            if line[1..].iter().all(|&index| self.get_index(index) == Some(first)) {
                Some(first)
            } else {
                None
            }
        })
    }

    pub fn status(&self) -> Status {
        match self.winner() {
            Some(slot) => Status::win_for(slot),
            None if self.filled() == CELLS => Status::Draw,
            None => Status::Playing,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..board_config::SIZE {
            if y > 0 {
                f.write_str("/")?;
            }
            for x in 0..board_config::SIZE {
                let c = match self.get(x, y) {
                    Some(Slot::First) => 'X',
                    Some(Slot::Second) => 'O',
                    None => '.',
                };
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

/// One applied move, with the board it was played on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ply {
    pub slot: Slot,
    pub x: u8,
    pub y: u8,
    pub before: Board,
}

impl Ply {
    pub fn cell(&self) -> Cell {
        (self.x as usize, self.y as usize)
    }
}
