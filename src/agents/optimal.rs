// Perfect play by exhaustive negamax
//
// Position values are shared process-wide: the game tree is small and every
// optimal agent reads the same table.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::config::board::CELLS;
use crate::game::{Board, Cell, Slot};

use super::Strategy;

/// Packed board -> value for the side to move. Faster wins score higher.
static SCORES: Lazy<DashMap<u32, i8>> = Lazy::new(DashMap::new);

fn score(board: Board) -> i8 {
    if let Some(value) = SCORES.get(&board.encoded()) {
        return *value;
    }

    let value = if board.winner().is_some() {
        // Previous mover completed a line
        -(CELLS as i8 + 1 - board.filled() as i8)
    } else if board.filled() == CELLS {
        0
    } else {
        let mover = board.to_move();
        board
            .free_cells()
            .into_iter()
            .map(|(x, y)| -score(board.with_mark(x, y, mover)))
            .max()
            .unwrap_or(0)
    };

    SCORES.insert(board.encoded(), value);
    value
}

/// Always picks a best move; ties broken at random
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalStrategy;

impl OptimalStrategy {
    pub const KIND: &'static str = "optimal";
}

impl Strategy for OptimalStrategy {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn choose_move(&self, board: &Board, slot: Slot, rng: &mut StdRng) -> Option<Cell> {
        let scored: Vec<(Cell, i8)> = board
            .free_cells()
            .into_iter()
            .map(|(x, y)| ((x, y), -score(board.with_mark(x, y, slot))))
            .collect();

        let best = scored.iter().map(|&(_, value)| value).max()?;
        let candidates: Vec<Cell> = scored
            .iter()
            .filter(|&&(_, value)| value == best)
            .map(|&(cell, _)| cell)
            .collect();
        candidates.choose(rng).copied()
    }
}
