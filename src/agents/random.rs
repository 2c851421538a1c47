use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::game::{Board, Cell, Slot};

use super::Strategy;

/// Uniform choice among free cells; no state
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub const KIND: &'static str = "random";
}

impl Strategy for RandomStrategy {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn choose_move(&self, board: &Board, _slot: Slot, rng: &mut StdRng) -> Option<Cell> {
        board.free_cells().choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_only_picks_free_cells() {
        let mut rng = StdRng::seed_from_u64(3);
        let board = Board::new()
            .with_mark(0, 0, Slot::First)
            .with_mark(1, 1, Slot::Second)
            .with_mark(2, 2, Slot::First);
        for _ in 0..50 {
            let (x, y) = RandomStrategy.choose_move(&board, Slot::Second, &mut rng).unwrap();
            assert!(board.is_free(x, y));
        }
    }

    #[test]
    fn test_full_board_has_no_move() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut board = Board::new();
        for index in 0..9 {
            board = board.with_mark(index % 3, index / 3, board.to_move());
        }
        assert_eq!(RandomStrategy.choose_move(&board, Slot::First, &mut rng), None);
    }
}
