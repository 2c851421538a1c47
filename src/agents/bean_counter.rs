// Learning agent: a matchbox of beads per position
//
// Each position it has moved from keeps one weight per cell. Moves are drawn
// in proportion to the weights; after a game every move it made is reinforced
// by the outcome.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::board::{self as board_config, CELLS};
use crate::game::{Board, Cell, Ply, Slot, Status};

use super::Strategy;

const INITIAL_BEANS: u16 = 3;
const WIN_BEANS: i32 = 3;
const DRAW_BEANS: i32 = 1;
const LOSS_BEANS: i32 = -1;
/// Weights never fall below this, so every legal move stays reachable
const MIN_BEANS: u16 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanCounterStrategy {
    beans: HashMap<u32, [u16; CELLS]>,
}

impl BeanCounterStrategy {
    pub const KIND: &'static str = "bean_counter";

    pub fn restore(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let (strategy, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(strategy)
    }

    /// Positions with learned weights
    pub fn positions(&self) -> usize {
        self.beans.len()
    }

    fn initial(board: &Board) -> [u16; CELLS] {
        let mut weights = [0; CELLS];
        for (x, y) in board.free_cells() {
            weights[board_config::cell_index(x, y)] = INITIAL_BEANS;
        }
        weights
    }

    fn weights(&self, board: &Board) -> [u16; CELLS] {
        self.beans
            .get(&board.encoded())
            .copied()
            .unwrap_or_else(|| Self::initial(board))
    }
}

impl Strategy for BeanCounterStrategy {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn choose_move(&self, board: &Board, _slot: Slot, rng: &mut StdRng) -> Option<Cell> {
        let weights = self.weights(board);
        let total: u32 = weights.iter().map(|&w| w as u32).sum();
        if total == 0 {
            return None;
        }

        let mut pick = rng.random_range(0..total);
        for (index, &weight) in weights.iter().enumerate() {
            if pick < weight as u32 {
                return Some(board_config::index_to_cell(index));
            }
            pick -= weight as u32;
        }
        None
    }

    fn saveable(&self) -> bool {
        true
    }

    fn learn(&mut self, history: &[Ply], slot: Slot, status: Status) {
        let delta = match status {
            Status::Draw => DRAW_BEANS,
            Status::Playing => return,
            _ if status.winner() == Some(slot) => WIN_BEANS,
            _ => LOSS_BEANS,
        };

        for ply in history.iter().filter(|ply| ply.slot == slot) {
            let weights = self
                .beans
                .entry(ply.before.encoded())
                .or_insert_with(|| Self::initial(&ply.before));
            let index = board_config::cell_index(ply.x as usize, ply.y as usize);
            let updated = (weights[index] as i32 + delta).clamp(MIN_BEANS as i32, u16::MAX as i32);
            weights[index] = updated as u16;
        }
    }

    fn save_state(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }
}
