// Game rules: board, status evaluation, sessions and tallies

pub mod board;
pub mod session;

pub use board::{Board, Cell, Ply, Slot, Status};
pub use session::{same_agents, IllegalMove, Session, SlotAgents, Tally};
